pub mod artifact_store;
pub mod jsonl_event_log;
