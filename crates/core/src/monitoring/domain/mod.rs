pub mod detection_job;
pub mod job_event_log;
pub mod job_id;
pub mod job_registry;
pub mod job_state;
pub mod match_result;
pub mod progress_reporter;
