pub mod detect_matches_use_case;
pub mod domain;
pub mod face_monitor_service;
pub mod infrastructure;
pub mod monitor_error;
#[cfg(test)]
pub(crate) mod test_support;
