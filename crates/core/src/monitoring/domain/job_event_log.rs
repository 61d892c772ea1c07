use crate::monitoring::domain::job_id::JobId;
use crate::monitoring::domain::job_state::JobState;
use crate::monitoring::domain::match_result::MatchResult;

/// Something worth a line in the job's audit trail.
#[derive(Debug, Clone, Copy)]
pub enum JobEvent<'a> {
    StateChanged {
        state: JobState,
        error: Option<&'a str>,
    },
    Matched(&'a MatchResult),
}

/// Durable record of job transitions and matches.
///
/// Decouples the scan loop from where the trail ends up (a JSONL file,
/// nothing at all in tests). Recording is best effort and never fails the
/// job.
pub trait JobEventLog: Send + Sync {
    fn record(&self, job_id: JobId, event: JobEvent<'_>);
}

/// Discards every event.
pub struct NullJobEventLog;

impl JobEventLog for NullJobEventLog {
    fn record(&self, _job_id: JobId, _event: JobEvent<'_>) {}
}
