use thiserror::Error;

use crate::monitoring::domain::job_id::JobId;
use crate::monitoring::infrastructure::artifact_store::ArtifactError;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("invalid reference image: {0}")]
    InvalidReference(String),
    #[error("invalid video: {0}")]
    InvalidVideo(String),
    #[error("detection frequency must be at least 1, got {0}")]
    InvalidFrequency(u32),
    #[error("unknown job {0}")]
    UnknownJob(JobId),
    #[error("job {0} was already submitted")]
    AlreadySubmitted(JobId),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("job worker error: {0}")]
    Worker(String),
}

impl MonitorError {
    /// Whether the caller can simply stop asking about this job.
    pub fn is_unknown_job(&self) -> bool {
        matches!(self, Self::UnknownJob(_))
    }
}
