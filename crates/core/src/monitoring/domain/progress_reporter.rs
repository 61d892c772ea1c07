use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::monitoring::domain::detection_job::DetectionJob;
use crate::monitoring::domain::job_id::JobId;
use crate::monitoring::domain::job_registry::JobRegistry;
use crate::monitoring::domain::job_state::JobState;
use crate::monitoring::domain::match_result::MatchResult;
use crate::monitoring::monitor_error::MonitorError;

/// What a client sees when it polls a job.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub job_id: JobId,
    pub state: JobState,
    /// Fraction of the video read, in `[0, 1]`; `None` when the frame
    /// total is unknown.
    pub progress: Option<f64>,
    /// Results the client has not yet been given.
    pub new_results: Vec<MatchResult>,
    pub preview_frame: Option<PathBuf>,
    pub completed: bool,
    pub total_matches: usize,
    pub processed_frames: usize,
    pub current_frame: usize,
    pub total_frames: usize,
    pub error: Option<String>,
}

/// Builds the snapshot for `delivered` results already handed out.
///
/// Pure read: asking twice with the same `delivered` returns the same
/// results, and `new_results` of consecutive polls concatenate to the
/// job's full result list.
pub fn snapshot(job: &DetectionJob, delivered: usize) -> ProgressSnapshot {
    let view = job.view(delivered);
    let progress = match view.state {
        JobState::Completed => Some(1.0),
        _ if view.total_frames == 0 => None,
        _ => Some((view.frames_read as f64 / view.total_frames as f64).clamp(0.0, 1.0)),
    };
    ProgressSnapshot {
        job_id: job.id(),
        state: view.state,
        progress,
        new_results: view.new_results,
        preview_frame: view.preview_path,
        completed: view.state.is_terminal(),
        total_matches: view.total_matches,
        processed_frames: view.processed_frames,
        current_frame: view.frames_read,
        total_frames: view.total_frames,
        error: view.error,
    }
}

/// Answers polls against the jobs in a [`JobRegistry`].
pub struct ProgressReporter {
    registry: Arc<JobRegistry>,
}

impl ProgressReporter {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    pub fn poll(&self, id: JobId, delivered: usize) -> Result<ProgressSnapshot, MonitorError> {
        let job = self.registry.get(id)?;
        Ok(snapshot(&job, delivered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::domain::detection_job::tests::{result, test_job};
    use crate::monitoring::domain::detection_job::JobOutcome;
    use approx::assert_relative_eq;

    fn sequence(snapshot: &ProgressSnapshot) -> Vec<u64> {
        snapshot.new_results.iter().map(|r| r.sequence_index).collect()
    }

    #[test]
    fn test_pending_job_has_no_progress() {
        let job = test_job();
        let snap = snapshot(&job, 0);
        assert_eq!(snap.state, JobState::Pending);
        assert_eq!(snap.progress, None);
        assert!(!snap.completed);
        assert!(snap.new_results.is_empty());
    }

    #[test]
    fn test_progress_is_fraction_of_frames_read() {
        let job = test_job();
        let mut writer = job.claim_writer().unwrap();
        writer.start();
        writer.set_total_frames(300);
        writer.record_frame(0);
        writer.record_frame(149);

        let snap = snapshot(&job, 0);
        assert_relative_eq!(snap.progress.unwrap(), 0.5);
        assert_eq!(snap.current_frame, 150);
        assert_eq!(snap.processed_frames, 2);
        assert_eq!(snap.total_frames, 300);
        writer.finish(JobOutcome::Completed);
    }

    #[test]
    fn test_completed_job_reports_full_progress() {
        let job = test_job();
        let mut writer = job.claim_writer().unwrap();
        writer.start();
        writer.record_frame(9);
        writer.finish(JobOutcome::Completed);

        let snap = snapshot(&job, 0);
        assert_eq!(snap.progress, Some(1.0));
        assert!(snap.completed);
    }

    #[test]
    fn test_stopped_job_keeps_partial_progress() {
        let job = test_job();
        let mut writer = job.claim_writer().unwrap();
        writer.start();
        writer.set_total_frames(100);
        writer.record_frame(24);
        writer.finish(JobOutcome::Stopped);

        let snap = snapshot(&job, 0);
        assert_relative_eq!(snap.progress.unwrap(), 0.25);
        assert!(snap.completed);
        assert_eq!(snap.error, None);
    }

    #[test]
    fn test_failed_job_carries_error() {
        let job = test_job();
        let writer = job.claim_writer().unwrap();
        writer.finish(JobOutcome::Failed("source unreadable".into()));
        let snap = snapshot(&job, 0);
        assert!(snap.completed);
        assert_eq!(snap.error.as_deref(), Some("source unreadable"));
    }

    #[test]
    fn test_same_marker_returns_same_results() {
        let job = test_job();
        let writer = job.claim_writer().unwrap();
        writer.push_result(result(1));
        writer.push_result(result(2));

        let first = snapshot(&job, 0);
        let second = snapshot(&job, 0);
        assert_eq!(sequence(&first), vec![1, 2]);
        assert_eq!(first.new_results, second.new_results);
        writer.finish(JobOutcome::Completed);
    }

    #[test]
    fn test_consecutive_polls_concatenate_to_full_list() {
        let job = test_job();
        let mut writer = job.claim_writer().unwrap();
        writer.start();
        let mut delivered = 0;
        let mut seen = Vec::new();

        for batch in [1u64..=2, 3..=3, 4..=6] {
            for seq in batch {
                writer.push_result(result(seq));
            }
            let snap = snapshot(&job, delivered);
            delivered += snap.new_results.len();
            seen.extend(sequence(&snap));
            assert_eq!(snap.total_matches, delivered);
        }
        writer.finish(JobOutcome::Completed);
        assert!(snapshot(&job, delivered).new_results.is_empty());
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_processed_frames_never_decrease_across_polls() {
        let job = test_job();
        let mut writer = job.claim_writer().unwrap();
        writer.start();
        let mut last = 0;
        for i in 0..5 {
            writer.record_frame(i * 30);
            let snap = snapshot(&job, 0);
            assert!(snap.processed_frames >= last);
            last = snap.processed_frames;
        }
        writer.finish(JobOutcome::Completed);
        assert_eq!(snapshot(&job, 0).processed_frames, 5);
    }

    #[test]
    fn test_snapshot_serializes_for_clients() {
        let job = test_job();
        let value = serde_json::to_value(snapshot(&job, 0)).unwrap();
        assert_eq!(value["state"], "pending");
        assert_eq!(value["job_id"], job.id().to_string());
        assert!(value["progress"].is_null());
    }

    #[test]
    fn test_reporter_rejects_unknown_job() {
        let reporter = ProgressReporter::new(Arc::new(JobRegistry::new()));
        assert!(reporter.poll(JobId::new(), 0).unwrap_err().is_unknown_job());
    }
}
