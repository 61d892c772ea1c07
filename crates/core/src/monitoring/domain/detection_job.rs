use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};

use crate::monitoring::domain::job_id::JobId;
use crate::monitoring::domain::job_state::JobState;
use crate::monitoring::domain::match_result::MatchResult;
use crate::recognition::domain::reference_face::ReferenceFace;

/// Per-job scan parameters, fixed at submission.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSettings {
    /// Maximum face distance counted as a match.
    pub tolerance: f64,
    /// Sampling stride: every Nth frame is scanned.
    pub detection_frequency: u32,
    /// Seconds required between two recorded matches; 0 records every one.
    pub min_match_interval_secs: f64,
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome {
    Completed,
    Stopped,
    Failed(String),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            Self::Completed => JobState::Completed,
            Self::Stopped => JobState::Stopped,
            Self::Failed(_) => JobState::Failed,
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: JobState,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Consistent read of a job, taken in publication order.
#[derive(Clone, Debug)]
pub struct JobView {
    pub state: JobState,
    pub error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_frames: usize,
    pub processed_frames: usize,
    pub frames_read: usize,
    pub total_matches: usize,
    /// Results with `sequence_index` above the requested marker.
    pub new_results: Vec<MatchResult>,
    pub preview_path: Option<PathBuf>,
}

/// One scan of a video for a reference face: the aggregate shared between
/// its single writer and any number of pollers.
///
/// Mutation goes through the [`JobWriter`] token, of which at most one is
/// ever handed out. Readers only see published state: results are appended
/// before counters move, and counters settle before a terminal state is
/// recorded, so a reader that observes a terminal state also observes the
/// final results.
pub struct DetectionJob {
    id: JobId,
    video_path: PathBuf,
    reference: ReferenceFace,
    settings: JobSettings,
    created_at: DateTime<Utc>,
    lifecycle: Mutex<Lifecycle>,
    results: RwLock<Vec<MatchResult>>,
    total_frames: AtomicUsize,
    processed_frames: AtomicUsize,
    frames_read: AtomicUsize,
    preview: Mutex<Option<PathBuf>>,
    cancel_requested: AtomicBool,
    writer_claimed: AtomicBool,
}

impl DetectionJob {
    pub fn new(id: JobId, reference: ReferenceFace, video_path: PathBuf, settings: JobSettings) -> Self {
        Self {
            id,
            video_path,
            reference,
            settings,
            created_at: Utc::now(),
            lifecycle: Mutex::new(Lifecycle {
                state: JobState::Pending,
                error: None,
                started_at: None,
                finished_at: None,
            }),
            results: RwLock::new(Vec::new()),
            total_frames: AtomicUsize::new(0),
            processed_frames: AtomicUsize::new(0),
            frames_read: AtomicUsize::new(0),
            preview: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            writer_claimed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn reference(&self) -> &ReferenceFace {
        &self.reference
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> JobState {
        self.lifecycle().state
    }

    pub fn error(&self) -> Option<String> {
        self.lifecycle().error.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().finished_at
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames.load(Ordering::Acquire)
    }

    pub fn processed_frames(&self) -> usize {
        self.processed_frames.load(Ordering::Acquire)
    }

    pub fn result_count(&self) -> usize {
        self.read_results().len()
    }

    /// Results with `sequence_index > delivered`, in order.
    pub fn results_after(&self, delivered: usize) -> Vec<MatchResult> {
        let results = self.read_results();
        results[delivered.min(results.len())..].to_vec()
    }

    pub fn preview_path(&self) -> Option<PathBuf> {
        lock(&self.preview).clone()
    }

    /// Asks the running job to stop at its next frame boundary.
    ///
    /// Returns `false` (and changes nothing) once the job is terminal.
    pub fn request_cancel(&self) -> bool {
        let lifecycle = self.lifecycle();
        if lifecycle.state.is_terminal() {
            return false;
        }
        self.cancel_requested.store(true, Ordering::Release);
        true
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Reads state before results so a terminal view is never missing
    /// results published ahead of the transition.
    pub fn view(&self, delivered: usize) -> JobView {
        let (state, error, finished_at) = {
            let l = self.lifecycle();
            (l.state, l.error.clone(), l.finished_at)
        };
        let processed_frames = self.processed_frames();
        let frames_read = self.frames_read.load(Ordering::Acquire);
        let total_frames = self.total_frames();
        let (total_matches, new_results) = {
            let results = self.read_results();
            (
                results.len(),
                results[delivered.min(results.len())..].to_vec(),
            )
        };
        JobView {
            state,
            error,
            finished_at,
            total_frames,
            processed_frames,
            frames_read,
            total_matches,
            new_results,
            preview_path: self.preview_path(),
        }
    }

    /// Hands out the only writer this job will ever have.
    pub fn claim_writer(self: &Arc<Self>) -> Option<JobWriter> {
        self.writer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(JobWriter {
            job: Arc::clone(self),
            finished: false,
        })
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        lock(&self.lifecycle)
    }

    fn read_results(&self) -> std::sync::RwLockReadGuard<'_, Vec<MatchResult>> {
        self.results.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for DetectionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionJob")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("video_path", &self.video_path)
            .field("processed_frames", &self.processed_frames())
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Exclusive mutation rights over one [`DetectionJob`].
///
/// Consumed by [`JobWriter::finish`]. Dropping an unfinished writer marks
/// the job Failed so a crashed worker never leaves it Running.
pub struct JobWriter {
    job: Arc<DetectionJob>,
    finished: bool,
}

impl JobWriter {
    pub fn job(&self) -> &Arc<DetectionJob> {
        &self.job
    }

    /// Pending → Running. Returns `false` if the job was already started.
    pub fn start(&mut self) -> bool {
        let mut l = self.job.lifecycle();
        if !l.state.can_transition_to(JobState::Running) {
            return false;
        }
        l.state = JobState::Running;
        l.started_at = Some(Utc::now());
        true
    }

    /// Container frame count; 0 leaves progress indeterminate.
    pub fn set_total_frames(&self, total: usize) {
        self.job.total_frames.store(total, Ordering::Release);
    }

    /// Records that the sample at `frame_index` has been fully handled.
    ///
    /// A known frame total is raised if decoding runs past it.
    pub fn record_frame(&self, frame_index: usize) {
        let read = frame_index + 1;
        if self.job.total_frames() > 0 {
            self.job.total_frames.fetch_max(read, Ordering::AcqRel);
        }
        self.job.frames_read.fetch_max(read, Ordering::AcqRel);
        self.job.processed_frames.fetch_add(1, Ordering::AcqRel);
    }

    /// Index the next appended result must carry.
    pub fn next_sequence_index(&self) -> u64 {
        self.job.result_count() as u64 + 1
    }

    pub fn push_result(&self, result: MatchResult) {
        let mut results = self.job.results.write().unwrap_or_else(|e| e.into_inner());
        debug_assert_eq!(
            result.sequence_index,
            results.len() as u64 + 1,
            "results must be appended in sequence order"
        );
        results.push(result);
    }

    pub fn set_preview(&self, path: PathBuf) {
        *lock(&self.job.preview) = Some(path);
    }

    /// Moves the job to its terminal state and gives up the writer.
    pub fn finish(mut self, outcome: JobOutcome) -> JobState {
        self.finished = true;
        self.transition(outcome)
    }

    fn transition(&self, outcome: JobOutcome) -> JobState {
        let mut l = self.job.lifecycle();
        if l.state.is_terminal() {
            return l.state;
        }
        if l.state == JobState::Pending {
            l.started_at = Some(Utc::now());
        }
        l.state = outcome.state();
        if let JobOutcome::Failed(reason) = outcome {
            l.error = Some(reason);
        }
        l.finished_at = Some(Utc::now());
        l.state
    }
}

impl Drop for JobWriter {
    fn drop(&mut self) {
        if !self.finished {
            log::error!("Job {} worker exited without finishing", self.job.id);
            self.transition(JobOutcome::Failed(
                "job worker exited unexpectedly".to_string(),
            ));
        }
    }
}
