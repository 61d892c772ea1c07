use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::monitoring::detect_matches_use_case::DetectMatchesUseCase;
use crate::monitoring::domain::detection_job::{DetectionJob, JobSettings};
use crate::monitoring::domain::job_event_log::JobEventLog;
use crate::monitoring::domain::job_id::JobId;
use crate::monitoring::domain::job_registry::JobRegistry;
use crate::monitoring::domain::job_state::JobState;
use crate::monitoring::domain::match_result::MatchResult;
use crate::monitoring::domain::progress_reporter::{ProgressReporter, ProgressSnapshot};
use crate::monitoring::infrastructure::artifact_store::ArtifactStore;
use crate::monitoring::infrastructure::jsonl_event_log::JsonlEventLog;
use crate::monitoring::monitor_error::MonitorError;
use crate::recognition::domain::face_matcher::FaceMatcher;
use crate::recognition::domain::face_recognizer::RecognizerFactory;
use crate::shared::constants::clamp_tolerance;
use crate::shared::monitor_config::MonitorConfig;
use crate::video::domain::video_reader::VideoReaderFactory;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReaderFactory;
use crate::video::infrastructure::image_file_writer::ImageFileWriter;
use crate::video::infrastructure::reference_image::decode_reference_image;

/// One scan request. Unset fields fall back to the service configuration.
#[derive(Clone, Debug, Default)]
pub struct SubmitRequest {
    /// Encoded PNG or JPEG bytes of the person to look for.
    pub reference_image: Vec<u8>,
    pub video_path: PathBuf,
    pub tolerance: Option<f64>,
    pub detection_frequency: Option<u32>,
    pub min_match_interval_secs: Option<f64>,
}

/// Every result of a job, with its current state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobResults {
    pub job_id: JobId,
    pub state: JobState,
    pub completed: bool,
    pub results: Vec<MatchResult>,
    pub error: Option<String>,
}

/// Submit, poll, cancel and clean up face-monitoring jobs.
///
/// Submission validates everything it can synchronously (frequency,
/// reference face, video readability) so a returned id always belongs to
/// a job that is already Running.
pub struct FaceMonitorService {
    config: MonitorConfig,
    recognizers: Arc<dyn RecognizerFactory>,
    readers: Arc<dyn VideoReaderFactory>,
    artifacts: Arc<ArtifactStore>,
    events: Arc<dyn JobEventLog>,
    registry: Arc<JobRegistry>,
    reporter: ProgressReporter,
}

impl FaceMonitorService {
    pub fn new(
        config: MonitorConfig,
        recognizers: Arc<dyn RecognizerFactory>,
        readers: Arc<dyn VideoReaderFactory>,
        artifacts: Arc<ArtifactStore>,
        events: Arc<dyn JobEventLog>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        Self {
            config,
            recognizers,
            readers,
            artifacts,
            events,
            reporter: ProgressReporter::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// ffmpeg decoding, image files under `config.output_dir` and a JSONL
    /// event log.
    pub fn with_defaults(config: MonitorConfig, recognizers: Arc<dyn RecognizerFactory>) -> Self {
        let artifacts = Arc::new(ArtifactStore::new(
            config.output_dir.clone(),
            Box::new(ImageFileWriter::new()),
        ));
        let events = Arc::new(JsonlEventLog::new(artifacts.event_log_path()));
        Self::new(
            config,
            recognizers,
            Arc::new(FfmpegReaderFactory),
            artifacts,
            events,
        )
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn submit(&self, request: SubmitRequest) -> Result<JobId, MonitorError> {
        let frequency = request
            .detection_frequency
            .unwrap_or(self.config.detection_frequency);
        if frequency == 0 {
            return Err(MonitorError::InvalidFrequency(frequency));
        }
        let settings = JobSettings {
            tolerance: clamp_tolerance(request.tolerance.unwrap_or(self.config.tolerance)),
            detection_frequency: frequency,
            min_match_interval_secs: request
                .min_match_interval_secs
                .unwrap_or(self.config.min_match_interval_secs)
                .max(0.0),
        };

        let image = decode_reference_image(&request.reference_image)
            .map_err(|e| MonitorError::InvalidReference(e.to_string()))?;
        let recognizer = self
            .recognizers
            .create()
            .map_err(|e| MonitorError::Worker(format!("face recognizer unavailable: {e}")))?;
        let mut matcher = FaceMatcher::new(recognizer);
        let reference = matcher
            .encode_reference(&image)
            .map_err(|e| MonitorError::InvalidReference(e.to_string()))?;

        let mut checker = self.readers.create();
        let opened = checker.open(&request.video_path);
        checker.close();
        let metadata = opened.map_err(|e| {
            MonitorError::InvalidVideo(format!("{}: {e}", request.video_path.display()))
        })?;
        log::debug!(
            "Video {} is {}x{} at {:.2} fps, {} frames",
            request.video_path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames
        );

        let job = Arc::new(DetectionJob::new(
            JobId::new(),
            reference,
            request.video_path,
            settings,
        ));
        self.artifacts.prepare()?;

        let use_case = DetectMatchesUseCase::new(
            matcher,
            Arc::clone(&self.artifacts),
            Arc::clone(&self.events),
            self.config.preview_every,
        );
        let reader = self.readers.create();
        self.registry.submit(job, move |writer| {
            use_case.execute(writer, reader);
        })
    }

    pub fn poll(&self, id: JobId, delivered: usize) -> Result<ProgressSnapshot, MonitorError> {
        self.reporter.poll(id, delivered)
    }

    pub fn results(&self, id: JobId) -> Result<JobResults, MonitorError> {
        let job = self.registry.get(id)?;
        let view = job.view(0);
        Ok(JobResults {
            job_id: id,
            state: view.state,
            completed: view.state.is_terminal(),
            results: view.new_results,
            error: view.error,
        })
    }

    /// Asks a job to stop. Unknown and finished jobs are left alone;
    /// returns whether a running job was asked.
    pub fn cancel(&self, id: JobId) -> bool {
        match self.registry.cancel(id) {
            Ok(requested) => requested,
            Err(e) => {
                log::debug!("Cancel ignored: {e}");
                false
            }
        }
    }

    pub fn cancel_all(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            log::info!("Cancellation requested for {cancelled} jobs");
        }
        cancelled
    }

    /// Blocks until the job's worker has finished running it. Safe to call
    /// from several threads at once.
    pub fn wait(&self, id: JobId) -> Result<(), MonitorError> {
        self.registry.wait(id)
    }

    /// Forgets finished jobs older than `max_age` and deletes their
    /// screenshots and previews. Returns the number of jobs removed.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let removed = self.registry.remove_stale(max_age);
        for job in &removed {
            let files = self.artifacts.remove_job_artifacts(job.id());
            log::debug!("Job {} cleaned up ({files} files)", job.id());
        }
        removed.len()
    }

    /// Applies the configured file retention to the output directory.
    pub fn sweep_expired_files(&self) -> usize {
        self.artifacts
            .sweep_expired_files(self.config.file_retention_days)
    }
}
