use std::sync::Arc;
use std::time::Instant;

use crate::monitoring::domain::detection_job::{JobOutcome, JobWriter};
use crate::monitoring::domain::job_event_log::{JobEvent, JobEventLog};
use crate::monitoring::domain::job_state::JobState;
use crate::monitoring::domain::match_result::MatchResult;
use crate::monitoring::infrastructure::artifact_store::ArtifactStore;
use crate::recognition::domain::face_matcher::{FaceMatcher, MatchCandidate};
use crate::recognition::domain::match_annotator::outline_regions;
use crate::shared::timecode::format_timestamp;
use crate::video::domain::frame_sampler::{FrameSample, FrameSampler};
use crate::video::domain::video_reader::VideoReader;

/// Scans one job's video for its reference face.
///
/// Single-use: `execute` consumes the use case and drives the job from
/// Running to a terminal state. Cancellation is observed between frames,
/// never during decode or matching.
pub struct DetectMatchesUseCase {
    matcher: FaceMatcher,
    artifacts: Arc<ArtifactStore>,
    events: Arc<dyn JobEventLog>,
    preview_every: usize,
}

/// Counters for the end-of-job summary.
struct ScanStats {
    started: Instant,
    sampled: usize,
    matched_frames: usize,
    recorded: usize,
}

impl DetectMatchesUseCase {
    pub fn new(
        matcher: FaceMatcher,
        artifacts: Arc<ArtifactStore>,
        events: Arc<dyn JobEventLog>,
        preview_every: usize,
    ) -> Self {
        Self {
            matcher,
            artifacts,
            events,
            preview_every: preview_every.max(1),
        }
    }

    /// Runs the job to completion and returns its terminal state.
    pub fn execute(mut self, mut writer: JobWriter, reader: Box<dyn VideoReader>) -> JobState {
        let job = Arc::clone(writer.job());
        writer.start();
        self.events.record(
            job.id(),
            JobEvent::StateChanged {
                state: JobState::Running,
                error: None,
            },
        );

        let stride = job.settings().detection_frequency as usize;
        let sampler = match FrameSampler::open(reader, job.video_path(), stride) {
            Ok(sampler) => sampler,
            Err(e) => return self.finish(writer, JobOutcome::Failed(e.to_string()), None),
        };
        writer.set_total_frames(sampler.total_frame_count());
        log::info!(
            "Job {} scanning {} ({} frames at {:.2} fps, {} samples every {stride})",
            job.id(),
            job.video_path().display(),
            sampler.total_frame_count(),
            sampler.metadata().fps,
            sampler.expected_samples()
        );

        let mut stats = ScanStats {
            started: Instant::now(),
            sampled: 0,
            matched_frames: 0,
            recorded: 0,
        };
        let outcome = self.scan(&writer, sampler, &mut stats);
        self.finish(writer, outcome, Some(stats))
    }

    fn scan(&mut self, writer: &JobWriter, mut sampler: FrameSampler, stats: &mut ScanStats) -> JobOutcome {
        let job = Arc::clone(writer.job());
        let settings = job.settings().clone();
        let mut last_recorded: Option<f64> = None;

        loop {
            if job.is_cancel_requested() {
                return JobOutcome::Stopped;
            }
            let sample = match sampler.next() {
                None => return JobOutcome::Completed,
                Some(Err(e)) => return JobOutcome::Failed(e.to_string()),
                Some(Ok(sample)) => sample,
            };
            let FrameSample {
                mut frame,
                frame_index,
                timestamp,
            } = sample;

            let candidates = self
                .matcher
                .match_frame(&frame, job.reference(), settings.tolerance);
            if !candidates.is_empty() {
                stats.matched_frames += 1;
                let regions: Vec<_> = candidates.iter().map(|c| c.region.clone()).collect();
                outline_regions(&mut frame, &regions);
            }

            let due = last_recorded
                .map_or(true, |last| timestamp - last >= settings.min_match_interval_secs);
            if !candidates.is_empty() && due {
                let sequence_index = writer.next_sequence_index();
                let screenshot_path =
                    match self.artifacts.save_screenshot(job.id(), sequence_index, &frame) {
                        Ok(path) => path,
                        Err(e) => {
                            log::warn!(
                                "Job {} screenshot #{sequence_index} not saved: {e}",
                                job.id()
                            );
                            self.artifacts.screenshot_path(job.id(), sequence_index)
                        }
                    };
                let result = MatchResult {
                    sequence_index,
                    timestamp,
                    formatted_time: format_timestamp(timestamp),
                    match_count: candidates.len(),
                    screenshot_path,
                    frame_index,
                    best_distance: best_distance(&candidates),
                };
                log::info!(
                    "Job {} match #{sequence_index} at {} ({} faces)",
                    job.id(),
                    result.formatted_time,
                    result.match_count
                );
                self.events.record(job.id(), JobEvent::Matched(&result));
                writer.push_result(result);
                last_recorded = Some(timestamp);
                stats.recorded += 1;
            }

            writer.record_frame(frame_index);
            stats.sampled += 1;

            if (stats.sampled - 1) % self.preview_every == 0 {
                match self.artifacts.save_preview(job.id(), &frame) {
                    Ok(path) => writer.set_preview(path),
                    Err(e) => log::warn!("Job {} preview not updated: {e}", job.id()),
                }
            }
        }
    }

    fn finish(&self, writer: JobWriter, outcome: JobOutcome, stats: Option<ScanStats>) -> JobState {
        let job = Arc::clone(writer.job());
        let error = match &outcome {
            JobOutcome::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        let state = writer.finish(outcome);
        self.events.record(
            job.id(),
            JobEvent::StateChanged {
                state,
                error: error.as_deref(),
            },
        );

        match (&error, stats) {
            (Some(reason), _) => log::error!("Job {} failed: {reason}", job.id()),
            (None, Some(stats)) => log::info!("Job {} {state}: {}", job.id(), stats.summary()),
            (None, None) => log::info!("Job {} {state}", job.id()),
        }
        state
    }
}

impl ScanStats {
    fn summary(&self) -> String {
        let elapsed = self.started.elapsed().as_secs_f64();
        let mut text = format!(
            "{} frames sampled, {} with matches, {} recorded in {elapsed:.1}s",
            self.sampled, self.matched_frames, self.recorded
        );
        if self.sampled > 0 && elapsed > 0.0 {
            text.push_str(&format!(" ({:.1} frames/s)", self.sampled as f64 / elapsed));
        }
        text
    }
}

fn best_distance(candidates: &[MatchCandidate]) -> f64 {
    candidates
        .iter()
        .map(|c| c.distance)
        .fold(f64::INFINITY, f64::min)
}
