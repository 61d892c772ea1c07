use std::path::PathBuf;

use serde::Serialize;

/// One recorded frame in which the reference face was found.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    /// 1-based, assigned in discovery order, never reused within a job.
    pub sequence_index: u64,
    pub timestamp: f64,
    /// `timestamp` as `HH:MM:SS`.
    pub formatted_time: String,
    /// Faces in the frame that matched.
    pub match_count: usize,
    pub screenshot_path: PathBuf,
    pub frame_index: usize,
    /// Smallest distance among the matching faces.
    pub best_distance: f64,
}
