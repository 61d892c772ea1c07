use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container-reported frame count; 0 when the container does not know.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Seconds from the start of the video to the given frame.
    ///
    /// Returns 0 when the frame rate is unknown.
    pub fn timestamp_of(&self, frame_index: usize) -> f64 {
        if self.fps > 0.0 {
            frame_index as f64 / self.fps
        } else {
            0.0
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.timestamp_of(self.total_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meta(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/test.mp4")),
        }
    }

    #[test]
    fn test_timestamp_of_frame() {
        let m = meta(30.0, 300);
        assert_relative_eq!(m.timestamp_of(0), 0.0);
        assert_relative_eq!(m.timestamp_of(60), 2.0);
        assert_relative_eq!(m.timestamp_of(45), 1.5);
    }

    #[test]
    fn test_timestamp_with_unknown_fps_is_zero() {
        let m = meta(0.0, 300);
        assert_relative_eq!(m.timestamp_of(120), 0.0);
    }

    #[test]
    fn test_duration() {
        assert_relative_eq!(meta(25.0, 250).duration_secs(), 10.0);
    }
}
