pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Usable tolerance range; lower is stricter.
pub const MIN_TOLERANCE: f64 = 0.3;
pub const MAX_TOLERANCE: f64 = 0.7;
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Process every Nth frame (one sample per second at 30 fps).
pub const DEFAULT_DETECTION_FREQUENCY: u32 = 30;

/// Seconds that must separate two recorded matches.
pub const DEFAULT_MIN_MATCH_INTERVAL_SECS: f64 = 2.0;

pub const DEFAULT_FILE_RETENTION_DAYS: u32 = 7;

/// Temp previews are swept after one day regardless of retention.
pub const TEMP_RETENTION_DAYS: u32 = 1;

/// Sampled frames between live preview refreshes.
pub const DEFAULT_PREVIEW_EVERY: usize = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

pub const SCREENSHOTS_DIR: &str = "screenshots";
pub const LOGS_DIR: &str = "logs";
pub const TEMP_DIR: &str = "temp";
pub const UPLOADS_DIR: &str = "uploads";
pub const EVENT_LOG_FILE: &str = "detections.jsonl";

/// Clamps a tolerance into [`MIN_TOLERANCE`, `MAX_TOLERANCE`].
///
/// NaN falls back to the default.
pub fn clamp_tolerance(tolerance: f64) -> f64 {
    if tolerance.is_nan() {
        return DEFAULT_TOLERANCE;
    }
    tolerance.clamp(MIN_TOLERANCE, MAX_TOLERANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.1, 0.3)]
    #[case(0.3, 0.3)]
    #[case(0.55, 0.55)]
    #[case(0.7, 0.7)]
    #[case(1.2, 0.7)]
    #[case(f64::NAN, DEFAULT_TOLERANCE)]
    fn test_clamp_tolerance(#[case] input: f64, #[case] expected: f64) {
        assert_relative_eq!(clamp_tolerance(input), expected);
    }
}
