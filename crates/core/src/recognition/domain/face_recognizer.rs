use crate::recognition::domain::face_encoding::FaceEncoding;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// A face found in a frame together with its embedding.
#[derive(Clone, Debug)]
pub struct DetectedFace {
    pub region: Region,
    pub encoding: FaceEncoding,
}

/// Domain interface for face detection plus encoding.
///
/// Implementations may hold inference sessions or scratch buffers,
/// hence `&mut self`.
pub trait FaceRecognizer: Send {
    fn detect_and_encode(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>>;
}

/// Builds a fresh recognizer for each job.
pub trait RecognizerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FaceRecognizer>, Box<dyn std::error::Error>>;
}
