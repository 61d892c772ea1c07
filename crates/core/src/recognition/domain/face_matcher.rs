use thiserror::Error;

use crate::recognition::domain::face_recognizer::FaceRecognizer;
use crate::recognition::domain::reference_face::ReferenceFace;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("no face found in the reference image")]
    NoFace,
    #[error("failed to analyse the reference image: {0}")]
    Recognizer(String),
}

/// A detected face whose distance to the reference is within tolerance.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchCandidate {
    pub region: Region,
    pub distance: f64,
}

/// Compares faces found in frames against a [`ReferenceFace`].
pub struct FaceMatcher {
    recognizer: Box<dyn FaceRecognizer>,
}

impl FaceMatcher {
    pub fn new(recognizer: Box<dyn FaceRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Encodes the most prominent face of a reference photo.
    ///
    /// Only the largest detected face is kept.
    pub fn encode_reference(&mut self, image: &Frame) -> Result<ReferenceFace, ReferenceError> {
        let faces = self
            .recognizer
            .detect_and_encode(image)
            .map_err(|e| ReferenceError::Recognizer(e.to_string()))?;

        let largest = faces
            .into_iter()
            .filter(|f| !f.encoding.is_empty())
            .max_by_key(|f| f.region.area())
            .ok_or(ReferenceError::NoFace)?;

        ReferenceFace::new(vec![largest.encoding]).ok_or(ReferenceError::NoFace)
    }

    /// Faces in `frame` within `tolerance` of the reference, in detection order.
    ///
    /// A recognizer failure is logged and yields no candidates.
    pub fn match_frame(
        &mut self,
        frame: &Frame,
        reference: &ReferenceFace,
        tolerance: f64,
    ) -> Vec<MatchCandidate> {
        let faces = match self.recognizer.detect_and_encode(frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                return Vec::new();
            }
        };

        faces
            .into_iter()
            .filter_map(|face| {
                let distance = reference.best_distance(&face.encoding);
                (distance <= tolerance).then_some(MatchCandidate {
                    region: face.region,
                    distance,
                })
            })
            .collect()
    }
}
