use std::path::{Path, PathBuf};

use crate::recognition::domain::face_recognizer::{
    DetectedFace, FaceRecognizer, RecognizerFactory,
};
use crate::recognition::infrastructure::arcface_encoder::ArcFaceEncoder;
use crate::recognition::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crate::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{self, ModelResolveError, ProgressFn};

/// YOLO detection followed by ArcFace encoding of each face crop.
pub struct OnnxFaceRecognizer {
    detector: OnnxYoloDetector,
    encoder: ArcFaceEncoder,
}

impl OnnxFaceRecognizer {
    pub fn new(detector: OnnxYoloDetector, encoder: ArcFaceEncoder) -> Self {
        Self { detector, encoder }
    }
}

impl FaceRecognizer for OnnxFaceRecognizer {
    fn detect_and_encode(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        let regions = self.detector.detect(frame)?;
        let mut faces = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(crop) = frame.square_crop(&region) else {
                continue;
            };
            let encoding = self.encoder.encode(&crop)?;
            faces.push(DetectedFace { region, encoding });
        }
        Ok(faces)
    }
}

/// Creates [`OnnxFaceRecognizer`]s from resolved model files.
pub struct OnnxRecognizerFactory {
    detector_model: PathBuf,
    embedding_model: PathBuf,
    confidence: f64,
}

impl OnnxRecognizerFactory {
    pub fn new(detector_model: PathBuf, embedding_model: PathBuf, confidence: f64) -> Self {
        Self {
            detector_model,
            embedding_model,
            confidence,
        }
    }

    /// Resolves both models from the cache, `bundled_dir`, or the network.
    pub fn resolve(
        bundled_dir: Option<&Path>,
        confidence: f64,
        progress: impl Fn(&str) -> Option<ProgressFn>,
    ) -> Result<Self, ModelResolveError> {
        let detector_model = model_resolver::resolve(
            YOLO_MODEL_NAME,
            YOLO_MODEL_URL,
            bundled_dir,
            progress(YOLO_MODEL_NAME),
        )?;
        let embedding_model = model_resolver::resolve(
            EMBEDDING_MODEL_NAME,
            EMBEDDING_MODEL_URL,
            bundled_dir,
            progress(EMBEDDING_MODEL_NAME),
        )?;
        Ok(Self::new(detector_model, embedding_model, confidence))
    }
}

impl RecognizerFactory for OnnxRecognizerFactory {
    fn create(&self) -> Result<Box<dyn FaceRecognizer>, Box<dyn std::error::Error>> {
        let detector = OnnxYoloDetector::new(&self.detector_model, self.confidence)?;
        let encoder = ArcFaceEncoder::new(&self.embedding_model)?;
        Ok(Box::new(OnnxFaceRecognizer::new(detector, encoder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_with_missing_models_fails() {
        let dir = tempfile::tempdir().unwrap();
        let factory = OnnxRecognizerFactory::new(
            dir.path().join("missing-detector.onnx"),
            dir.path().join("missing-embedder.onnx"),
            0.5,
        );
        assert!(factory.create().is_err());
    }
}
