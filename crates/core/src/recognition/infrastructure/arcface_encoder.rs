use std::path::Path;

use ndarray::Array4;

use crate::recognition::domain::face_encoding::FaceEncoding;
use crate::recognition::infrastructure::execution_provider::build_session;
use crate::shared::frame::Frame;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// ArcFace embedding model (w600k_r50) run through ONNX Runtime.
pub struct ArcFaceEncoder {
    session: ort::session::Session,
}

impl ArcFaceEncoder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: build_session(model_path)?,
        })
    }

    /// Embeds a face crop; the crop is resized to the model input.
    pub fn encode(&mut self, crop: &Frame) -> Result<FaceEncoding, Box<dyn std::error::Error>> {
        if crop.width() == 0 || crop.height() == 0 {
            return Err("empty face crop".into());
        }
        let input = ort::value::Tensor::from_array(preprocess(crop))?;
        let outputs = self.session.run(ort::inputs![input])?;
        let embedding = outputs[0].try_extract_array::<f32>()?;
        let values = embedding
            .as_slice()
            .ok_or("embedding tensor is not contiguous")?
            .to_vec();
        Ok(FaceEncoding::new(values))
    }
}

/// Nearest-neighbour resize to 112x112, scaled to [-1, 1], NCHW.
fn preprocess(crop: &Frame) -> Array4<f32> {
    let src = crop.as_ndarray();
    let (src_h, src_w) = (crop.height() as usize, crop.width() as usize);
    let sample = |dst: usize, src_len: usize| {
        (((dst as f64 + 0.5) * src_len as f64 / INPUT_SIZE as f64) as usize).min(src_len - 1)
    };

    Array4::from_shape_fn((1, 3, INPUT_SIZE, INPUT_SIZE), |(_, c, y, x)| {
        (src[[sample(y, src_h), sample(x, src_w), c]] as f32 - NORM_MEAN) / NORM_STD
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_preprocess_shape() {
        let crop = Frame::new(vec![128u8; 50 * 40 * 3], 50, 40, 0);
        assert_eq!(preprocess(&crop).shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_range() {
        let black = Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, 0);
        let white = Frame::new(vec![255u8; 8 * 8 * 3], 8, 8, 0);
        assert_relative_eq!(preprocess(&black)[[0, 0, 0, 0]], -1.0);
        assert_relative_eq!(preprocess(&white)[[0, 2, 111, 111]], 1.0);
    }

    #[test]
    fn test_preprocess_keeps_channel_order() {
        let crop = Frame::new([10u8, 20, 30].repeat(4), 2, 2, 0);
        let t = preprocess(&crop);
        assert!(t[[0, 0, 5, 5]] < t[[0, 1, 5, 5]]);
        assert!(t[[0, 1, 5, 5]] < t[[0, 2, 5, 5]]);
    }
}
