use std::path::Path;

use ndarray::Array4;

use crate::recognition::infrastructure::execution_provider::build_session;
use crate::recognition::infrastructure::math::nms;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Model input side when the graph leaves it dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO letterbox padding value.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// YOLO face detector backed by an ONNX Runtime session.
///
/// Produces one [`Region`] per face after confidence filtering and NMS,
/// in frame pixel coordinates.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

/// Geometry of a letterboxed frame, used to map boxes back.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Letterbox {
    fn unmap(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

impl OnnxYoloDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;

        // NCHW input; a fixed H is used as the square input side.
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() == 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let (input, geometry) = letterbox(frame, self.input_size);
        let outputs = self
            .session
            .run(ort::inputs![ort::value::Tensor::from_array(input)?])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or("YOLO output tensor is not contiguous")?;

        decode_detections(
            data,
            &shape,
            geometry,
            self.confidence,
            frame.width(),
            frame.height(),
        )
    }
}

/// Resizes `frame` into a padded square NCHW tensor scaled to [0, 1].
fn letterbox(frame: &Frame, target_size: u32) -> (Array4<f32>, Letterbox) {
    let (fw, fh) = (frame.width() as f64, frame.height() as f64);
    let target = target_size as usize;
    let scale = (target_size as f64 / fw).min(target_size as f64 / fh);
    let new_w = ((fw * scale).round() as usize).clamp(1, target);
    let new_h = ((fh * scale).round() as usize).clamp(1, target);
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    let mut tensor = Array4::<f32>::from_elem((1, 3, target, target), PAD_VALUE);
    let src = frame.as_ndarray();
    let (src_h, src_w) = (frame.height() as usize, frame.width() as usize);

    for y in 0..new_h {
        let sy = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w {
            let sx = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, pad_y + y, pad_x + x]] = src[[sy, sx, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        },
    )
}

/// Parses a `[1, features, anchors]` or `[1, anchors, features]` output
/// whose rows start with `cx, cy, w, h, conf`.
fn decode_detections(
    data: &[f32],
    shape: &[usize],
    geometry: Letterbox,
    min_confidence: f64,
    frame_w: u32,
    frame_h: u32,
) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
    let [_, a, b] = shape else {
        return Err(format!("unexpected YOLO output shape: {shape:?}").into());
    };
    // Anchors outnumber features, which tells the two layouts apart.
    let feature_major = a < b;
    let (anchors, features) = if feature_major { (*b, *a) } else { (*a, *b) };
    if features < 5 || data.len() < anchors * features {
        return Err(format!("YOLO output too small for shape {shape:?}").into());
    }
    let value = |anchor: usize, feature: usize| -> f64 {
        let i = if feature_major {
            feature * anchors + anchor
        } else {
            anchor * features + feature
        };
        data[i] as f64
    };

    let mut boxes = Vec::new();
    let mut scores = Vec::new();
    for anchor in 0..anchors {
        let conf = value(anchor, 4);
        if conf < min_confidence {
            continue;
        }
        let (cx, cy, w, h) = (
            value(anchor, 0),
            value(anchor, 1),
            value(anchor, 2),
            value(anchor, 3),
        );
        let (x1, y1) = geometry.unmap(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = geometry.unmap(cx + w / 2.0, cy + h / 2.0);
        boxes.push([x1, y1, x2, y2]);
        scores.push(conf);
    }

    Ok(nms(&boxes, &scores, NMS_IOU_THRESH)
        .into_iter()
        .map(|i| {
            let [x1, y1, x2, y2] = boxes[i];
            Region::from_corners(x1, y1, x2, y2, frame_w, frame_h, scores[i])
        })
        .filter(|r| !r.is_empty())
        .collect())
}
