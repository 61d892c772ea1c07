pub mod arcface_encoder;
mod execution_provider;
mod math;
pub mod onnx_face_recognizer;
pub mod onnx_yolo_detector;
