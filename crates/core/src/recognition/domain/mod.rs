pub mod face_encoding;
pub mod face_matcher;
pub mod face_recognizer;
pub mod match_annotator;
pub mod reference_face;
