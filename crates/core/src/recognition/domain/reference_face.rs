use crate::recognition::domain::face_encoding::{FaceEncoding, MAX_DISTANCE};

/// Encodings of the person being searched for. Immutable once built.
#[derive(Clone, Debug)]
pub struct ReferenceFace {
    encodings: Vec<FaceEncoding>,
}

impl ReferenceFace {
    /// Returns `None` when no encodings are given.
    pub fn new(encodings: Vec<FaceEncoding>) -> Option<Self> {
        if encodings.is_empty() {
            None
        } else {
            Some(Self { encodings })
        }
    }

    pub fn encodings(&self) -> &[FaceEncoding] {
        &self.encodings
    }

    /// Smallest distance from `candidate` to any reference encoding.
    pub fn best_distance(&self, candidate: &FaceEncoding) -> f64 {
        self.encodings
            .iter()
            .map(|e| e.distance(candidate))
            .fold(MAX_DISTANCE, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_reference_rejected() {
        assert!(ReferenceFace::new(Vec::new()).is_none());
    }

    #[test]
    fn test_best_distance_takes_closest_encoding() {
        let reference = ReferenceFace::new(vec![
            FaceEncoding::new(vec![1.0, 0.0]),
            FaceEncoding::new(vec![0.0, 1.0]),
        ])
        .unwrap();
        let candidate = FaceEncoding::new(vec![0.1, 1.0]);
        let expected = reference.encodings()[1].distance(&candidate);
        assert_relative_eq!(reference.best_distance(&candidate), expected);
        assert!(expected < 0.01);
    }
}
