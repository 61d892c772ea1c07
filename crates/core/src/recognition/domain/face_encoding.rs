/// An L2-normalised face embedding.
///
/// Construction normalises the input, so the dot product of two encodings
/// is their cosine similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceEncoding(Vec<f32>);

/// Largest possible cosine distance (opposite vectors).
pub const MAX_DISTANCE: f64 = 2.0;

impl FaceEncoding {
    pub fn new(mut values: Vec<f32>) -> Self {
        l2_normalize(&mut values);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cosine distance `1 - cos(a, b)` in `[0, 2]`; lower is more similar.
    ///
    /// Encodings of different length never match and report
    /// [`MAX_DISTANCE`].
    pub fn distance(&self, other: &FaceEncoding) -> f64 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return MAX_DISTANCE;
        }
        let dot: f64 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| *a as f64 * *b as f64)
            .sum();
        (1.0 - dot).clamp(0.0, MAX_DISTANCE)
    }
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
