/// An axis-aligned face box in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
}

impl Region {
    /// Builds a region from `(x1, y1, x2, y2)` corners, clamped to the frame.
    pub fn from_corners(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        frame_w: u32,
        frame_h: u32,
        confidence: f64,
    ) -> Self {
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        let cx1 = x1.clamp(0.0, fw).round() as i32;
        let cy1 = y1.clamp(0.0, fh).round() as i32;
        let cx2 = x2.clamp(0.0, fw).round() as i32;
        let cy2 = y2.clamp(0.0, fh).round() as i32;
        Self {
            x: cx1,
            y: cy1,
            width: (cx2 - cx1).max(0),
            height: (cy2 - cy1).max(0),
            confidence,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}
