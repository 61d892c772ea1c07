use std::path::Path;

use crate::shared::frame::Frame;

/// Persists a single frame as an image file.
pub trait ImageWriter: Send + Sync {
    /// Writes a frame to `path`, optionally resized to fit within `max_side`
    /// pixels on its longest edge.
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        max_side: Option<u32>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
