use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Reads frames from a video source.
///
/// Implementations handle codec and container details; callers only see
/// [`Frame`] and [`VideoMetadata`].
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in decode order.
    ///
    /// An `Err` item is a single undecodable frame; iteration may continue.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases the underlying stream handle.
    fn close(&mut self);
}

/// Builds a fresh reader for each validation or scan.
pub trait VideoReaderFactory: Send + Sync {
    fn create(&self) -> Box<dyn VideoReader>;
}
