use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Decoded samples buffered ahead of the consumer.
const DEFAULT_PREFETCH: usize = 4;

/// Consecutive undecodable frames after which the source is given up on.
const MAX_CONSECUTIVE_DECODE_ERRORS: usize = 25;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("video source {path} is unreadable: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },
    #[error("detection frequency must be at least 1")]
    InvalidStride,
}

/// One sampled frame with its source position.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub frame: Frame,
    pub frame_index: usize,
    /// `frame_index / fps` in seconds.
    pub timestamp: f64,
}

/// Lazily yields every `stride`-th frame of a video in ascending order.
///
/// Decoding runs on a dedicated thread and hands samples over a bounded
/// channel. The reader is closed exactly once, on that thread, whether the
/// source is exhausted, fails, or the sampler is dropped early.
/// The sequence is finite and cannot be restarted.
pub struct FrameSampler {
    samples: Option<Receiver<Result<FrameSample, SamplerError>>>,
    decode_handle: Option<JoinHandle<()>>,
    metadata: VideoMetadata,
    stride: usize,
}

impl FrameSampler {
    /// Opens `path` with `reader` and starts decoding.
    pub fn open(
        reader: Box<dyn VideoReader>,
        path: &Path,
        stride: usize,
    ) -> Result<Self, SamplerError> {
        if stride == 0 {
            return Err(SamplerError::InvalidStride);
        }

        let mut guard = ReaderGuard { reader };
        let metadata = guard
            .reader
            .open(path)
            .map_err(|e| SamplerError::SourceUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        log::debug!(
            "Sampling {} every {stride} frames ({} frames at {:.2} fps)",
            path.display(),
            metadata.total_frames,
            metadata.fps
        );

        let (tx, rx) = crossbeam_channel::bounded(DEFAULT_PREFETCH);
        let loop_meta = metadata.clone();
        let source = path.to_path_buf();
        let handle = std::thread::Builder::new()
            .name("frame-sampler".to_string())
            .spawn(move || decode_loop(guard, tx, stride, &loop_meta, &source))
            .map_err(|e| SamplerError::SourceUnreadable {
                path: path.to_path_buf(),
                reason: format!("failed to start decoder thread: {e}"),
            })?;

        Ok(Self {
            samples: Some(rx),
            decode_handle: Some(handle),
            metadata,
            stride,
        })
    }

    /// Container-reported frame count; 0 when unknown.
    pub fn total_frame_count(&self) -> usize {
        self.metadata.total_frames
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Number of samples a fully decodable source yields.
    ///
    /// A stride larger than the video yields exactly one sample (frame 0).
    pub fn expected_samples(&self) -> usize {
        self.metadata.total_frames.div_ceil(self.stride)
    }
}

impl Iterator for FrameSampler {
    type Item = Result<FrameSample, SamplerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.samples.as_ref()?.recv().ok()
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        // Disconnect first so a decoder blocked on a full channel wakes up.
        self.samples.take();
        if let Some(handle) = self.decode_handle.take() {
            if handle.join().is_err() {
                log::error!("Frame decoder thread panicked");
            }
        }
    }
}

/// Closes the wrapped reader when dropped, on every exit path.
struct ReaderGuard {
    reader: Box<dyn VideoReader>,
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.reader.close();
    }
}

fn decode_loop(
    mut guard: ReaderGuard,
    tx: Sender<Result<FrameSample, SamplerError>>,
    stride: usize,
    metadata: &VideoMetadata,
    source: &Path,
) {
    let mut consecutive_errors = 0usize;

    for result in guard.reader.frames() {
        let frame = match result {
            Ok(frame) => {
                consecutive_errors = 0;
                frame
            }
            Err(e) => {
                consecutive_errors += 1;
                log::warn!("Skipping undecodable frame in {}: {e}", source.display());
                if consecutive_errors >= MAX_CONSECUTIVE_DECODE_ERRORS {
                    let _ = tx.send(Err(SamplerError::SourceUnreadable {
                        path: source.to_path_buf(),
                        reason: format!("{consecutive_errors} consecutive frames failed to decode"),
                    }));
                    return;
                }
                continue;
            }
        };

        let frame_index = frame.index();
        if frame_index % stride != 0 {
            continue;
        }

        let sample = FrameSample {
            timestamp: metadata.timestamp_of(frame_index),
            frame_index,
            frame,
        };
        if tx.send(Ok(sample)).is_err() {
            log::debug!("Sampler dropped; stopping decode at frame {frame_index}");
            return;
        }
    }
}
