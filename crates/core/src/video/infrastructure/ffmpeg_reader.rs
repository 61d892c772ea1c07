use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as VideoFrame;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::{VideoReader, VideoReaderFactory};

/// Decodes video files through libavformat/libavcodec into RGB24 frames.
pub struct FfmpegReader {
    stream: Option<OpenStream>,
}

/// Demuxer, decoder and RGB converter for one opened file.
struct OpenStream {
    input: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: the reader is moved to the sampler thread once and never shared;
// the ffmpeg contexts it owns are only touched from that thread.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { stream: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let input = ffmpeg_next::format::input(path)?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("no video stream found")?;
        let stream_index = stream.index();

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let (width, height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            return Err("video stream has no frame size".into());
        }

        let fps = rational_to_f64(stream.avg_frame_rate())
            .filter(|f| *f > 0.0)
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        let total_frames = match stream.frames() {
            n if n > 0 => n as usize,
            _ => estimate_frame_count(stream.duration(), stream.time_base(), fps),
        };

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.stream = Some(OpenStream {
            input,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        });
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.stream.as_mut() {
            Some(stream) => Box::new(DecodeIter {
                stream,
                next_index: 0,
                draining: false,
                finished: false,
            }),
            None => Box::new(std::iter::once(Err("FfmpegReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

/// Hands out [`FfmpegReader`]s.
#[derive(Default)]
pub struct FfmpegReaderFactory;

impl VideoReaderFactory for FfmpegReaderFactory {
    fn create(&self) -> Box<dyn VideoReader> {
        Box::new(FfmpegReader::new())
    }
}

/// Pulls packets on demand and yields one decoded frame per step.
struct DecodeIter<'a> {
    stream: &'a mut OpenStream,
    next_index: usize,
    draining: bool,
    finished: bool,
}

impl DecodeIter<'_> {
    fn receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = VideoFrame::empty();
        self.stream.decoder.receive_frame(&mut decoded).ok()?;

        let index = self.next_index;
        self.next_index += 1;

        let mut rgb = VideoFrame::empty();
        if let Err(e) = self.stream.scaler.run(&decoded, &mut rgb) {
            return Some(Err(format!("frame {index}: {e}").into()));
        }
        let pixels = packed_rgb(&rgb, self.stream.width, self.stream.height);
        Some(Ok(Frame::new(
            pixels,
            self.stream.width,
            self.stream.height,
            index,
        )))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if let Some(result) = self.receive() {
                return Some(result);
            }
            if self.draining {
                self.finished = true;
                return None;
            }

            match self.stream.input.packets().next() {
                Some((packet_stream, packet)) => {
                    if packet_stream.index() != self.stream.stream_index {
                        continue;
                    }
                    if let Err(e) = self.stream.decoder.send_packet(&packet) {
                        log::debug!("Decoder rejected packet: {e}");
                    }
                }
                None => {
                    let _ = self.stream.decoder.send_eof();
                    self.draining = true;
                }
            }
        }
    }
}

fn rational_to_f64(r: ffmpeg_next::Rational) -> Option<f64> {
    (r.denominator() != 0).then(|| r.numerator() as f64 / r.denominator() as f64)
}

/// Frame count from stream duration when the container omits it.
fn estimate_frame_count(duration: i64, time_base: ffmpeg_next::Rational, fps: f64) -> usize {
    match rational_to_f64(time_base) {
        Some(tb) if duration > 0 && fps > 0.0 => (duration as f64 * tb * fps).round() as usize,
        _ => 0,
    }
}

/// Strips per-row padding from an RGB24 ffmpeg frame.
fn packed_rgb(rgb: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let stride = rgb.stride(0);
    let plane = rgb.data(0);
    (0..height as usize)
        .flat_map(|row| &plane[row * stride..row * stride + row_bytes])
        .copied()
        .collect()
}
