use std::path::Path;

use image::imageops::FilterType;

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// JPEG quality for screenshots and previews.
const JPEG_QUALITY: u8 = 90;

/// Saves frames with the `image` crate, format chosen by extension.
///
/// `.jpg`/`.jpeg` are encoded at a fixed quality; anything else uses the
/// crate's default for that extension.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        max_side: Option<u32>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut img = frame
            .to_rgb_image()
            .ok_or("frame buffer does not match its dimensions")?;

        if let Some((w, h)) = max_side.and_then(|m| fit_within(img.width(), img.height(), m)) {
            img = image::imageops::resize(&img, w, h, FilterType::Triangle);
        }

        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));

        if is_jpeg {
            let file = std::io::BufWriter::new(std::fs::File::create(path)?);
            image::codecs::jpeg::JpegEncoder::new_with_quality(file, JPEG_QUALITY)
                .encode_image(&img)?;
        } else {
            img.save(path)?;
        }
        Ok(())
    }
}

/// Target size keeping aspect ratio so the longer side is `max_side`.
///
/// `None` when the image already fits.
fn fit_within(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if max_side == 0 || longest <= max_side {
        return None;
    }
    let scale = max_side as f64 / longest as f64;
    Some((
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    ))
}
