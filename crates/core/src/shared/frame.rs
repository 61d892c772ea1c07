use ndarray::ArrayView3;

use crate::shared::region::Region;

/// A decoded RGB frame: contiguous bytes in row-major order plus the index
/// of the frame in its source (0 for still images).
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Wraps a decoded `image` buffer as frame 0.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, 0)
    }

    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Extracts a square crop centred on the region, clamped to the frame.
    ///
    /// Returns `None` when the clamped crop is empty.
    pub fn square_crop(&self, region: &Region) -> Option<Frame> {
        let fw = self.width as i32;
        let fh = self.height as i32;

        let cx = region.x + region.width / 2;
        let cy = region.y + region.height / 2;
        let half = region.width.max(region.height) / 2;

        let x1 = (cx - half).clamp(0, fw) as usize;
        let y1 = (cy - half).clamp(0, fh) as usize;
        let x2 = (cx + half).clamp(0, fw) as usize;
        let y2 = (cy + half).clamp(0, fh) as usize;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let crop_w = x2 - x1;
        let crop_h = y2 - y1;
        let stride = self.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(crop_w * crop_h * CHANNELS);
        for row in y1..y2 {
            let start = row * stride + x1 * CHANNELS;
            data.extend_from_slice(&self.data[start..start + crop_w * CHANNELS]);
        }

        Some(Frame::new(data, crop_w as u32, crop_h as u32, self.index))
    }
}
