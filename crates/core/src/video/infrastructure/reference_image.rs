use crate::shared::frame::Frame;

/// Decodes an uploaded reference photo (PNG/JPEG bytes) into an RGB frame.
pub fn decode_reference_image(bytes: &[u8]) -> Result<Frame, image::ImageError> {
    let img = image::load_from_memory(bytes)?.into_rgb8();
    Ok(Frame::from_rgb_image(img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(img: &image::RgbImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decodes_png() {
        let mut img = image::RgbImage::new(8, 6);
        img.put_pixel(2, 3, image::Rgb([1, 2, 3]));
        let frame = decode_reference_image(&encode(&img, image::ImageFormat::Png)).unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert_eq!(frame.index(), 0);
        assert_eq!(frame.as_ndarray()[[3, 2, 0]], 1);
    }

    #[test]
    fn test_decodes_jpeg() {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([200, 10, 10]));
        let frame = decode_reference_image(&encode(&img, image::ImageFormat::Jpeg)).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 16));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(decode_reference_image(b"not an image").is_err());
        assert!(decode_reference_image(&[]).is_err());
    }
}
