use crate::shared::frame::Frame;
use crate::shared::region::Region;

const BOX_COLOR: [u8; 3] = [0, 255, 0];
const BOX_THICKNESS: i32 = 2;

/// Draws a green outline around each region, clipped to the frame.
pub fn outline_regions(frame: &mut Frame, regions: &[Region]) {
    let fw = frame.width() as i32;
    let fh = frame.height() as i32;
    let data = frame.data_mut();

    let mut paint = |x: i32, y: i32| {
        if x >= 0 && y >= 0 && x < fw && y < fh {
            let offset = ((y * fw + x) * 3) as usize;
            data[offset..offset + 3].copy_from_slice(&BOX_COLOR);
        }
    };

    for r in regions.iter().filter(|r| !r.is_empty()) {
        let (x1, y1) = (r.x, r.y);
        let (x2, y2) = (r.x + r.width - 1, r.y + r.height - 1);
        for t in 0..BOX_THICKNESS {
            for x in x1..=x2 {
                paint(x, y1 + t);
                paint(x, y2 - t);
            }
            for y in y1..=y2 {
                paint(x1 + t, y);
                paint(x2 - t, y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let v = frame.as_ndarray();
        [v[[y, x, 0]], v[[y, x, 1]], v[[y, x, 2]]]
    }

    fn region(x: i32, y: i32, w: i32, h: i32) -> Region {
        Region {
            x,
            y,
            width: w,
            height: h,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_outline_paints_border_only() {
        let mut frame = Frame::new(vec![0u8; 20 * 20 * 3], 20, 20, 0);
        outline_regions(&mut frame, &[region(5, 5, 10, 10)]);

        assert_eq!(pixel(&frame, 5, 5), BOX_COLOR);
        assert_eq!(pixel(&frame, 14, 14), BOX_COLOR);
        assert_eq!(pixel(&frame, 6, 10), BOX_COLOR);
        assert_eq!(pixel(&frame, 10, 10), [0, 0, 0]);
        assert_eq!(pixel(&frame, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn test_outline_clipped_at_frame_edge() {
        let mut frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 0);
        outline_regions(&mut frame, &[region(-5, -5, 30, 30)]);
        assert_eq!(pixel(&frame, 5, 5), [0, 0, 0]);
    }

    #[test]
    fn test_empty_region_ignored() {
        let mut frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 0);
        outline_regions(&mut frame, &[region(2, 2, 0, 5)]);
        assert!(frame.data().iter().all(|&b| b == 0));
    }
}
