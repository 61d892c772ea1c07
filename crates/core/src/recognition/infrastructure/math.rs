//! Box geometry shared by the detector backends.

/// IoU between two boxes given as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = iw * ih;
    if inter <= 0.0 {
        return 0.0;
    }
    let area = |r: &[f64; 4]| (r[2] - r[0]) * (r[3] - r[1]);
    inter / (area(a) + area(b) - inter)
}

/// Greedy non-maximum suppression.
///
/// Returns indices of the kept boxes, highest score first.
pub fn nms(boxes: &[[f64; 4]], scores: &[f64], iou_thresh: f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        if keep
            .iter()
            .all(|&k| bbox_iou(&boxes[k], &boxes[i]) <= iou_thresh)
        {
            keep.push(i);
        }
    }
    keep
}
