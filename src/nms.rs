//! Non-maximum suppression over decoded candidates.

use crate::boxes::Detection;

/// Greedy per-class suppression of duplicate detections.
///
/// Candidates are sorted by confidence descending; each survivor suppresses
/// every later candidate of the same class whose IoU with it exceeds
/// `nms_threshold`. Different classes never suppress each other. The result
/// is in confidence-descending order with at most one box per spatial cluster
/// per class.
///
/// This is O(n²) over the post-threshold candidate set. That set is small in
/// practice (well under 200), so bucketing by class first has not been worth
/// the bookkeeping; revisit before reusing this on dense candidate grids.
pub fn non_maximum_suppression(
    mut candidates: Vec<Detection>,
    nms_threshold: f32,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut suppressed = vec![false; candidates.len()];
    let mut results = Vec::with_capacity(candidates.len() / 4 + 1);

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        let current = candidates[i];
        results.push(current);

        for j in (i + 1)..candidates.len() {
            if suppressed[j] || candidates[j].class_id != current.class_id {
                continue;
            }
            if current.rect.iou(&candidates[j].rect) > nms_threshold {
                suppressed[j] = true;
            }
        }
    }

    results
}
