use serde::Serialize;

/// An axis-aligned rectangle in source-image pixel space.
///
/// This crate uses the standard convention of the left side of the image being
/// x=0 and the top of the image being y=0. A valid rectangle always satisfies
/// `left < right` and `top < bottom`; [`BoxRect::new`] refuses anything else,
/// so a degenerate candidate is dropped before it can become a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoxRect {
    /// Checks that the rectangle has positive extent before constructing.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Option<Self> {
        if left < right && top < bottom {
            Some(BoxRect {
                left,
                top,
                right,
                bottom,
            })
        } else {
            None
        }
    }

    pub fn area(&self) -> i64 {
        (self.right - self.left) as i64 * (self.bottom - self.top) as i64
    }

    /// Intersection over union with another rectangle.
    ///
    /// Returns 0 when the rectangles do not overlap, and also when the union
    /// is empty, so the result is always a finite value in `[0, 1]`.
    pub fn iou(&self, other: &BoxRect) -> f32 {
        let x1 = self.left.max(other.left);
        let y1 = self.top.max(other.top);
        let x2 = self.right.min(other.right);
        let y2 = self.bottom.min(other.bottom);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) as i64 * (y2 - y1) as i64;
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f32 / union as f32
    }
}

/// One detected object.
///
/// A detection is a rectangle combined with the model's class index for it and
/// a confidence score: a probability value in `[0, 1]` that encodes the
/// model's belief that the detection is real. Detections are produced fresh on
/// every `detect()` call and never stored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub class_id: u32,
    pub rect: BoxRect,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_degenerate_rectangles() {
        assert!(BoxRect::new(0, 0, 10, 10).is_some());
        assert!(BoxRect::new(10, 0, 10, 10).is_none());
        assert!(BoxRect::new(11, 0, 10, 10).is_none());
        assert!(BoxRect::new(0, 10, 10, 10).is_none());
    }

    #[test]
    fn iou_of_partially_overlapping_boxes() {
        let a = BoxRect::new(0, 0, 10, 10).unwrap();
        let b = BoxRect::new(5, 5, 15, 15).unwrap();
        // intersection 25, union 175
        assert!((a.iou(&b) - 0.1429).abs() < 1e-3);
        assert!((b.iou(&a) - 0.1429).abs() < 1e-3);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoxRect::new(0, 0, 10, 10).unwrap();
        let b = BoxRect::new(10, 0, 20, 10).unwrap();
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_with_empty_union_is_zero() {
        // Zero-area rectangles cannot come out of BoxRect::new, but the
        // division still has to be well defined for them.
        let a = BoxRect {
            left: 3,
            top: 3,
            right: 3,
            bottom: 3,
        };
        assert_eq!(a.iou(&a), 0.0);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoxRect::new(2, 2, 8, 8).unwrap();
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }
}
