//! Decodes raw output tensors into detection candidates.

use crate::boxes::{BoxRect, Detection};
use crate::tensor::TensorData;

/// The three fixed-index tensors one forward pass produces, plus the number
/// of candidate rows declared by the boxes tensor's count dimension.
///
/// `boxes` holds `count` rows of `[x1, y1, x2, y2]`; `scores` and `classes`
/// hold one entry per row. Each tensor carries its own quantization
/// parameters, so a model may mix quantized and float outputs freely.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutputs {
    pub boxes: TensorData,
    pub scores: TensorData,
    pub classes: TensorData,
    pub count: usize,
}

/// Decodes output tensors into candidates in tensor-index order.
///
/// Scores below `box_threshold` are skipped before their box is even read.
/// Box coordinates are dequantized per component with the boxes tensor's own
/// parameters, clamped to the source image, and dropped when clamping leaves
/// no positive extent. The class index is the raw stored integer; it is never
/// dequantized.
pub fn decode_outputs(
    outputs: &ModelOutputs,
    image_width: u32,
    image_height: u32,
    box_threshold: f32,
) -> Vec<Detection> {
    let mut candidates = Vec::new();

    for i in 0..outputs.count {
        let confidence = outputs.scores.value(i);
        if confidence < box_threshold {
            continue;
        }

        let class_id = match &outputs.classes {
            TensorData::Float32(data) => data[i] as u32,
            TensorData::QuantizedUint8 { data, .. } => data[i] as u32,
        };

        let x1 = outputs.boxes.value(i * 4).clamp(0.0, image_width as f32);
        let y1 = outputs.boxes.value(i * 4 + 1).clamp(0.0, image_height as f32);
        let x2 = outputs.boxes.value(i * 4 + 2).clamp(0.0, image_width as f32);
        let y2 = outputs.boxes.value(i * 4 + 3).clamp(0.0, image_height as f32);

        if x1 >= x2 || y1 >= y2 {
            continue;
        }

        let Some(rect) = BoxRect::new(
            x1.round() as i32,
            y1.round() as i32,
            x2.round() as i32,
            y2.round() as i32,
        ) else {
            // rounding can still collapse a sliver of a box
            continue;
        };

        candidates.push(Detection {
            class_id,
            rect,
            confidence,
        });
    }

    candidates
}
