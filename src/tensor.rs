//! Tensor storage kinds, dequantization and shape introspection.

/// Per-tensor quantization metadata for the 8-bit storage kind.
///
/// A stored value `raw` represents the real value
/// `(raw - zero_point) * scale`, with `scale > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationParams {
    pub scale: f32,
    pub zero_point: i32,
}

/// The contents of one model tensor, tagged by storage kind.
///
/// Only 32-bit float and 8-bit quantized storage are supported; anything else
/// is rejected at the session boundary instead of silently decoding to zero.
/// Keeping the kind in the type makes every dequantization site an exhaustive
/// match.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float32(Vec<f32>),
    QuantizedUint8 {
        data: Vec<u8>,
        params: QuantizationParams,
    },
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::Float32(data) => data.len(),
            TensorData::QuantizedUint8 { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The real value stored at `index`, dequantized if necessary.
    pub fn value(&self, index: usize) -> f32 {
        match self {
            TensorData::Float32(data) => data[index],
            TensorData::QuantizedUint8 { data, params } => {
                (data[index] as f32 - params.zero_point as f32) * params.scale
            }
        }
    }
}

/// Derives (width, height, channels) from a tensor's dimension list.
///
/// Dimensions equal to 1 are batch or broadcast placeholders and are skipped,
/// so the rule works for NHWC, HWC and plain HW layouts alike. Of the
/// remaining dimensions the first maps to width, the second to height and an
/// optional third to channels (1 when absent). Returns `None` for anything
/// that cannot be an image: a non-positive dimension, fewer than two or more
/// than three meaningful dimensions, or more than 4 channels.
pub fn image_dims(dims: &[i64]) -> Option<(usize, usize, usize)> {
    let mut meaningful = [0usize; 3];
    let mut cursor = 0;

    for &dim in dims {
        if dim <= 0 {
            return None;
        }
        if dim == 1 {
            continue;
        }
        if cursor == meaningful.len() {
            return None;
        }
        meaningful[cursor] = dim as usize;
        cursor += 1;
    }

    if cursor < 2 {
        return None;
    }
    let channels = if cursor == 3 { meaningful[2] } else { 1 };
    if channels > 4 {
        return None;
    }
    Some((meaningful[0], meaningful[1], channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_dims_skips_batch_placeholders() {
        assert_eq!(image_dims(&[1, 224, 224, 3]), Some((224, 224, 3)));
        assert_eq!(image_dims(&[1, 416, 416, 1]), Some((416, 416, 1)));
    }

    #[test]
    fn image_dims_defaults_to_one_channel() {
        assert_eq!(image_dims(&[300, 300]), Some((300, 300, 1)));
    }

    #[test]
    fn image_dims_rejects_too_many_dimensions() {
        assert_eq!(image_dims(&[5, 5, 5, 5]), None);
    }

    #[test]
    fn image_dims_rejects_unusable_shapes() {
        assert_eq!(image_dims(&[640]), None);
        assert_eq!(image_dims(&[1, 1, 640]), None);
        assert_eq!(image_dims(&[0, 640, 640]), None);
        // dynamic dimensions cannot size a buffer
        assert_eq!(image_dims(&[-1, 640, 640, 3]), None);
        // more than 4 channels is not an image
        assert_eq!(image_dims(&[1, 64, 64, 5]), None);
    }

    #[test]
    fn dequantized_value_is_zero_at_zero_point() {
        for scale in [0.001, 0.5, 7.25] {
            let tensor = TensorData::QuantizedUint8 {
                data: vec![37],
                params: QuantizationParams {
                    scale,
                    zero_point: 37,
                },
            };
            assert_eq!(tensor.value(0), 0.0);
        }
    }

    #[test]
    fn dequantization_is_monotonic_in_raw_value() {
        let tensor = TensorData::QuantizedUint8 {
            data: vec![0, 17, 128, 200, 255],
            params: QuantizationParams {
                scale: 0.5,
                zero_point: 128,
            },
        };
        for i in 1..5 {
            assert!(tensor.value(i) > tensor.value(i - 1));
        }
    }

    #[test]
    fn float_values_pass_through() {
        let tensor = TensorData::Float32(vec![0.25, -1.5]);
        assert_eq!(tensor.value(0), 0.25);
        assert_eq!(tensor.value(1), -1.5);
        assert_eq!(tensor.len(), 2);
    }
}
