//! Model loading and the ONNX Runtime execution context.

use std::fs;
use std::path::Path;

use ndarray::{Array, ArrayD, IxDyn};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::tensor::TensorElementType;
use ort::value::{DynValue, TensorRef, ValueType};
use tracing::{debug, info, warn};

use crate::decode::ModelOutputs;
use crate::delegate::{self, DelegateOptions};
use crate::error::{DetectorError, Result};
use crate::tensor::{QuantizationParams, TensorData, image_dims};

/// The seam between the detection pipeline and whatever executes the network.
///
/// Production code uses [`OrtSession`]; tests inject synthetic sessions to
/// exercise decoding and lifecycle behavior without a model file.
pub trait InferenceSession {
    /// Model input shape as (height, width, channels).
    fn input_shape(&self) -> (usize, usize, usize);

    /// Whether the input tensor's storage is the 8-bit quantized kind. The
    /// caller uses this to pick its own normalization strategy.
    fn is_quantized(&self) -> bool;

    /// Whether an accelerator handle was attached to this session.
    fn accelerated(&self) -> bool;

    /// Runs one forward pass over a prepared RGB pixel buffer.
    fn run(&mut self, pixels: &[u8]) -> Result<ModelOutputs>;
}

/// The input staging tensor, allocated once and refilled every call.
enum Staging {
    Quantized(ArrayD<u8>),
    Float(ArrayD<f32>),
}

/// An ONNX Runtime execution context bound to one loaded model.
///
/// Construction acquires, in order: the model bytes, the optional accelerator
/// registration, the committed session, and the staging buffers. Failure at
/// any fatal stage drops whatever was already acquired before the error
/// surfaces. Field order is load-bearing for teardown: the execution context
/// releases before the model bytes it was built from.
pub struct OrtSession {
    session: Session,
    model: Vec<u8>,
    staging: Staging,
    width: usize,
    height: usize,
    channels: usize,
    output_quant: [Option<QuantizationParams>; 3],
    accelerated: bool,
}

impl OrtSession {
    /// Loads a model and builds an execution context for it.
    ///
    /// Accelerator wiring is strictly best-effort: when `use_accelerator` is
    /// set but the backend cannot be created or attached, the session falls
    /// back to the default backend and the degradation is logged. A missing
    /// or malformed model file and any failure in the final buffer-allocation
    /// stage are fatal.
    pub fn open(
        model_path: &Path,
        use_accelerator: bool,
        delegate_options: &DelegateOptions,
    ) -> Result<Self> {
        let model = fs::read(model_path).map_err(|e| {
            DetectorError::model_load(format!("cannot read {}: {e}", model_path.display()))
        })?;
        debug!(
            path = %model_path.display(),
            size_kb = model.len() / 1024,
            "loaded model file"
        );

        let mut builder = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .map_err(|e| DetectorError::model_load(e.to_string()))?;

        let mut accelerated = false;
        if use_accelerator {
            if let Some(provider) = delegate::try_create(delegate_options) {
                // Unsupported ops fall back to the default backend on their
                // own; registration itself failing is recovered the same way.
                match builder.with_execution_providers([provider]) {
                    Ok(b) => {
                        builder = b;
                        accelerated = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "accelerator registration failed, using default backend");
                        builder = Session::builder()
                            .and_then(|b| {
                                b.with_optimization_level(GraphOptimizationLevel::Level3)
                            })
                            .map_err(|e| DetectorError::model_load(e.to_string()))?;
                    }
                }
            }
        }

        let session = builder
            .commit_from_memory(&model)
            .map_err(|e| DetectorError::model_load(e.to_string()))?;

        // Everything below is the buffer-allocation stage; failures here are
        // fatal because no inference is possible without sized buffers.
        let input = session
            .inputs
            .first()
            .ok_or_else(|| DetectorError::allocation("model has no input tensor"))?;
        let ValueType::Tensor { ty, shape, .. } = &input.input_type else {
            return Err(DetectorError::allocation("model input is not a tensor"));
        };
        let input_ty = *ty;
        let dims: Vec<i64> = shape.to_vec();

        let (width, height, channels) = image_dims(&dims).ok_or_else(|| {
            DetectorError::allocation(format!("unusable input tensor shape {dims:?}"))
        })?;

        let extents: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
        let staging = match input_ty {
            TensorElementType::Uint8 => Staging::Quantized(Array::zeros(IxDyn(&extents))),
            TensorElementType::Float32 => Staging::Float(Array::zeros(IxDyn(&extents))),
            other => {
                return Err(DetectorError::allocation(format!(
                    "unsupported input storage kind {other:?}"
                )));
            }
        };

        if session.outputs.len() < 3 {
            return Err(DetectorError::allocation(format!(
                "model exposes {} output tensors, need boxes, scores and classes",
                session.outputs.len()
            )));
        }

        // Quantized outputs carry their scale and zero point as model
        // metadata written by the conversion step. Refusing to run without
        // them beats silently decoding every box to zero.
        let metadata = session
            .metadata()
            .map_err(|e| DetectorError::allocation(e.to_string()))?;
        let quant_from_metadata = |name: &str| -> Option<QuantizationParams> {
            let scale: f32 = metadata
                .custom(&format!("{name}_scale"))
                .ok()
                .flatten()?
                .parse()
                .ok()?;
            let zero_point: i32 = metadata
                .custom(&format!("{name}_zero_point"))
                .ok()
                .flatten()?
                .parse()
                .ok()?;
            (scale > 0.0).then_some(QuantizationParams { scale, zero_point })
        };

        let mut output_quant: [Option<QuantizationParams>; 3] = [None, None, None];
        for (i, slot) in output_quant.iter_mut().enumerate() {
            let output = &session.outputs[i];
            let ValueType::Tensor { ty, .. } = &output.output_type else {
                return Err(DetectorError::allocation(format!(
                    "output tensor {i} is not a tensor"
                )));
            };
            if *ty == TensorElementType::Uint8 {
                *slot = Some(quant_from_metadata(&output.name).ok_or_else(|| {
                    DetectorError::allocation(format!(
                        "quantized output '{}' is missing scale/zero-point metadata",
                        output.name
                    ))
                })?);
            }
        }
        drop(metadata);

        let opened = OrtSession {
            session,
            model,
            staging,
            width,
            height,
            channels,
            output_quant,
            accelerated,
        };
        info!(
            width,
            height,
            channels,
            quantized = opened.is_quantized(),
            accelerated,
            model_bytes = opened.model.len(),
            "session ready"
        );
        Ok(opened)
    }
}

impl InferenceSession for OrtSession {
    fn input_shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    fn is_quantized(&self) -> bool {
        matches!(self.staging, Staging::Quantized(_))
    }

    fn accelerated(&self) -> bool {
        self.accelerated
    }

    fn run(&mut self, pixels: &[u8]) -> Result<ModelOutputs> {
        let elements = self.width * self.height * self.channels;
        if pixels.len() != elements {
            return Err(DetectorError::shape_mismatch(format!(
                "prepared frame is {} bytes but the {}x{}x{} input tensor takes {}",
                pixels.len(),
                self.width,
                self.height,
                self.channels,
                elements
            )));
        }

        let outputs = match &mut self.staging {
            Staging::Quantized(staging) => {
                staging
                    .as_slice_mut()
                    .ok_or_else(|| DetectorError::inference("staging tensor is not contiguous"))?
                    .copy_from_slice(pixels);
                let tensor = TensorRef::from_array_view(&*staging)
                    .map_err(|e| DetectorError::inference(e.to_string()))?;
                self.session
                    .run(ort::inputs![tensor])
                    .map_err(|e| DetectorError::inference(e.to_string()))?
            }
            Staging::Float(staging) => {
                let slice = staging
                    .as_slice_mut()
                    .ok_or_else(|| DetectorError::inference("staging tensor is not contiguous"))?;
                for (dst, &src) in slice.iter_mut().zip(pixels) {
                    *dst = src as f32 / 255.0;
                }
                let tensor = TensorRef::from_array_view(&*staging)
                    .map_err(|e| DetectorError::inference(e.to_string()))?;
                self.session
                    .run(ort::inputs![tensor])
                    .map_err(|e| DetectorError::inference(e.to_string()))?
            }
        };

        let (boxes, boxes_dims) = extract_output(&outputs[0], "boxes", self.output_quant[0])?;
        let (scores, _) = extract_output(&outputs[1], "scores", self.output_quant[1])?;
        let (classes, _) = extract_output(&outputs[2], "classes", self.output_quant[2])?;

        let count = boxes_dims.get(1).copied().unwrap_or(0).max(0) as usize;
        if boxes.len() < count * 4 || scores.len() < count || classes.len() < count {
            return Err(DetectorError::inference(format!(
                "output tensors are shorter than the declared {count} candidates"
            )));
        }

        Ok(ModelOutputs {
            boxes,
            scores,
            classes,
            count,
        })
    }
}

/// Copies one output tensor into an owned, kind-tagged buffer.
///
/// Only float32 and quantized uint8 storage are supported; anything else
/// fails the call instead of silently reading zeros.
fn extract_output(
    value: &DynValue,
    name: &str,
    quant: Option<QuantizationParams>,
) -> Result<(TensorData, Vec<i64>)> {
    if let Ok((shape, data)) = value.try_extract_tensor::<u8>() {
        let params = quant.ok_or_else(|| {
            DetectorError::shape_mismatch(format!(
                "quantized {name} tensor has no quantization parameters"
            ))
        })?;
        return Ok((
            TensorData::QuantizedUint8 {
                data: data.to_vec(),
                params,
            },
            shape.to_vec(),
        ));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        return Ok((TensorData::Float32(data.to_vec()), shape.to_vec()));
    }
    Err(DetectorError::shape_mismatch(format!(
        "{name} tensor has unsupported storage kind {:?}",
        value.dtype()
    )))
}
