//! On-device object-detection inference engine.
//!
//! The pipeline behind [`Detector::detect`] is: letterbox a raw BGR camera
//! frame to the model's input size, run one forward pass through ONNX
//! Runtime (offloaded to the QNN accelerator when it is usable, the default
//! backend otherwise), dequantize the fixed-index output tensors into
//! bounding-box candidates, and remove duplicates with per-class
//! non-maximum suppression.
//!
//! Capture, publishing and supervision live elsewhere: a capture component
//! hands in pixel buffers as [`BgrFrame`]s, and a pipeline runner forwards
//! the returned [`Detection`]s. One detector instance must not be invoked
//! concurrently; independent instances share nothing.

pub mod boxes;
pub mod decode;
pub mod delegate;
pub mod detector;
pub mod error;
pub mod nms;
pub mod preprocess;
pub mod session;
pub mod tensor;

pub use boxes::{BoxRect, Detection};
pub use decode::{ModelOutputs, decode_outputs};
pub use delegate::{DelegateOptions, PerformanceMode};
pub use detector::{DetectParams, Detector, DetectorOptions};
pub use error::{DetectorError, Result};
pub use nms::non_maximum_suppression;
pub use preprocess::{BgrFrame, letterbox};
pub use session::{InferenceSession, OrtSession};
pub use tensor::{QuantizationParams, TensorData, image_dims};
