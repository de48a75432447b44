//! Error types for the detection engine.

use thiserror::Error;

/// Result type alias for the detection engine.
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Errors that can surface from constructing or running a detector.
///
/// The first two variants are fatal and only occur at construction; a failed
/// construction releases everything it acquired before the error is returned.
/// The last two are scoped to a single `detect()` call and leave the detector
/// usable for subsequent frames. Accelerator failures never appear here: the
/// accelerator is strictly best-effort and its absence is handled internally
/// by falling back to the default backend.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("tensor allocation failed: {0}")]
    Allocation(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl DetectorError {
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    pub fn allocation<S: Into<String>>(msg: S) -> Self {
        Self::Allocation(msg.into())
    }

    pub fn shape_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }
}
