//! The detector facade: session + preprocessing + decoding + suppression.

use std::path::Path;

use tracing::debug;

use crate::boxes::Detection;
use crate::decode::decode_outputs;
use crate::delegate::DelegateOptions;
use crate::error::Result;
use crate::nms::non_maximum_suppression;
use crate::preprocess::{BgrFrame, prepare_frame};
use crate::session::{InferenceSession, OrtSession};

/// Construction-time options for a [`Detector`].
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    pub use_accelerator: bool,
    pub delegate: DelegateOptions,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        DetectorOptions {
            use_accelerator: true,
            delegate: DelegateOptions::default(),
        }
    }
}

/// Per-call thresholds for [`Detector::detect`].
#[derive(Debug, Clone, Copy)]
pub struct DetectParams {
    /// Candidates scoring below this are discarded before decoding.
    pub box_threshold: f32,
    /// IoU above which a weaker same-class candidate is suppressed.
    pub nms_threshold: f32,
}

impl Default for DetectParams {
    fn default() -> Self {
        DetectParams {
            box_threshold: 0.5,
            nms_threshold: 0.45,
        }
    }
}

/// An object detector bound to one loaded model.
///
/// A detector has exactly two reachable states: constructed and usable, or
/// failed at construction with every acquired resource already released.
/// Per-call errors ([`ShapeMismatch`](crate::DetectorError::ShapeMismatch),
/// [`Inference`](crate::DetectorError::Inference)) never poison the instance;
/// the next frame can be detected normally.
///
/// `detect` is synchronous, mutates the session's staging buffers in place
/// and must not be invoked concurrently on one instance. Independent
/// instances share nothing and may run on separate threads. The detector
/// spawns no threads and queues no frames; callers that capture faster than
/// they can detect are responsible for dropping frames.
pub struct Detector<S = OrtSession> {
    session: S,
}

impl Detector<OrtSession> {
    /// Loads the model at `model_path` and prepares it for inference,
    /// attaching the accelerator on a best-effort basis.
    pub fn new(model_path: impl AsRef<Path>, use_accelerator: bool) -> Result<Self> {
        Self::with_options(
            model_path,
            &DetectorOptions {
                use_accelerator,
                ..DetectorOptions::default()
            },
        )
    }

    pub fn with_options(model_path: impl AsRef<Path>, options: &DetectorOptions) -> Result<Self> {
        let session = OrtSession::open(
            model_path.as_ref(),
            options.use_accelerator,
            &options.delegate,
        )?;
        Ok(Detector { session })
    }
}

impl<S: InferenceSession> Detector<S> {
    /// Wraps an already-open session. This is the seam tests use to inject
    /// synthetic sessions.
    pub fn from_session(session: S) -> Self {
        Detector { session }
    }

    /// Runs the full pipeline over one frame: letterbox preprocessing, a
    /// forward pass, quantization-aware decoding and per-class suppression.
    /// Results are confidence-descending, in source-image pixel coordinates.
    pub fn detect(&mut self, frame: &BgrFrame<'_>, params: &DetectParams) -> Result<Vec<Detection>> {
        let (input_height, input_width, _) = self.session.input_shape();
        let prepared = prepare_frame(frame, input_width as u32, input_height as u32);

        let outputs = self.session.run(prepared.as_raw())?;

        let candidates = decode_outputs(
            &outputs,
            frame.width(),
            frame.height(),
            params.box_threshold,
        );
        debug!(candidates = candidates.len(), "decoded candidates");

        Ok(non_maximum_suppression(candidates, params.nms_threshold))
    }

    /// Whether the model's input storage is the 8-bit quantized kind.
    pub fn is_quantized(&self) -> bool {
        self.session.is_quantized()
    }

    /// Whether the session runs with an accelerator handle attached.
    pub fn accelerated(&self) -> bool {
        self.session.accelerated()
    }

    /// Model input shape as (height, width, channels); query this once after
    /// construction to size caller-side buffers.
    pub fn input_shape(&self) -> (usize, usize, usize) {
        self.session.input_shape()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::boxes::BoxRect;
    use crate::decode::ModelOutputs;
    use crate::error::DetectorError;
    use crate::tensor::TensorData;

    /// A synthetic session yielding canned outputs, with enough bookkeeping
    /// to check lifecycle behavior from the facade's side.
    struct FakeSession {
        height: usize,
        width: usize,
        channels: usize,
        outputs: ModelOutputs,
        fail_next: bool,
        drops: Arc<AtomicUsize>,
    }

    impl FakeSession {
        fn new(outputs: ModelOutputs) -> Self {
            FakeSession {
                height: 64,
                width: 64,
                channels: 3,
                outputs,
                fail_next: false,
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl InferenceSession for FakeSession {
        fn input_shape(&self) -> (usize, usize, usize) {
            (self.height, self.width, self.channels)
        }

        fn is_quantized(&self) -> bool {
            true
        }

        fn accelerated(&self) -> bool {
            false
        }

        fn run(&mut self, pixels: &[u8]) -> crate::Result<ModelOutputs> {
            if self.fail_next {
                self.fail_next = false;
                return Err(DetectorError::inference("backend exploded"));
            }
            let expected = self.height * self.width * self.channels;
            if pixels.len() != expected {
                return Err(DetectorError::shape_mismatch(format!(
                    "{} != {expected}",
                    pixels.len()
                )));
            }
            Ok(self.outputs.clone())
        }
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn outputs_with_scores(scores: Vec<f32>) -> ModelOutputs {
        let count = scores.len();
        let mut boxes = Vec::new();
        for i in 0..count {
            let offset = (i * 12) as f32;
            boxes.extend_from_slice(&[offset, offset, offset + 10.0, offset + 10.0]);
        }
        ModelOutputs {
            boxes: TensorData::Float32(boxes),
            scores: TensorData::Float32(scores),
            classes: TensorData::Float32(vec![7.0; count]),
            count,
        }
    }

    fn frame_buffer() -> Vec<u8> {
        vec![128u8; 64 * 64 * 3]
    }

    #[test]
    fn detect_returns_the_single_candidate_above_threshold() {
        let mut detector = Detector::from_session(FakeSession::new(outputs_with_scores(vec![
            0.9, 0.3, 0.1,
        ])));
        let data = frame_buffer();
        let frame = BgrFrame::new(64, 64, &data).unwrap();

        let detections = detector.detect(&frame, &DetectParams::default()).unwrap();
        assert_eq!(
            detections,
            vec![Detection {
                class_id: 7,
                rect: BoxRect::new(0, 0, 10, 10).unwrap(),
                confidence: 0.9,
            }]
        );
    }

    #[test]
    fn detect_returns_empty_when_everything_is_below_threshold() {
        let mut detector =
            Detector::from_session(FakeSession::new(outputs_with_scores(vec![0.4, 0.2])));
        let data = frame_buffer();
        let frame = BgrFrame::new(64, 64, &data).unwrap();

        assert!(detector.detect(&frame, &DetectParams::default()).unwrap().is_empty());
    }

    #[test]
    fn detect_letterboxes_frames_that_do_not_match_the_input() {
        let mut detector =
            Detector::from_session(FakeSession::new(outputs_with_scores(vec![0.9])));
        let data = vec![128u8; 128 * 96 * 3];
        let frame = BgrFrame::new(128, 96, &data).unwrap();

        // letterboxed to the model's 64x64 input, so the fake's size check passes
        assert_eq!(detector.detect(&frame, &DetectParams::default()).unwrap().len(), 1);
    }

    #[test]
    fn per_call_failure_leaves_the_detector_usable() {
        let mut session = FakeSession::new(outputs_with_scores(vec![0.9]));
        session.fail_next = true;
        let mut detector = Detector::from_session(session);
        let data = frame_buffer();
        let frame = BgrFrame::new(64, 64, &data).unwrap();

        assert!(matches!(
            detector.detect(&frame, &DetectParams::default()),
            Err(DetectorError::Inference(_))
        ));
        // the very next frame works
        assert_eq!(detector.detect(&frame, &DetectParams::default()).unwrap().len(), 1);
    }

    #[test]
    fn dropping_the_detector_releases_its_session() {
        let session = FakeSession::new(outputs_with_scores(vec![]));
        let drops = session.drops.clone();

        let detector = Detector::from_session(session);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(detector);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_model_file_is_a_load_error() {
        let result = Detector::new("/definitely/not/a/model.onnx", false);
        assert!(matches!(result, Err(DetectorError::ModelLoad(_))));
    }

    #[test]
    fn accessors_come_from_the_session() {
        let detector = Detector::from_session(FakeSession::new(outputs_with_scores(vec![])));
        assert!(detector.is_quantized());
        assert!(!detector.accelerated());
        assert_eq!(detector.input_shape(), (64, 64, 3));
    }
}
