//! Best-effort construction of a hardware-accelerator execution handle.

use ort::execution_providers as ep;
use ort::execution_providers::{ExecutionProvider, ExecutionProviderDispatch};
use tracing::{info, warn};

/// How hard the accelerator should be pushed, mapped onto the QNN HTP
/// performance levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceMode {
    Default,
    Balanced,
    Burst,
    HighPerformance,
}

/// Named options for the accelerator backend: which backend library the
/// host's dynamic loader should resolve, the performance mode, and whether
/// fp16 convolution acceleration is enabled.
///
/// The defaults target the Hexagon Tensor Processor, the NPU on the boards
/// this engine ships on. Nothing here is a hard dependency: when the library
/// cannot be loaded the session simply runs on the default backend.
#[derive(Debug, Clone)]
pub struct DelegateOptions {
    pub backend_path: String,
    pub performance_mode: PerformanceMode,
    pub htp_fp16: bool,
}

impl Default for DelegateOptions {
    fn default() -> Self {
        DelegateOptions {
            backend_path: "libQnnHtp.so".to_string(),
            performance_mode: PerformanceMode::Burst,
            htp_fp16: true,
        }
    }
}

/// Tries to build an accelerator execution handle from the named options.
///
/// `None` means the accelerator is not usable on this host. That is a
/// first-class valid state, not an error: the caller registers nothing and
/// execution proceeds on the default backend, just degraded.
pub fn try_create(options: &DelegateOptions) -> Option<ExecutionProviderDispatch> {
    let provider = ep::QNNExecutionProvider::default()
        .with_backend_path(options.backend_path.clone())
        .with_performance_mode(match options.performance_mode {
            PerformanceMode::Default => ep::qnn::QNNPerformanceMode::Default,
            PerformanceMode::Balanced => ep::qnn::QNNPerformanceMode::Balanced,
            PerformanceMode::Burst => ep::qnn::QNNPerformanceMode::Burst,
            PerformanceMode::HighPerformance => ep::qnn::QNNPerformanceMode::HighPerformance,
        })
        .with_htp_fp16_precision(options.htp_fp16);

    match provider.is_available() {
        Ok(true) => {
            info!(backend = %options.backend_path, "accelerator backend available");
            Some(provider.build())
        }
        Ok(false) => {
            warn!(
                backend = %options.backend_path,
                "accelerator backend not available on this host, using default backend"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "accelerator probe failed, using default backend");
            None
        }
    }
}
