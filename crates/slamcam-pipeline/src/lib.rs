// slamcam-pipeline/src/lib.rs
// ============================================================
// slamcam-pipeline  –  capture → track orchestration loop
// Configures the stream, warms the sensor up, then feeds one
// frame at a time into the tracking engine until the run
// budget is spent, and finally stops + persists the engine.
// ------------------------------------------------------------
// Pipeline: FrameSource → timestamp/deadline → to_image →
//           TrackingEngine::track → RunStatistics
// ------------------------------------------------------------
// Public API
//   * launch(args, open_device, open_engine) – whole program
//   * Orchestrator::run()                    – the loop itself
//   * configure_stream() / warmup()          – pre-loop stages
// ============================================================

//! slamcam – orchestration layer
//!
//! Everything here runs on the calling thread. The only blocking call is
//! [`FrameSource::wait_for_frame`](slamcam_camera::FrameSource::wait_for_frame);
//! there is no frame queue, so at most one frame is ever in flight.

use slamcam_camera::CameraError;
use slamcam_engine::{EngineError, SettingsError};
use thiserror::Error;

pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod sink;
pub mod stats;
pub mod timing;

pub use cli::{launch, Cli, FormatArg};
pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{configure_stream, log_intrinsics, warmup, Orchestrator, RunReport, Termination};
pub use sink::{LogSink, NoopSink, PoseSink};
pub use stats::{RunStatistics, Summary};
pub use timing::{Clock, ManualClock, RollingIntervalBuffer, SystemClock};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Usage(#[from] clap::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Device configuration failed: {0}")]
    DeviceConfiguration(#[source] CameraError),
    #[error("Device I/O failed: {0}")]
    DeviceIo(#[source] CameraError),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Tracking engine failed to start: {0}")]
    Engine(#[from] EngineError),
}

impl PipelineError {
    /// Process exit status for this error. `--help` and `--version` come
    /// through as clap errors but are not failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Usage(e) if !e.use_stderr() => 0,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
