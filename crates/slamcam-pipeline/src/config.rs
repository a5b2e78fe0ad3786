use slamcam_camera::{PixelFormat, StreamRequest};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_MAX_RUNTIME: f64 = 30.0;
pub const DEFAULT_WARMUP_FRAMES: u32 = 30;
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TRAJECTORY: &str = "KeyFrameTrajectory.txt";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("resolution {width}x{height} must be non-zero")]
    ZeroResolution { width: u32, height: u32 },
    #[error("frame rate must be non-zero")]
    ZeroFps,
    #[error("run budget {0}s must be a finite, non-negative number of seconds")]
    BadRuntime(f64),
    #[error("frame timeout {0}s must be a finite, non-negative number of seconds")]
    BadTimeout(f64),
}

/// Run parameters. Built once, then handed by value to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Run budget in seconds, measured from the instant the loop starts.
    pub max_runtime: f64,
    pub format: PixelFormat,
    pub warmup_frames: u32,
    /// `None` blocks on the device forever.
    pub frame_timeout: Option<Duration>,
    pub trajectory_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            target_fps: DEFAULT_FPS,
            max_runtime: DEFAULT_MAX_RUNTIME,
            format: PixelFormat::Rgb8,
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            frame_timeout: Some(DEFAULT_FRAME_TIMEOUT),
            trajectory_path: PathBuf::from(DEFAULT_TRAJECTORY),
        }
    }
}

impl PipelineConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroResolution { width: self.width, height: self.height });
        }
        if self.target_fps == 0 {
            return Err(ConfigError::ZeroFps);
        }
        if !self.max_runtime.is_finite() || self.max_runtime < 0.0 {
            return Err(ConfigError::BadRuntime(self.max_runtime));
        }
        Ok(self)
    }

    pub fn stream_request(&self) -> StreamRequest {
        StreamRequest {
            width: self.width,
            height: self.height,
            fps: self.target_fps,
            format: self.format,
        }
    }
}

/// Seconds → optional timeout; zero means wait forever.
pub fn timeout_from_secs(secs: f64) -> Result<Option<Duration>, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::BadTimeout(secs));
    }
    Ok((secs > 0.0).then(|| Duration::from_secs_f64(secs)))
}
