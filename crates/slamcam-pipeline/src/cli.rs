use crate::config::{
    timeout_from_secs, ConfigError, PipelineConfig, DEFAULT_FPS, DEFAULT_HEIGHT,
    DEFAULT_MAX_RUNTIME, DEFAULT_TRAJECTORY, DEFAULT_WARMUP_FRAMES, DEFAULT_WIDTH,
};
use crate::orchestrator::{configure_stream, log_intrinsics, warmup, Orchestrator, RunReport};
use crate::sink::LogSink;
use crate::PipelineError;
use clap::{Parser, ValueEnum};
use slamcam_camera::{CameraDevice, PixelFormat};
use slamcam_engine::{EngineConfig, SensorMode, TrackingEngine};
use std::ffi::OsString;
use std::path::PathBuf;

/// Pixel layouts selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Rgb,
    Bgr,
    Gray,
    Nv12,
}

impl From<FormatArg> for PixelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Rgb => PixelFormat::Rgb8,
            FormatArg::Bgr => PixelFormat::Bgr8,
            FormatArg::Gray => PixelFormat::Gray8,
            FormatArg::Nv12 => PixelFormat::Nv12,
        }
    }
}

/// Monocular tracking from a live camera with a fixed run budget.
#[derive(Debug, Clone, Parser)]
#[command(name = "mono_camera", version)]
pub struct Cli {
    /// Path to the vocabulary file
    pub vocabulary: PathBuf,

    /// Path to the settings (calibration) file
    pub settings: PathBuf,

    #[arg(default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    #[arg(default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    #[arg(default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// Run budget in seconds
    #[arg(default_value_t = DEFAULT_MAX_RUNTIME)]
    pub max_runtime_seconds: f64,

    /// Where the trajectory is written at shutdown
    #[arg(long, default_value = DEFAULT_TRAJECTORY)]
    pub trajectory: PathBuf,

    /// Frames discarded before timing starts
    #[arg(long, default_value_t = DEFAULT_WARMUP_FRAMES)]
    pub warmup_frames: u32,

    /// Seconds to wait for each frame; 0 waits forever
    #[arg(long, default_value_t = 5.0)]
    pub frame_timeout: f64,

    /// Pixel format to negotiate; defaults to the channel order of the
    /// calibration, or RGB
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// GStreamer source description overriding the default camera
    #[arg(long)]
    pub source: Option<String>,

    /// Do not ask the engine for a viewer
    #[arg(long)]
    pub no_viz: bool,

    /// Log every computed pose
    #[arg(long)]
    pub log_poses: bool,
}

impl Cli {
    pub fn to_configs(&self) -> Result<(PipelineConfig, EngineConfig), ConfigError> {
        let pipeline = PipelineConfig {
            width: self.width,
            height: self.height,
            target_fps: self.fps,
            max_runtime: self.max_runtime_seconds,
            format: self.format.map(PixelFormat::from).unwrap_or(PixelFormat::Rgb8),
            warmup_frames: self.warmup_frames,
            frame_timeout: timeout_from_secs(self.frame_timeout)?,
            trajectory_path: self.trajectory.clone(),
        }
        .validate()?;

        let engine = EngineConfig {
            vocabulary: self.vocabulary.clone(),
            settings: self.settings.clone(),
            mode: SensorMode::Monocular,
            visualize: !self.no_viz,
        };
        Ok((pipeline, engine))
    }
}

/// Whole program: parse → device → stream → warmup → engine → loop.
///
/// Nothing is opened before the arguments are known to be good. The device
/// and engine are built by the callers' closures so tests can swap them out.
/// Without `--format` the device's preferred layout is negotiated.
pub fn launch<I, T, D, E, FD, FE>(
    args: I,
    open_device: FD,
    open_engine: FE,
) -> crate::Result<RunReport>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    D: CameraDevice,
    E: TrackingEngine,
    FD: FnOnce(&Cli) -> Result<D, PipelineError>,
    FE: FnOnce(&EngineConfig) -> Result<E, PipelineError>,
{
    let cli = Cli::try_parse_from(args)?;
    let (mut config, engine_config) = cli.to_configs()?;

    let mut device = open_device(&cli)?;
    if cli.format.is_none() {
        if let Some(format) = device.preferred_format() {
            config.format = format;
        }
    }
    let (mut stream, profile) = configure_stream(&mut device, &config)?;
    warmup(&mut stream, config.warmup_frames, config.frame_timeout)?;
    log_intrinsics(&profile);

    let engine = open_engine(&engine_config)?;

    let orchestrator = Orchestrator::new(config, stream, engine);
    let report = if cli.log_poses {
        orchestrator.with_sink(LogSink).run()
    } else {
        orchestrator.run()
    };
    Ok(report)
}
