//! mono_camera: capture from the default camera, track every frame with the
//! keyframe recorder until the run budget is spent, then write the
//! trajectory.
//!
//!   mono_camera <vocabulary> <settings> [width height fps max_runtime_seconds]

use log::{error, info};
use slamcam_camera::GstCamera;
use slamcam_engine::{KeyframeRecorder, Settings};
use slamcam_pipeline::{launch, Cli, PipelineError};
use std::process::ExitCode;

/// The camera is opened with the calibration from the settings file; the
/// GStreamer sources do not report intrinsics themselves. The channel order
/// the calibration was made with becomes the default pixel format.
fn open_camera(cli: &Cli) -> Result<GstCamera, PipelineError> {
    let settings = Settings::load(&cli.settings)?;
    let mut camera = GstCamera::new()
        .map_err(PipelineError::DeviceConfiguration)?
        .with_intrinsics(settings.intrinsics())
        .with_format(settings.pixel_format());
    if let Some(source) = &cli.source {
        camera = camera.with_source(source.clone());
    }
    info!("using camera source `{}`", camera.source());
    Ok(camera)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = launch(std::env::args_os(), open_camera, |config| {
        KeyframeRecorder::initialize(config).map_err(PipelineError::from)
    });

    let code = match result {
        Ok(report) => {
            info!("run finished: {:?}", report.termination);
            report.exit_code()
        }
        Err(PipelineError::Usage(e)) => {
            // clap formats usage and help text itself
            let _ = e.print();
            i32::from(e.use_stderr())
        }
        Err(e) => {
            let code = e.exit_code();
            error!("{:#}", anyhow::Error::from(e));
            code
        }
    };
    ExitCode::from(code as u8)
}
