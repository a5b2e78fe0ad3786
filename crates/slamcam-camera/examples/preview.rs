//! Pull frames from the default camera and report the delivered rate.
//!
//! Usage: cargo run -p slamcam-camera --example preview -- [width] [height] [fps] [frames]

use anyhow::{Context, Result};
use slamcam_camera::{CameraDevice, FrameSource, GstCamera, PixelFormat, StreamRequest};
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let arg = |i: usize, default: u32| args.get(i).and_then(|a| a.parse().ok()).unwrap_or(default);
    let req = StreamRequest {
        width: arg(1, 640),
        height: arg(2, 480),
        fps: arg(3, 30),
        format: PixelFormat::Rgb8,
    };
    let frames = arg(4, 150);

    let mut cam = GstCamera::new()?;
    log::info!("source: {}", cam.source());
    let mut stream = cam.configure(&req).context("configure")?;
    let profile = stream.start().context("start")?;
    log::info!("streaming {}x{}@{}", profile.width, profile.height, profile.fps);

    let t0 = Instant::now();
    let mut bytes = 0usize;
    for _ in 0..frames {
        let frame = stream.wait_for_frame(Some(Duration::from_secs(2)))?;
        bytes += frame.data.len();
    }
    let dt = t0.elapsed().as_secs_f64();
    log::info!(
        "{} frames in {:.2}s ({:.1} FPS, {:.1} MB/s)",
        frames,
        dt,
        frames as f64 / dt,
        bytes as f64 / dt / 1e6
    );
    Ok(())
}
