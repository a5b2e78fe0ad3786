use crate::config::PipelineConfig;
use crate::sink::{NoopSink, PoseSink};
use crate::stats::{RunStatistics, Summary};
use crate::timing::{Clock, RollingIntervalBuffer, SystemClock};
use crate::PipelineError;
use log::{debug, error, info, warn};
use slamcam_camera::{CameraDevice, CameraError, FrameSource, StreamProfile};
use slamcam_engine::{EngineError, TrackingEngine};
use slamcam_image::to_image;
use std::time::Duration;

/// Negotiate and start the stream. Any failure here is fatal.
pub fn configure_stream<D: CameraDevice>(
    device: &mut D,
    config: &PipelineConfig,
) -> crate::Result<(D::Stream, StreamProfile)> {
    let request = config.stream_request();
    let mut stream = device
        .configure(&request)
        .map_err(PipelineError::DeviceConfiguration)?;
    let profile = stream.start().map_err(PipelineError::DeviceConfiguration)?;
    info!(
        "streaming {}x{}@{} {}",
        profile.width,
        profile.height,
        profile.fps,
        profile.format.gst_name()
    );
    Ok((stream, profile))
}

/// Pull and discard `frames` frames so auto exposure and gain settle.
///
/// Live sources only finish caps negotiation once buffers flow, so an
/// unsupported mode can first show up here; it is still reported as a
/// configuration failure.
pub fn warmup<S: FrameSource>(
    stream: &mut S,
    frames: u32,
    timeout: Option<Duration>,
) -> crate::Result<()> {
    for i in 0..frames {
        if let Err(e) = stream.wait_for_frame(timeout) {
            error!("warmup failed at frame {}/{}: {}", i + 1, frames, e);
            return Err(if e.is_configuration() {
                PipelineError::DeviceConfiguration(e)
            } else {
                PipelineError::DeviceIo(e)
            });
        }
    }
    debug!("discarded {} warmup frames", frames);
    Ok(())
}

pub fn log_intrinsics(profile: &StreamProfile) {
    match &profile.intrinsics {
        Some(i) => {
            info!("ppx: {} ppy: {}", i.ppx, i.ppy);
            info!("fx: {} fy: {}", i.fx, i.fy);
            let [k1, k2, p1, p2, k3] = i.coeffs;
            info!("k1: {} k2: {} p1: {} p2: {} k3: {}", k1, k2, p1, p2, k3);
        }
        None => warn!("stream reports no intrinsics"),
    }
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// A frame arrived after the run budget; it was not tracked.
    Deadline { timestamp: f64 },
    StreamEnded,
    DeviceFailure(CameraError),
    /// The frame could not be turned into an image.
    BadFrame(anyhow::Error),
}

#[derive(Debug)]
pub struct RunReport {
    pub termination: Termination,
    pub statistics: RunStatistics,
    pub summary: Summary,
    /// Frames pulled inside the loop, including the one that hit the deadline.
    pub frames_pulled: u64,
    pub persisted: Result<(), EngineError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(
            self.termination,
            Termination::Deadline { .. } | Termination::StreamEnded
        ) && self.persisted.is_ok()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Per-run state: the started stream, the engine, and everything measured.
pub struct Orchestrator<S, E, K = SystemClock> {
    config: PipelineConfig,
    stream: S,
    engine: E,
    sink: Box<dyn PoseSink>,
    clock: K,
    intervals: RollingIntervalBuffer,
    stats: RunStatistics,
    frames_pulled: u64,
}

impl<S: FrameSource, E: TrackingEngine> Orchestrator<S, E, SystemClock> {
    pub fn new(config: PipelineConfig, stream: S, engine: E) -> Self {
        Self {
            config,
            stream,
            engine,
            sink: Box::new(NoopSink),
            clock: SystemClock,
            intervals: RollingIntervalBuffer::new(),
            stats: RunStatistics::default(),
            frames_pulled: 0,
        }
    }
}

impl<S: FrameSource, E: TrackingEngine, K: Clock> Orchestrator<S, E, K> {
    pub fn with_clock<C: Clock>(self, clock: C) -> Orchestrator<S, E, C> {
        Orchestrator {
            config: self.config,
            stream: self.stream,
            engine: self.engine,
            sink: self.sink,
            clock,
            intervals: self.intervals,
            stats: self.stats,
            frames_pulled: self.frames_pulled,
        }
    }

    pub fn with_sink(mut self, sink: impl PoseSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Run until the budget is spent, the stream ends, or the device fails,
    /// then stop the engine and persist its trajectory.
    pub fn run(mut self) -> RunReport {
        info!("start processing sequence ({}s budget)", self.config.max_runtime);
        let start = self.clock.now();

        let termination = loop {
            let frame = match self.stream.wait_for_frame(self.config.frame_timeout) {
                Ok(frame) => frame,
                Err(CameraError::EndOfStream) => break Termination::StreamEnded,
                Err(e) => {
                    error!("frame pull failed: {}", e);
                    break Termination::DeviceFailure(e);
                }
            };
            self.frames_pulled += 1;

            let arrived = self.clock.now();
            let timestamp = arrived.saturating_duration_since(start).as_secs_f64();
            // a zero budget tracks nothing, even a frame stamped at 0
            if timestamp > self.config.max_runtime || self.config.max_runtime <= 0.0 {
                break Termination::Deadline { timestamp };
            }

            let span = self.intervals.push(timestamp);

            let image = match to_image(&frame) {
                Ok(image) => image,
                Err(e) => {
                    error!("unusable frame at t={:.3}: {:#}", timestamp, e);
                    break Termination::BadFrame(e);
                }
            };
            let pose = self.engine.track(image.view(), timestamp);
            let track_time = self.clock.now().saturating_duration_since(arrived);
            self.stats.record(track_time, timestamp);

            if let Some(pose) = &pose {
                self.sink.on_pose_computed(pose, timestamp);
            }

            debug!(
                "frame {}: t={:.3}s track={:.4}s rate={:.1}{}",
                self.stats.frame_count(),
                timestamp,
                track_time.as_secs_f64(),
                RollingIntervalBuffer::rate(span).unwrap_or(0.0),
                if pose.is_none() { " (lost)" } else { "" }
            );
        };

        let summary = self.stats.summarize(self.config.max_runtime);
        info!("{}", summary);

        let persisted = self.shutdown();
        RunReport {
            termination,
            statistics: self.stats,
            summary,
            frames_pulled: self.frames_pulled,
            persisted,
        }
    }

    /// Engine threads first, then the trajectory: saving must see the final state.
    fn shutdown(&mut self) -> Result<(), EngineError> {
        info!("stopping tracking engine");
        self.engine.shutdown();
        let res = self.engine.save_trajectory(&self.config.trajectory_path);
        match &res {
            Ok(()) => info!("trajectory written to {:?}", self.config.trajectory_path),
            Err(e) => error!("failed to save trajectory: {}", e),
        }
        res
    }
}
