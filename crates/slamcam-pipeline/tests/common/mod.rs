//! Scripted camera and engine doubles driven off a shared ManualClock.
#![allow(dead_code)]

use slamcam_camera::{
    CameraDevice, CameraError, Frame, FrameSource, Intrinsics, PixelFormat, StreamProfile,
    StreamRequest,
};
use slamcam_engine::{EngineError, Pose, TrackingEngine};
use slamcam_pipeline::{ManualClock, PipelineConfig};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

pub const W: u32 = 8;
pub const H: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Deliver a frame after the clock moves on by this many seconds.
    Frame(f64),
    /// Deliver a frame whose buffer is too short for its geometry.
    Truncated,
    Fail,
    /// Nothing arrived within the pull's timeout.
    Timeout,
    /// Caps negotiation failed once buffers started to flow.
    Unnegotiated,
    End,
}

/// Steps for frames arriving at the absolute times `arrivals` when every
/// track call takes `latency` seconds.
pub fn arrivals(arrivals: &[f64], latency: f64) -> Vec<Step> {
    let mut steps = Vec::with_capacity(arrivals.len());
    let mut now = 0.0;
    for (i, &t) in arrivals.iter().enumerate() {
        steps.push(Step::Frame(t - now));
        now = t + if i + 1 < arrivals.len() { latency } else { 0.0 };
    }
    steps
}

pub struct ScriptedCamera {
    pub configure_calls: Rc<Cell<u32>>,
    pub fail_configure: bool,
    pub preferred: Option<PixelFormat>,
    /// The last request passed to `configure`.
    pub request: Rc<Cell<Option<StreamRequest>>>,
    /// Timeout of every pull, in order, warmup included.
    pub timeouts: Rc<RefCell<Vec<Option<Duration>>>>,
    steps: Vec<Step>,
    clock: ManualClock,
}

impl ScriptedCamera {
    pub fn new(clock: &ManualClock, steps: Vec<Step>) -> Self {
        Self {
            configure_calls: Rc::new(Cell::new(0)),
            fail_configure: false,
            preferred: None,
            request: Rc::new(Cell::new(None)),
            timeouts: Rc::new(RefCell::new(Vec::new())),
            steps,
            clock: clock.clone(),
        }
    }
}

impl CameraDevice for ScriptedCamera {
    type Stream = ScriptedStream;

    fn configure(&mut self, request: &StreamRequest) -> Result<ScriptedStream, CameraError> {
        self.configure_calls.set(self.configure_calls.get() + 1);
        self.request.set(Some(*request));
        if self.fail_configure {
            return Err(CameraError::UnsupportedMode(*request));
        }
        let (w, h) = (request.width as usize, request.height as usize);
        let len = match request.format {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => w * h * 3,
            PixelFormat::Gray8 => w * h,
            PixelFormat::Nv12 => w * h * 3 / 2,
        };
        Ok(ScriptedStream {
            steps: self.steps.iter().copied().collect(),
            clock: self.clock.clone(),
            buffer: vec![0u8; len],
            request: *request,
            started: false,
            pulls: Rc::new(Cell::new(0)),
            timeouts: self.timeouts.clone(),
        })
    }

    fn preferred_format(&self) -> Option<PixelFormat> {
        self.preferred
    }
}

pub struct ScriptedStream {
    steps: VecDeque<Step>,
    clock: ManualClock,
    buffer: Vec<u8>,
    request: StreamRequest,
    started: bool,
    pub pulls: Rc<Cell<u32>>,
    pub timeouts: Rc<RefCell<Vec<Option<Duration>>>>,
}

impl ScriptedStream {
    /// A started RGB stream for driving the orchestrator directly.
    pub fn started(clock: &ManualClock, steps: Vec<Step>) -> Self {
        Self::started_with(clock, steps, PixelFormat::Rgb8)
    }

    pub fn started_with(clock: &ManualClock, steps: Vec<Step>, format: PixelFormat) -> Self {
        let mut cam = ScriptedCamera::new(clock, steps);
        let req = StreamRequest { width: W, height: H, fps: 30, format };
        let mut stream = cam.configure(&req).unwrap();
        stream.start().unwrap();
        stream
    }
}

impl FrameSource for ScriptedStream {
    fn start(&mut self) -> Result<StreamProfile, CameraError> {
        self.started = true;
        Ok(StreamProfile {
            width: self.request.width,
            height: self.request.height,
            fps: self.request.fps,
            format: self.request.format,
            intrinsics: Some(Intrinsics {
                fx: 500.0,
                fy: 500.0,
                ppx: 4.0,
                ppy: 3.0,
                coeffs: [0.0; 5],
            }),
        })
    }

    fn wait_for_frame(&mut self, timeout: Option<Duration>) -> Result<Frame<'_>, CameraError> {
        assert!(self.started, "pulled before start");
        self.pulls.set(self.pulls.get() + 1);
        self.timeouts.borrow_mut().push(timeout);
        let (after, len) = match self.steps.pop_front() {
            None | Some(Step::End) => return Err(CameraError::EndOfStream),
            Some(Step::Fail) => return Err(CameraError::Io("device unplugged".into())),
            Some(Step::Timeout) => {
                let waited = timeout.expect("scripted timeout on a pull that blocks forever");
                self.clock.advance(waited);
                return Err(CameraError::Timeout(waited));
            }
            Some(Step::Unnegotiated) => {
                return Err(CameraError::Negotiation("not-negotiated".into()))
            }
            Some(Step::Truncated) => (0.0, 3),
            Some(Step::Frame(after)) => (after, self.buffer.len()),
        };
        self.clock.advance_secs(after);
        let stride = match self.request.format {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => self.request.width * 3,
            PixelFormat::Gray8 | PixelFormat::Nv12 => self.request.width,
        };
        Ok(Frame {
            data: &self.buffer[..len],
            format: self.request.format,
            width: self.request.width,
            height: self.request.height,
            stride,
            capture_time: self.clock.elapsed(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Track(f64),
    Shutdown,
    Save(PathBuf),
}

/// Engine double that logs every call and burns `latency` on each track.
/// Only the image geometry is checked; channels depend on the pixel format.
pub struct RecordingEngine {
    pub calls: Rc<RefCell<Vec<Call>>>,
    clock: ManualClock,
    latency: f64,
    /// Return `None` for every n-th frame (1-based).
    pub lose_every: Option<usize>,
    pub fail_save: bool,
    tracked: usize,
}

impl RecordingEngine {
    pub fn new(clock: &ManualClock, latency: f64) -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            clock: clock.clone(),
            latency,
            lose_every: None,
            fail_save: false,
            tracked: 0,
        }
    }

    pub fn tracked_timestamps(calls: &[Call]) -> Vec<f64> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Track(t) => Some(*t),
                _ => None,
            })
            .collect()
    }
}

impl TrackingEngine for RecordingEngine {
    fn track(&mut self, image: ndarray::ArrayView3<'_, u8>, timestamp: f64) -> Option<Pose> {
        let (rows, cols, _) = image.dim();
        assert_eq!((rows, cols), (H as usize, W as usize));
        self.calls.borrow_mut().push(Call::Track(timestamp));
        self.clock.advance_secs(self.latency);
        self.tracked += 1;
        match self.lose_every {
            Some(n) if self.tracked % n == 0 => None,
            _ => Some(Pose::IDENTITY),
        }
    }

    fn shutdown(&mut self) {
        self.calls.borrow_mut().push(Call::Shutdown);
    }

    fn save_trajectory(&mut self, path: &Path) -> Result<(), EngineError> {
        self.calls.borrow_mut().push(Call::Save(path.to_path_buf()));
        if self.fail_save {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        Ok(())
    }
}

pub fn config(max_runtime: f64) -> PipelineConfig {
    PipelineConfig {
        width: W,
        height: H,
        max_runtime,
        warmup_frames: 0,
        trajectory_path: PathBuf::from("trajectory.txt"),
        ..Default::default()
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Assert the run ended with `shutdown` immediately followed by `save`.
pub fn assert_shutdown_then_save(calls: &[Call]) {
    let n = calls.len();
    assert!(n >= 2, "engine saw {calls:?}");
    assert_eq!(calls[n - 2], Call::Shutdown);
    assert!(matches!(calls[n - 1], Call::Save(_)));
    assert_eq!(calls.iter().filter(|c| **c == Call::Shutdown).count(), 1);
}
