// slamcam-camera/src/lib.rs
// ============================================================
// Camera capture layer for slamcam
// Negotiates a single colour stream through GStreamer and
// hands out borrowed frames, one at a time, to the caller.
// ------------------------------------------------------------
// Public API:
//   * CameraDevice::configure() – build an (unstarted) stream
//   * FrameSource::start()      – begin streaming, report profile
//   * FrameSource::wait_for_frame() – blocking pull with timeout
// ------------------------------------------------------------
// Build notes
//   * libcamerasrc is preferred when present (Pi), otherwise v4l2src.
// ============================================================

//! slamcam – camera capture layer
//!
//! The orchestrator only ever talks to the two traits in this crate:
//! [`CameraDevice`] negotiates a stream and [`FrameSource`] delivers frames
//! from it. A [`Frame`] borrows the stream mutably, so the previous frame
//! must be dropped before the next pull; the driver is then free to recycle
//! the buffer behind it.
//!
//! [`GstCamera`] is the GStreamer implementation. Lens intrinsics cannot be
//! queried from a UVC or libcamera source through GStreamer, so they are
//! attached to the device from a calibration file instead.

use gst::prelude::*;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

mod stream;
pub use stream::GstStream;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("GStreamer init failed: {0}")]
    GstInit(#[source] gst::glib::Error),
    #[error("Failed to parse pipeline: {0}")]
    ParsePipeline(#[source] gst::glib::Error),
    #[error("Pipeline is not a gst::Pipeline")]
    NotPipeline,
    #[error("AppSink element not found")]
    AppSinkNotFound,
    #[error("AppSink element downcast failed")]
    AppSinkDowncastFailed,
    #[error("Failed to set pipeline to Playing: {0}")]
    StateChange(#[source] gst::StateChangeError),
    #[error("Stream negotiation failed: {0}")]
    Negotiation(String),
    #[error("Requested mode {0} is not supported")]
    UnsupportedMode(StreamRequest),
    #[error("Stream has not been started")]
    NotStarted,
    #[error("No frame within {0:?}")]
    Timeout(Duration),
    #[error("End of stream")]
    EndOfStream,
    #[error("Device I/O error: {0}")]
    Io(String),
    #[error("Sample has no buffer")]
    MissingBuffer,
    #[error("Sample has no caps")]
    MissingCaps,
    #[error("Failed to read video info from caps: {0}")]
    FieldError(String),
    #[error("Buffer map failed")]
    BufferMap,
    #[error("Delivered {got_w}x{got_h}, expected {want_w}x{want_h}")]
    GeometryMismatch {
        want_w: u32,
        want_h: u32,
        got_w: u32,
        got_h: u32,
    },
}

impl CameraError {
    /// Whether the device cannot deliver the requested mode at all, as
    /// opposed to failing while it streams.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CameraError::Negotiation(_)
                | CameraError::UnsupportedMode(_)
                | CameraError::GeometryMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// Pixel layouts the capture layer can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Gray8,
    /// Y plane followed by interleaved UV at half resolution.
    Nv12,
}

impl PixelFormat {
    /// Name used in `video/x-raw` caps.
    pub fn gst_name(self) -> &'static str {
        match self {
            PixelFormat::Rgb8 => "RGB",
            PixelFormat::Bgr8 => "BGR",
            PixelFormat::Gray8 => "GRAY8",
            PixelFormat::Nv12 => "NV12",
        }
    }

    pub fn from_gst_name(name: &str) -> Option<Self> {
        match name {
            "RGB" => Some(PixelFormat::Rgb8),
            "BGR" => Some(PixelFormat::Bgr8),
            "GRAY8" => Some(PixelFormat::Gray8),
            "NV12" => Some(PixelFormat::Nv12),
            _ => None,
        }
    }

    /// Bytes per pixel of the first plane.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Gray8 | PixelFormat::Nv12 => 1,
        }
    }
}

/// What the orchestrator asks the device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

impl fmt::Display for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{} {}",
            self.width,
            self.height,
            self.fps,
            self.format.gst_name()
        )
    }
}

/// Pinhole intrinsics plus Brown–Conrady distortion `[k1, k2, p1, p2, k3]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub ppx: f64,
    pub ppy: f64,
    pub coeffs: [f64; 5],
}

/// What the device actually started.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub intrinsics: Option<Intrinsics>,
}

/// A captured frame borrowed from the driver.
///
/// Rows are `stride` bytes apart. For NV12 the UV plane follows the Y plane
/// directly, with the same stride.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub capture_time: Duration,
}

/// Negotiates a stream. One device produces at most one stream at a time.
pub trait CameraDevice {
    type Stream: FrameSource;

    /// Validate `request` against the device and build an unstarted stream.
    fn configure(&mut self, request: &StreamRequest) -> Result<Self::Stream>;

    /// Layout to ask for when the caller has no preference.
    fn preferred_format(&self) -> Option<PixelFormat> {
        None
    }
}

/// An active (or startable) stream of frames.
pub trait FrameSource {
    /// Begin streaming. Frames may queue inside the driver from here on.
    fn start(&mut self) -> Result<StreamProfile>;

    /// Block until the next frame is ready.
    ///
    /// `None` blocks forever. A frame is only valid until the next call.
    fn wait_for_frame(&mut self, timeout: Option<Duration>) -> Result<Frame<'_>>;
}

const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Camera handle – knows which source element to use and its calibration.
#[derive(Debug, Clone)]
pub struct GstCamera {
    source: String,
    intrinsics: Option<Intrinsics>,
    format: Option<PixelFormat>,
    negotiation_timeout: Duration,
}

impl GstCamera {
    /// Initialise GStreamer and pick the capture source.
    ///
    /// ```no_run
    /// use slamcam_camera::{CameraDevice, FrameSource, GstCamera, PixelFormat, StreamRequest};
    /// let mut cam = GstCamera::new().unwrap();
    /// let req = StreamRequest { width: 640, height: 480, fps: 30, format: PixelFormat::Rgb8 };
    /// let mut stream = cam.configure(&req).unwrap();
    /// stream.start().unwrap();
    /// let frame = stream.wait_for_frame(None).unwrap();
    /// println!("{}x{} stride {}", frame.width, frame.height, frame.stride);
    /// ```
    pub fn new() -> Result<Self> {
        gst::init().map_err(CameraError::GstInit)?;

        let source = if gst::ElementFactory::find("libcamerasrc").is_some() {
            // Pi (libcamera) stack
            "libcamerasrc"
        } else {
            // PC webcam
            "v4l2src device=/dev/video0"
        };

        Ok(Self {
            source: source.to_string(),
            intrinsics: None,
            format: None,
            negotiation_timeout: DEFAULT_NEGOTIATION_TIMEOUT,
        })
    }

    /// Replace the source element description, e.g. `videotestsrc is-live=true`.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_intrinsics(mut self, intrinsics: Intrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    /// Channel order the calibration was made with, e.g. BGR for `Camera.RGB: 0`.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// How long `start` waits for the pipeline to reach Playing.
    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn pipeline_description(&self, req: &StreamRequest) -> String {
        // max-buffers=1 + drop=false: never queue more than one frame ahead
        format!(
            "{src} ! videoconvert ! video/x-raw,format={fmt},width={w},height={h},framerate={f}/1 \
            ! appsink name=sink max-buffers=1 drop=false sync=false",
            src = self.source,
            fmt = req.format.gst_name(),
            w = req.width,
            h = req.height,
            f = req.fps
        )
    }
}

impl CameraDevice for GstCamera {
    type Stream = GstStream;

    fn preferred_format(&self) -> Option<PixelFormat> {
        self.format
    }

    fn configure(&mut self, request: &StreamRequest) -> Result<GstStream> {
        if request.width == 0 || request.height == 0 || request.fps == 0 {
            return Err(CameraError::UnsupportedMode(*request));
        }

        let pipeline = gst::parse::launch(&self.pipeline_description(request))
            .map_err(CameraError::ParsePipeline)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CameraError::NotPipeline)?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or(CameraError::AppSinkNotFound)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CameraError::AppSinkDowncastFailed)?;

        log::debug!("configured {} on {}", request, self.source);
        Ok(GstStream::new(
            pipeline,
            appsink,
            *request,
            self.intrinsics,
            self.negotiation_timeout,
        ))
    }
}
