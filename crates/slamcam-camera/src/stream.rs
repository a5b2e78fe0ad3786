// slamcam-camera/src/stream.rs
use crate::{
    CameraError, Frame, FrameSource, Intrinsics, PixelFormat, Result, StreamProfile,
    StreamRequest,
};
use gst::prelude::*;
use std::time::Duration;

/// The mapped buffer behind the frame most recently handed out.
struct Mapped {
    map: gst::MappedBuffer<gst::buffer::Readable>,
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    pts: Duration,
}

/// Stream handle – owns the pipeline and *appsink*. Stops the pipeline on drop.
pub struct GstStream {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    request: StreamRequest,
    intrinsics: Option<Intrinsics>,
    negotiation_timeout: Duration,
    started: bool,
    current: Option<Mapped>,
}

fn clock_time(d: Duration) -> gst::ClockTime {
    gst::ClockTime::from_nseconds(d.as_nanos() as u64)
}

impl GstStream {
    pub(crate) fn new(
        pipeline: gst::Pipeline,
        appsink: gst_app::AppSink,
        request: StreamRequest,
        intrinsics: Option<Intrinsics>,
        negotiation_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            appsink,
            request,
            intrinsics,
            negotiation_timeout,
            started: false,
            current: None,
        }
    }

    /// First pending error on the pipeline bus, if any. Caps failures are
    /// reported as [`CameraError::Negotiation`], everything else as I/O.
    fn bus_error(&self) -> Option<CameraError> {
        let msg = self
            .pipeline
            .bus()?
            .pop_filtered(&[gst::MessageType::Error])?;
        let gst::MessageView::Error(err) = msg.view() else {
            return None;
        };
        let dbg = err.debug();
        let text = match &dbg {
            Some(dbg) => format!("{} ({})", err.error(), dbg),
            None => err.error().to_string(),
        };
        // live sources only fail negotiation once buffers flow, and that
        // surfaces as a not-negotiated flow error from the streaming thread
        let negotiation = err.error().matches(gst::CoreError::Negotiation)
            || err.error().matches(gst::StreamError::Format)
            || dbg.as_deref().is_some_and(|d| d.contains("not-negotiated"));
        Some(if negotiation {
            CameraError::Negotiation(text)
        } else {
            CameraError::Io(text)
        })
    }

    /// Work out why the appsink returned nothing.
    fn no_sample_error(&self, timeout: Option<Duration>) -> CameraError {
        if let Some(err) = self.bus_error() {
            return err;
        }
        if self.appsink.is_eos() {
            return CameraError::EndOfStream;
        }
        match timeout {
            Some(t) => CameraError::Timeout(t),
            None => CameraError::Io("appsink is flushing".into()),
        }
    }

    /// Convert a `gst::Sample` into our mapped wrapper.
    fn map_sample(&self, sample: gst::Sample) -> Result<Mapped> {
        let caps = sample.caps().ok_or(CameraError::MissingCaps)?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| CameraError::FieldError(e.to_string()))?;
        let format = PixelFormat::from_gst_name(info.format().to_str())
            .ok_or_else(|| CameraError::FieldError(format!("format {}", info.format().to_str())))?;
        let stride = info.stride()[0] as u32;
        // to_image expects the UV plane right after the Y plane, same stride
        if format == PixelFormat::Nv12
            && (info.stride()[1] as u32 != stride
                || info.offset()[1] != stride as usize * info.height() as usize)
        {
            return Err(CameraError::FieldError("NV12 plane layout".into()));
        }

        if info.width() != self.request.width || info.height() != self.request.height {
            return Err(CameraError::GeometryMismatch {
                want_w: self.request.width,
                want_h: self.request.height,
                got_w: info.width(),
                got_h: info.height(),
            });
        }

        let buffer = sample.buffer_owned().ok_or(CameraError::MissingBuffer)?;
        let pts = buffer
            .pts()
            .map(|t| Duration::from_nanos(t.nseconds()))
            .unwrap_or(Duration::ZERO);
        let map = buffer
            .into_mapped_buffer_readable()
            .map_err(|_| CameraError::BufferMap)?;

        Ok(Mapped {
            map,
            format,
            width: info.width(),
            height: info.height(),
            stride,
            pts,
        })
    }
}

impl FrameSource for GstStream {
    fn start(&mut self) -> Result<StreamProfile> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(CameraError::StateChange)?;

        // Live sources answer NoPreroll; a caps failure shows up on the bus.
        let (res, _, _) = self.pipeline.state(clock_time(self.negotiation_timeout));
        if let Some(err) = self.bus_error() {
            let _ = self.pipeline.set_state(gst::State::Null);
            return Err(match err {
                CameraError::Io(text) => CameraError::Negotiation(text),
                other => other,
            });
        }
        if let Err(e) = res {
            let _ = self.pipeline.set_state(gst::State::Null);
            return Err(CameraError::StateChange(e));
        }

        self.started = true;
        Ok(StreamProfile {
            width: self.request.width,
            height: self.request.height,
            fps: self.request.fps,
            format: self.request.format,
            intrinsics: self.intrinsics,
        })
    }

    fn wait_for_frame(&mut self, timeout: Option<Duration>) -> Result<Frame<'_>> {
        if !self.started {
            return Err(CameraError::NotStarted);
        }
        // hand the previous buffer back before pulling the next one
        self.current = None;

        let sample = match timeout {
            Some(t) => self.appsink.try_pull_sample(clock_time(t)),
            None => self.appsink.pull_sample().ok(),
        };
        let sample = sample.ok_or_else(|| self.no_sample_error(timeout))?;

        let mapped = self.map_sample(sample)?;
        let m = self.current.insert(mapped);
        Ok(Frame {
            data: m.map.as_slice(),
            format: m.format,
            width: m.width,
            height: m.height,
            stride: m.stride,
            capture_time: m.pts,
        })
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.current = None;
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
