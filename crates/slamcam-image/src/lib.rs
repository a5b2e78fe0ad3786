//! slamcam‑image – turn a borrowed camera frame into an (H, W, C) image.
//!
//! Packed formats (RGB, BGR, GRAY8) come back as a strided view over the
//! driver's memory, so nothing is copied on the hot path. NV12 has to be
//! converted and comes back owned.

use anyhow::{bail, Result};
use ndarray::{Array3, ArrayView3, CowArray, Ix3, ShapeBuilder};
use slamcam_camera::{Frame, PixelFormat};

/// Image handed to the tracking engine.
pub type Image<'a> = CowArray<'a, u8, Ix3>;

/// Build an image from `frame` without copying if the layout allows it.
pub fn to_image<'a>(frame: &Frame<'a>) -> Result<Image<'a>> {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let stride = frame.stride as usize;
    let data: &'a [u8] = frame.data;
    if w == 0 || h == 0 {
        bail!("empty frame {}x{}", w, h);
    }

    match frame.format {
        PixelFormat::Rgb8 | PixelFormat::Bgr8 | PixelFormat::Gray8 => {
            let c = frame.format.bytes_per_pixel();
            if stride < w * c {
                bail!("stride {} shorter than a row of {} bytes", stride, w * c);
            }
            // last row may be unpadded
            let needed = (h - 1) * stride + w * c;
            if data.len() < needed {
                bail!("buffer holds {} bytes, frame needs {}", data.len(), needed);
            }
            let view = ArrayView3::from_shape((h, w, c).strides((stride, c, 1)), &data[..needed])?;
            Ok(CowArray::from(view))
        }
        PixelFormat::Nv12 => {
            if stride < w {
                bail!("stride {} shorter than a row of {} bytes", stride, w);
            }
            let uv_rows = (h + 1) / 2;
            let uv_row_bytes = (w + 1) & !1;
            let needed = stride * h + stride * (uv_rows - 1) + uv_row_bytes;
            if data.len() < needed {
                bail!("buffer holds {} bytes, NV12 frame needs {}", data.len(), needed);
            }
            let (y_plane, uv_plane) = data.split_at(stride * h);

            let mut rgb = vec![0u8; w * h * 3];
            nv12_to_rgb(y_plane, uv_plane, w, h, stride, &mut rgb);
            Ok(CowArray::from(Array3::from_shape_vec((h, w, 3), rgb)?))
        }
    }
}

/// NV12 4:2:0 → RGB24 conversion (BT.601, full range).
fn nv12_to_rgb(y: &[u8], uv: &[u8], w: usize, h: usize, stride: usize, out: &mut [u8]) {
    for j in 0..h {
        for i in 0..w {
            let y_val = y[j * stride + i] as f32;
            let uv_idx = (j / 2) * stride + (i & !1);
            let u = uv[uv_idx]     as f32 - 128.0;
            let v = uv[uv_idx + 1] as f32 - 128.0;

            let r = (y_val + 1.402 * v).clamp(0.0, 255.0);
            let g = (y_val - 0.344_13 * u - 0.714_14 * v).clamp(0.0, 255.0);
            let b = (y_val + 1.772 * u).clamp(0.0, 255.0);

            let base = (j * w + i) * 3;
            out[base]     = r as u8;
            out[base + 1] = g as u8;
            out[base + 2] = b as u8;
        }
    }
}
