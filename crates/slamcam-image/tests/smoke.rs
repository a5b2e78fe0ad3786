use slamcam_camera::{Frame, PixelFormat};
use slamcam_image::to_image;
use std::time::Duration;

fn frame(data: &[u8], format: PixelFormat, w: u32, h: u32, stride: u32) -> Frame<'_> {
    Frame { data, format, width: w, height: h, stride, capture_time: Duration::ZERO }
}

#[test]
fn nv12_white_frame() {
    // Fake NV12 640×480, Y plane = 255 (white), neutral chroma
    let w = 640; let h = 480;
    let mut bytes = vec![128u8; (w * h * 3 / 2) as usize];
    bytes[..(w*h) as usize].fill(255);

    let img = to_image(&frame(&bytes, PixelFormat::Nv12, w, h, w)).unwrap();
    assert_eq!(img.shape(), &[480, 640, 3]);
    assert!(!img.is_view());
    assert!(img.iter().all(|&p| p == 255));
}

#[test]
fn padded_rgb_is_borrowed_not_copied() {
    // 3×2 RGB with 12-byte rows (3 bytes of padding)
    let w = 3; let h = 2; let stride = 12;
    let mut bytes = vec![0u8; stride * h];
    for row in 0..h {
        for px in 0..w {
            let base = row * stride + px * 3;
            bytes[base] = (row * 10 + px) as u8;
        }
    }

    let img = to_image(&frame(&bytes, PixelFormat::Rgb8, w as u32, h as u32, stride as u32)).unwrap();
    assert!(img.is_view());
    assert_eq!(img.shape(), &[2, 3, 3]);
    assert_eq!(img[[1, 2, 0]], 12);
    assert_eq!(img[[0, 1, 0]], 1);
}

#[test]
fn gray_frame_has_one_channel() {
    let bytes = vec![7u8; 16];
    let img = to_image(&frame(&bytes, PixelFormat::Gray8, 4, 4, 4)).unwrap();
    assert_eq!(img.shape(), &[4, 4, 1]);
}

#[test]
fn short_buffer_is_rejected() {
    let bytes = vec![0u8; 640 * 3 * 10];
    assert!(to_image(&frame(&bytes, PixelFormat::Rgb8, 640, 480, 640 * 3)).is_err());
    assert!(to_image(&frame(&bytes, PixelFormat::Nv12, 640, 480, 640)).is_err());
}

#[test]
fn stride_narrower_than_row_is_rejected() {
    let bytes = vec![0u8; 1024];
    assert!(to_image(&frame(&bytes, PixelFormat::Bgr8, 8, 8, 16)).is_err());
}
