//! Integration tests for frame and image conversion.

use image::{
    ColorType, DynamicImage, GrayImage, ImageBuffer, Luma, LumaA, Rgb, RgbImage, Rgba, RgbaImage,
};
use vidframe_core::convert::{color_type_for_pixel_format, pixel_format_for_color_type};
use vidframe_core::{FrameError, FrameFormat, MapMode, PixelFormat, Size, VideoFrame};

use crate::init_tracing;

// ── Helpers ────────────────────────────────────────────────────

const RED: [u8; 3] = [0xff, 0, 0];
const GREEN: [u8; 3] = [0, 0xff, 0];
const BLUE: [u8; 3] = [0, 0, 0xff];

/// 3x2 image: red, green, blue on top; blue, red, green below.
fn rgb_test_image() -> RgbImage {
    let rows = [[RED, GREEN, BLUE], [BLUE, RED, GREEN]];
    RgbImage::from_fn(3, 2, |x, y| Rgb(rows[y as usize][x as usize]))
}

fn frame_of(pixel_format: PixelFormat, width: i32, height: i32) -> VideoFrame {
    VideoFrame::from_format(FrameFormat::new(Size::new(width, height), pixel_format))
}

// ── From image ─────────────────────────────────────────────────

#[test]
fn rgb_image_lands_in_bgrx() {
    init_tracing();
    let source = rgb_test_image();
    let mut frame = VideoFrame::from_image(&DynamicImage::ImageRgb8(source.clone()));
    assert!(frame.is_valid());
    assert_eq!(frame.pixel_format(), PixelFormat::Bgrx8888);
    assert_eq!(frame.size(), Size::new(3, 2));

    assert!(frame.map(MapMode::ReadOnly));
    let stride = frame.bytes_per_line(0);
    let bits = frame.bits(0).unwrap();
    for (x, y, pixel) in source.enumerate_pixels() {
        let at = y as usize * stride + x as usize * 4;
        let [r, g, b] = pixel.0;
        assert_eq!(&bits[at..at + 4], &[b, g, r, 0xff], "pixel ({x}, {y})");
    }
}

#[test]
fn rgba_image_is_wrapped_natively() {
    let mut source = RgbaImage::new(3, 2);
    for (x, y, pixel) in source.enumerate_pixels_mut() {
        *pixel = Rgba([x as u8 * 40, y as u8 * 90, 7, 200]);
    }
    let image = DynamicImage::ImageRgba8(source);
    let mut frame = VideoFrame::from_image(&image);
    assert_eq!(frame.pixel_format(), PixelFormat::Rgba8888);

    assert!(frame.map(MapMode::ReadWrite));
    assert_eq!(frame.bits(0).unwrap(), image.as_bytes());
    frame.bits_mut(0).unwrap()[0] = 0xee;
    frame.unmap();

    assert_ne!(image.as_bytes()[0], 0xee, "frame must not alias the source image");
}

#[test]
fn alpha_images_land_in_bgra() {
    let gray_alpha = image::GrayAlphaImage::from_pixel(2, 2, LumaA([0x40, 0x80]));
    let mut frame = VideoFrame::from_image(&DynamicImage::ImageLumaA8(gray_alpha));
    assert_eq!(frame.pixel_format(), PixelFormat::Bgra8888);

    assert!(frame.map(MapMode::ReadOnly));
    assert_eq!(&frame.bits(0).unwrap()[..4], &[0x40, 0x40, 0x40, 0x80]);
}

#[test]
fn wide_images_are_normalized_per_color_type() {
    init_tracing();
    let cases = [
        (
            DynamicImage::ImageRgb16(ImageBuffer::from_pixel(2, 2, Rgb([65535, 32896, 0]))),
            PixelFormat::Bgrx8888,
            [0, 128, 255, 255],
        ),
        (
            DynamicImage::ImageRgb32F(ImageBuffer::from_pixel(2, 2, Rgb([2.0, 0.5, -1.0]))),
            PixelFormat::Bgrx8888,
            [0, 128, 255, 255],
        ),
        (
            DynamicImage::ImageRgba16(ImageBuffer::from_pixel(2, 2, Rgba([65535, 32896, 0, 65535]))),
            PixelFormat::Bgra8888,
            [0, 128, 255, 255],
        ),
        (
            DynamicImage::ImageRgba32F(ImageBuffer::from_pixel(2, 2, Rgba([1.0, 0.5, 0.0, 1.0]))),
            PixelFormat::Bgra8888,
            [0, 128, 255, 255],
        ),
        (
            DynamicImage::ImageLumaA16(ImageBuffer::from_pixel(2, 2, LumaA([32896, 65535]))),
            PixelFormat::Bgra8888,
            [128, 128, 128, 255],
        ),
    ];
    for (image, pixel_format, expected) in cases {
        let color_type = image.color();
        let mut frame = VideoFrame::from_image(&image);
        assert!(frame.is_valid(), "{color_type:?}");
        assert_eq!(frame.pixel_format(), pixel_format, "{color_type:?}");
        assert_eq!(frame.size(), Size::new(2, 2), "{color_type:?}");

        assert!(frame.map(MapMode::ReadOnly));
        let stride = frame.bytes_per_line(0);
        let bits = frame.bits(0).unwrap();
        for (y, x) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            let at = y * stride + x * 4;
            assert_eq!(&bits[at..at + 4], &expected, "{color_type:?} pixel ({x}, {y})");
        }
    }
}

#[test]
fn sixteen_bit_gray_image_is_wrapped_natively() {
    let source = ImageBuffer::from_fn(3, 2, |x, y| {
        Luma([x as u16 * 0x1111 + y as u16 * 0x0101 + 0x00ff])
    });
    let image = DynamicImage::ImageLuma16(source.clone());
    let mut frame = VideoFrame::from_image(&image);
    assert_eq!(frame.pixel_format(), PixelFormat::Y16);

    assert!(frame.map(MapMode::ReadWrite));
    assert_eq!(frame.bytes_per_line(0), 6);
    assert_eq!(frame.bits(0).unwrap(), image.as_bytes());
    frame.unmap();

    let snapshot = frame.to_image().unwrap();
    assert_eq!(snapshot.color(), ColorType::L16);
    assert_eq!(snapshot.as_luma16().unwrap(), &source);
}

#[test]
fn gray_image_round_trips() {
    let source = GrayImage::from_fn(5, 3, |x, y| image::Luma([(x * 10 + y) as u8]));
    let frame = VideoFrame::from_image(&DynamicImage::ImageLuma8(source.clone()));
    assert_eq!(frame.pixel_format(), PixelFormat::Y8);

    let image = frame.to_image().unwrap();
    assert_eq!(image.color(), ColorType::L8);
    assert_eq!(image.as_bytes(), source.as_raw().as_slice());
}

#[test]
fn zero_area_images_give_invalid_frames() {
    init_tracing();
    assert!(!VideoFrame::from_image(&DynamicImage::new_rgb8(0, 0)).is_valid());
    assert!(!VideoFrame::from_image(&DynamicImage::new_rgb8(3, 0)).is_valid());

    assert_eq!(
        VideoFrame::try_from_image(&DynamicImage::new_rgba8(0, 0)).unwrap_err(),
        FrameError::NullImage
    );
    assert_eq!(
        VideoFrame::try_from_image(&DynamicImage::new_rgba8(0, 5)).unwrap_err(),
        FrameError::EmptyImage { width: 0, height: 5 }
    );
}

// ── To image ───────────────────────────────────────────────────

#[test]
fn to_image_matches_frame_size() {
    init_tracing();
    let formats = [
        PixelFormat::Argb8888,
        PixelFormat::Argb8888Premultiplied,
        PixelFormat::Xrgb8888,
        PixelFormat::Bgra8888,
        PixelFormat::Bgra8888Premultiplied,
        PixelFormat::Bgrx8888,
        PixelFormat::Abgr8888,
        PixelFormat::Xbgr8888,
        PixelFormat::Rgba8888,
        PixelFormat::Rgbx8888,
        PixelFormat::Ayuv,
        PixelFormat::AyuvPremultiplied,
        PixelFormat::Yuv420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yv12,
        PixelFormat::Uyvy,
        PixelFormat::Yuyv,
        PixelFormat::Nv12,
        PixelFormat::Nv21,
        PixelFormat::Imc1,
        PixelFormat::Imc2,
        PixelFormat::Imc3,
        PixelFormat::Imc4,
        PixelFormat::Y8,
        PixelFormat::Y16,
        PixelFormat::P010,
        PixelFormat::P016,
        PixelFormat::Yuv420p10,
    ];
    for pixel_format in formats {
        let frame = frame_of(pixel_format, 17, 10);
        let image = frame.to_image();
        assert!(image.is_some(), "{pixel_format}");
        let image = image.unwrap();
        assert_eq!((image.width(), image.height()), (17, 10), "{pixel_format}");
        assert!(!frame.is_mapped(), "{pixel_format}");
    }
}

#[test]
fn unconvertible_frames_give_no_image() {
    assert!(frame_of(PixelFormat::Jpeg, 8, 8).to_image().is_none());
    assert!(VideoFrame::new().to_image().is_none());
    assert!(frame_of(PixelFormat::Argb8888, 0, 8).to_image().is_none());
}

#[test]
fn to_image_fails_while_write_mapped() {
    let mut frame = frame_of(PixelFormat::Argb8888, 4, 4);
    assert!(frame.map(MapMode::WriteOnly));
    assert!(frame.to_image().is_none());
    assert_eq!(frame.map_mode(), MapMode::WriteOnly);

    frame.unmap();
    assert!(frame.map(MapMode::ReadWrite));
    assert!(frame.to_image().is_some());
}

#[test]
fn rgbx_snapshot_has_opaque_alpha() {
    let mut frame = frame_of(PixelFormat::Rgbx8888, 2, 1);
    assert!(frame.map(MapMode::WriteOnly));
    frame.bits_mut(0).unwrap()[..8].copy_from_slice(&[1, 2, 3, 0, 4, 5, 6, 0]);
    frame.unmap();

    let image = frame.to_image().unwrap();
    assert_eq!(image.color(), ColorType::Rgba8);
    assert_eq!(image.as_bytes(), &[1, 2, 3, 0xff, 4, 5, 6, 0xff]);

    // Rgba8 images come back as Rgba8888, not Rgbx8888
    let back = VideoFrame::from_image(&image);
    assert_eq!(back.pixel_format(), PixelFormat::Rgba8888);
}

#[test]
fn nv12_white_frame_converts_to_white() {
    let mut frame = frame_of(PixelFormat::Nv12, 4, 4);
    assert!(frame.map(MapMode::WriteOnly));
    frame.bits_mut(0).unwrap().fill(235);
    frame.bits_mut(1).unwrap().fill(128);
    frame.unmap();

    let image = frame.to_image().unwrap().to_rgba8();
    assert!(image.pixels().all(|p| p.0 == [0xff, 0xff, 0xff, 0xff]));
}

#[test]
fn bgra_frame_swizzles_to_rgba() {
    let source = rgb_test_image();
    let frame = VideoFrame::from_image(&DynamicImage::ImageRgb8(source.clone()));
    let image = frame.to_image().unwrap().to_rgb8();
    assert_eq!(image, source);
}

// ── Tables ─────────────────────────────────────────────────────

#[test]
fn format_tables_are_asymmetric_for_rgbx() {
    assert_eq!(pixel_format_for_color_type(ColorType::Rgba8), PixelFormat::Rgba8888);
    assert_eq!(color_type_for_pixel_format(PixelFormat::Rgba8888), Some(ColorType::Rgba8));
    assert_eq!(color_type_for_pixel_format(PixelFormat::Rgbx8888), Some(ColorType::Rgba8));
    assert_eq!(color_type_for_pixel_format(PixelFormat::Bgrx8888), None);
}
