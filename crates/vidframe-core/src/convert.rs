//! Conversion between frames and `image` surfaces.
//!
//! Two static tables drive the mapping. Images whose color type has a frame
//! pixel format with the same byte layout are wrapped as they are; everything
//! else is normalized to 32-bit BGRA/BGRX first. In the other direction the
//! few formats with an image counterpart are copied row by row and all the
//! rest go through a CPU sampler producing RGBA.

use crate::buffer::{ImageVideoBuffer, MemoryVideoBuffer, VideoBuffer};
use crate::error::{FrameError, Result};
use crate::format::{FrameFormat, PixelFormat, Size};
use image::{ColorType, DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use tracing::{debug, warn};

/// Image color type to frame pixel format.
static IMAGE_FORMATS: [(ColorType, PixelFormat); 10] = [
    (ColorType::L8, PixelFormat::Y8),
    (ColorType::L16, PixelFormat::Y16),
    (ColorType::Rgba8, PixelFormat::Rgba8888),
    (ColorType::Rgb8, PixelFormat::Bgrx8888),
    (ColorType::Rgb16, PixelFormat::Bgrx8888),
    (ColorType::Rgb32F, PixelFormat::Bgrx8888),
    (ColorType::La8, PixelFormat::Bgra8888),
    (ColorType::La16, PixelFormat::Bgra8888),
    (ColorType::Rgba16, PixelFormat::Bgra8888),
    (ColorType::Rgba32F, PixelFormat::Bgra8888),
];

/// Frame pixel format to image color type, for formats copied without
/// sampling. `Rgbx8888` lands on `Rgba8` with opaque alpha even though
/// `Rgba8` images come back in as `Rgba8888`.
static NATIVE_IMAGE_FORMATS: [(PixelFormat, ColorType); 4] = [
    (PixelFormat::Rgba8888, ColorType::Rgba8),
    (PixelFormat::Rgbx8888, ColorType::Rgba8),
    (PixelFormat::Y8, ColorType::L8),
    (PixelFormat::Y16, ColorType::L16),
];

/// Frame pixel format used for images of `color_type`, `Invalid` when the
/// color type is not supported.
pub fn pixel_format_for_color_type(color_type: ColorType) -> PixelFormat {
    IMAGE_FORMATS
        .iter()
        .find(|(ct, _)| *ct == color_type)
        .map_or(PixelFormat::Invalid, |&(_, pf)| pf)
}

/// Image color type `to_image` produces for `pixel_format` without sampling.
pub fn color_type_for_pixel_format(pixel_format: PixelFormat) -> Option<ColorType> {
    NATIVE_IMAGE_FORMATS
        .iter()
        .find(|(pf, _)| *pf == pixel_format)
        .map(|&(_, ct)| ct)
}

/// Whether an image of `color_type` can be wrapped without touching its bytes.
fn is_native(color_type: ColorType, pixel_format: PixelFormat) -> bool {
    color_type_for_pixel_format(pixel_format) == Some(color_type)
}

/// Frame size for an image, rejecting dimensions a frame cannot represent.
pub(crate) fn frame_size_for_image(width: u32, height: u32) -> Result<Size> {
    match (i32::try_from(width), i32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok(Size::new(w, h)),
        _ => {
            warn!(width, height, "rejecting oversized image");
            Err(FrameError::ImageTooLarge { width, height })
        }
    }
}

/// Build a buffer holding a private copy of `image` and the format it is
/// laid out in.
pub(crate) fn buffer_for_image(image: &DynamicImage) -> Result<(Box<dyn VideoBuffer>, FrameFormat)> {
    let (width, height) = (image.width(), image.height());
    if width == 0 && height == 0 {
        warn!("rejecting null image");
        return Err(FrameError::NullImage);
    }
    if width == 0 || height == 0 {
        warn!(width, height, "rejecting image with empty area");
        return Err(FrameError::EmptyImage { width, height });
    }

    let size = frame_size_for_image(width, height)?;
    let color_type = image.color();
    let pixel_format = pixel_format_for_color_type(color_type);
    if pixel_format == PixelFormat::Invalid {
        warn!(?color_type, "unsupported image color type");
        return Err(FrameError::UnsupportedImageFormat(format!("{color_type:?}")));
    }

    if is_native(color_type, pixel_format) {
        let buffer: Box<dyn VideoBuffer> = Box::new(ImageVideoBuffer::new(image.clone()));
        return Ok((buffer, FrameFormat::new(size, pixel_format)));
    }

    debug!(?color_type, %pixel_format, width, height, "normalizing image");
    let bytes_per_line = width as usize * 4;
    let bytes = match pixel_format {
        PixelFormat::Bgrx8888 => image
            .to_rgb8()
            .pixels()
            .flat_map(|p| [p[2], p[1], p[0], 0xff])
            .collect(),
        _ => image
            .to_rgba8()
            .pixels()
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect::<Vec<u8>>(),
    };
    let buffer: Box<dyn VideoBuffer> = Box::new(MemoryVideoBuffer::new(bytes, bytes_per_line));
    Ok((buffer, FrameFormat::new(size, pixel_format)))
}

/// One mapped plane as seen by the sampler.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PlaneView<'a> {
    pub bytes: &'a [u8],
    pub stride: usize,
}

impl PlaneView<'_> {
    #[inline]
    fn byte(&self, offset: usize, row: usize) -> u8 {
        self.bytes.get(row * self.stride + offset).copied().unwrap_or(0)
    }

    /// Little-endian 16-bit word at byte `offset` of `row`.
    #[inline]
    fn word(&self, offset: usize, row: usize) -> u16 {
        u16::from_le_bytes([self.byte(offset, row), self.byte(offset + 1, row)])
    }
}

/// Per-pixel decoder for one pixel format.
#[derive(Debug, Clone, Copy)]
enum Sampler {
    /// 32-bit RGB; byte indices of r, g, b and optionally alpha.
    Packed {
        order: [usize; 3],
        alpha: Option<usize>,
        premultiplied: bool,
    },
    Ayuv {
        premultiplied: bool,
    },
    /// 4:2:2 packed in 4-byte pairs; byte indices of y0, y1, u and v.
    Packed422 {
        y: [usize; 2],
        u: usize,
        v: usize,
    },
    /// Separate U and V planes.
    Planar {
        u_plane: usize,
        v_plane: usize,
        half_height: bool,
        ten_bit: bool,
    },
    /// Interleaved chroma in plane 1.
    SemiPlanar {
        v_first: bool,
        sixteen_bit: bool,
    },
    /// Each chroma line holds one component in its left half and the other
    /// at half the stride.
    SplitLine {
        v_first: bool,
    },
}

impl Sampler {
    /// `None` for formats without a sampler, including the ones
    /// `image_from_planes` copies natively.
    fn for_format(pixel_format: PixelFormat) -> Option<Self> {
        use PixelFormat::*;
        let packed = |order, alpha, premultiplied| Self::Packed {
            order,
            alpha,
            premultiplied,
        };
        let planar = |u_plane, v_plane, half_height, ten_bit| Self::Planar {
            u_plane,
            v_plane,
            half_height,
            ten_bit,
        };
        Some(match pixel_format {
            Argb8888 => packed([1, 2, 3], Some(0), false),
            Argb8888Premultiplied => packed([1, 2, 3], Some(0), true),
            Xrgb8888 => packed([1, 2, 3], None, false),
            Bgra8888 => packed([2, 1, 0], Some(3), false),
            Bgra8888Premultiplied => packed([2, 1, 0], Some(3), true),
            Bgrx8888 => packed([2, 1, 0], None, false),
            Abgr8888 => packed([3, 2, 1], Some(0), false),
            Xbgr8888 => packed([3, 2, 1], None, false),
            Rgbx8888 => packed([0, 1, 2], None, false),
            Ayuv => Self::Ayuv { premultiplied: false },
            AyuvPremultiplied => Self::Ayuv { premultiplied: true },
            Uyvy => Self::Packed422 { y: [1, 3], u: 0, v: 2 },
            Yuyv => Self::Packed422 { y: [0, 2], u: 1, v: 3 },
            Yuv420p => planar(1, 2, true, false),
            Yuv422p => planar(1, 2, false, false),
            Yv12 => planar(2, 1, true, false),
            Yuv420p10 => planar(1, 2, true, true),
            Imc1 => planar(2, 1, true, false),
            Imc3 => planar(1, 2, true, false),
            Nv12 => Self::SemiPlanar {
                v_first: false,
                sixteen_bit: false,
            },
            Nv21 => Self::SemiPlanar {
                v_first: true,
                sixteen_bit: false,
            },
            P010 | P016 => Self::SemiPlanar {
                v_first: false,
                sixteen_bit: true,
            },
            Imc2 => Self::SplitLine { v_first: true },
            Imc4 => Self::SplitLine { v_first: false },
            Rgba8888 | Y8 | Y16 | Jpeg | Invalid => return None,
        })
    }

    fn sample(&self, planes: &[PlaneView<'_>], x: usize, y: usize) -> [u8; 4] {
        let plane = |i: usize| planes.get(i).copied().unwrap_or_default();
        let luma = plane(0);
        match *self {
            Self::Packed {
                order,
                alpha,
                premultiplied,
            } => {
                let px = x * 4;
                let a = alpha.map_or(0xff, |i| luma.byte(px + i, y));
                let rgb = order.map(|i| luma.byte(px + i, y));
                if premultiplied {
                    with_alpha(rgb.map(|c| unpremultiply(c, a)), a)
                } else {
                    with_alpha(rgb, a)
                }
            }
            Self::Ayuv { premultiplied } => {
                let px = x * 4;
                let a = luma.byte(px, y);
                let rgb = yuv_to_rgb(luma.byte(px + 1, y), luma.byte(px + 2, y), luma.byte(px + 3, y));
                if premultiplied {
                    with_alpha(rgb.map(|c| unpremultiply(c, a)), a)
                } else {
                    with_alpha(rgb, a)
                }
            }
            Self::Packed422 { y: ys, u, v } => {
                let base = (x / 2) * 4;
                let luma_value = luma.byte(base + ys[x & 1], y);
                with_alpha(
                    yuv_to_rgb(luma_value, luma.byte(base + u, y), luma.byte(base + v, y)),
                    0xff,
                )
            }
            Self::Planar {
                u_plane,
                v_plane,
                half_height,
                ten_bit,
            } => {
                let row = if half_height { y / 2 } else { y };
                let (lv, uv, vv) = if ten_bit {
                    let ten = |p: PlaneView<'_>, offset, row| (p.word(offset, row) >> 2).min(255) as u8;
                    (
                        ten(luma, x * 2, y),
                        ten(plane(u_plane), (x / 2) * 2, row),
                        ten(plane(v_plane), (x / 2) * 2, row),
                    )
                } else {
                    (
                        luma.byte(x, y),
                        plane(u_plane).byte(x / 2, row),
                        plane(v_plane).byte(x / 2, row),
                    )
                };
                with_alpha(yuv_to_rgb(lv, uv, vv), 0xff)
            }
            Self::SemiPlanar { v_first, sixteen_bit } => {
                let chroma = plane(1);
                let row = y / 2;
                let (lv, first, second) = if sixteen_bit {
                    let base = (x / 2) * 4;
                    (
                        (luma.word(x * 2, y) >> 8) as u8,
                        (chroma.word(base, row) >> 8) as u8,
                        (chroma.word(base + 2, row) >> 8) as u8,
                    )
                } else {
                    let base = (x / 2) * 2;
                    (luma.byte(x, y), chroma.byte(base, row), chroma.byte(base + 1, row))
                };
                let (uv, vv) = if v_first { (second, first) } else { (first, second) };
                with_alpha(yuv_to_rgb(lv, uv, vv), 0xff)
            }
            Self::SplitLine { v_first } => {
                let chroma = plane(1);
                let row = y / 2;
                let left = chroma.byte(x / 2, row);
                let right = chroma.byte(chroma.stride / 2 + x / 2, row);
                let (uv, vv) = if v_first { (right, left) } else { (left, right) };
                with_alpha(yuv_to_rgb(luma.byte(x, y), uv, vv), 0xff)
            }
        }
    }
}

#[inline]
fn with_alpha([r, g, b]: [u8; 3], a: u8) -> [u8; 4] {
    [r, g, b, a]
}

#[inline]
fn unpremultiply(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8
}

/// BT.601 limited-range YUV to RGB.
#[inline]
pub(crate) fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |value: i32| value.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

/// Copy `height` rows of `row_bytes` out of a strided plane.
fn packed_rows(plane: PlaneView<'_>, row_bytes: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; row_bytes * height];
    for (row, dst) in out.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * plane.stride;
        if let Some(src) = plane.bytes.get(start..start + row_bytes) {
            dst.copy_from_slice(src);
        }
    }
    out
}

/// Snapshot the mapped `planes` of a `size` frame in `pixel_format`.
pub(crate) fn image_from_planes(
    pixel_format: PixelFormat,
    size: Size,
    planes: &[PlaneView<'_>],
) -> Result<DynamicImage> {
    if !size.is_valid() {
        return Err(FrameError::InvalidSize {
            width: size.width,
            height: size.height,
        });
    }
    let (width, height) = (size.width as u32, size.height as u32);
    let luma = planes.first().copied().unwrap_or_default();

    match (pixel_format, color_type_for_pixel_format(pixel_format)) {
        (PixelFormat::Rgba8888, Some(ColorType::Rgba8)) => {
            let bytes = packed_rows(luma, width as usize * 4, height as usize);
            return RgbaImage::from_raw(width, height, bytes)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| FrameError::UnsupportedPixelFormat(pixel_format.to_string()));
        }
        (_, Some(ColorType::L8)) => {
            let bytes = packed_rows(luma, width as usize, height as usize);
            return GrayImage::from_raw(width, height, bytes)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| FrameError::UnsupportedPixelFormat(pixel_format.to_string()));
        }
        (_, Some(ColorType::L16)) => {
            let bytes = packed_rows(luma, width as usize * 2, height as usize);
            let words = bytes
                .chunks_exact(2)
                .map(|w| u16::from_le_bytes([w[0], w[1]]))
                .collect();
            return ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, words)
                .map(DynamicImage::ImageLuma16)
                .ok_or_else(|| FrameError::UnsupportedPixelFormat(pixel_format.to_string()));
        }
        _ => {}
    }

    let Some(sampler) = Sampler::for_format(pixel_format) else {
        warn!(%pixel_format, "no conversion to an image");
        return Err(FrameError::UnsupportedPixelFormat(pixel_format.to_string()));
    };
    Ok(DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba(sampler.sample(planes, x as usize, y as usize))
    })))
}
