//! Pixel formats and frame format descriptors.
//!
//! Every pixel format has exactly one plane layout. The layout decides how
//! much memory a freshly allocated frame needs and how a single contiguous
//! mapping is split into planes.

use crate::layout::{MAX_PLANES, STRIDE_ALIGNMENT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel format enumeration.
///
/// Packed RGB names list the channels in memory byte order, so `Bgra8888`
/// stores blue first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    Invalid,
    Argb8888,
    Argb8888Premultiplied,
    Xrgb8888,
    Bgra8888,
    Bgra8888Premultiplied,
    Bgrx8888,
    Abgr8888,
    Xbgr8888,
    Rgba8888,
    Rgbx8888,
    /// Packed A, Y, U, V bytes
    Ayuv,
    AyuvPremultiplied,
    /// YUV 4:2:0 planar
    Yuv420p,
    /// YUV 4:2:2 planar
    Yuv422p,
    /// YUV 4:2:0 planar with V before U
    Yv12,
    /// Packed 4:2:2, U Y V Y
    Uyvy,
    /// Packed 4:2:2, Y U Y V
    Yuyv,
    /// Y plane followed by interleaved UV
    Nv12,
    /// Y plane followed by interleaved VU
    Nv21,
    /// 4:2:0 with V then U planes padded to the luma stride
    Imc1,
    /// 4:2:0 with V and U halves sharing each chroma line
    Imc2,
    /// 4:2:0 with U then V planes padded to the luma stride
    Imc3,
    /// 4:2:0 with U and V halves sharing each chroma line
    Imc4,
    Y8,
    Y16,
    /// 10-bit samples in the high bits of 16-bit words, semi-planar
    P010,
    /// 16-bit samples, semi-planar
    P016,
    /// 10-bit samples in the low bits of 16-bit words, planar
    Yuv420p10,
    Jpeg,
}

/// How the planes of a pixel format are arranged in one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaneLayout {
    /// One plane of `stride * height` bytes.
    Packed,
    /// Three planes; chroma stride is half the luma stride.
    /// `half_height` is false for 4:2:2.
    Planar { half_height: bool },
    /// Two planes; the second is interleaved chroma at the luma stride.
    SemiPlanar,
    /// Three planes; chroma planes keep the luma stride.
    PaddedPlanar,
}

impl PixelFormat {
    /// Every pixel format, `Invalid` last.
    pub const ALL: [PixelFormat; 30] = [
        Self::Argb8888,
        Self::Argb8888Premultiplied,
        Self::Xrgb8888,
        Self::Bgra8888,
        Self::Bgra8888Premultiplied,
        Self::Bgrx8888,
        Self::Abgr8888,
        Self::Xbgr8888,
        Self::Rgba8888,
        Self::Rgbx8888,
        Self::Ayuv,
        Self::AyuvPremultiplied,
        Self::Yuv420p,
        Self::Yuv422p,
        Self::Yv12,
        Self::Uyvy,
        Self::Yuyv,
        Self::Nv12,
        Self::Nv21,
        Self::Imc1,
        Self::Imc2,
        Self::Imc3,
        Self::Imc4,
        Self::Y8,
        Self::Y16,
        Self::P010,
        Self::P016,
        Self::Yuv420p10,
        Self::Jpeg,
        Self::Invalid,
    ];

    /// Bytes per pixel in the first plane.
    pub fn stride_factor(self) -> usize {
        match self {
            Self::Invalid => 0,
            Self::Argb8888
            | Self::Argb8888Premultiplied
            | Self::Xrgb8888
            | Self::Bgra8888
            | Self::Bgra8888Premultiplied
            | Self::Bgrx8888
            | Self::Abgr8888
            | Self::Xbgr8888
            | Self::Rgba8888
            | Self::Rgbx8888
            | Self::Ayuv
            | Self::AyuvPremultiplied
            | Self::Jpeg => 4,
            Self::Uyvy | Self::Yuyv | Self::Y16 | Self::P010 | Self::P016 | Self::Yuv420p10 => 2,
            Self::Yuv420p
            | Self::Yuv422p
            | Self::Yv12
            | Self::Nv12
            | Self::Nv21
            | Self::Imc1
            | Self::Imc2
            | Self::Imc3
            | Self::Imc4
            | Self::Y8 => 1,
        }
    }

    pub(crate) fn layout(self) -> PlaneLayout {
        match self {
            Self::Yuv420p | Self::Yv12 | Self::Yuv420p10 => PlaneLayout::Planar { half_height: true },
            Self::Yuv422p => PlaneLayout::Planar { half_height: false },
            Self::Nv12 | Self::Nv21 | Self::Imc2 | Self::Imc4 | Self::P010 | Self::P016 => {
                PlaneLayout::SemiPlanar
            }
            Self::Imc1 | Self::Imc3 => PlaneLayout::PaddedPlanar,
            _ => PlaneLayout::Packed,
        }
    }

    /// Number of planes for this format.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Invalid => 0,
            _ => match self.layout() {
                PlaneLayout::Packed => 1,
                PlaneLayout::SemiPlanar => 2,
                PlaneLayout::Planar { .. } | PlaneLayout::PaddedPlanar => 3,
            },
        }
    }

    /// Whether the format carries a YUV color model.
    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            Self::Ayuv
                | Self::AyuvPremultiplied
                | Self::Yuv420p
                | Self::Yuv422p
                | Self::Yv12
                | Self::Uyvy
                | Self::Yuyv
                | Self::Nv12
                | Self::Nv21
                | Self::Imc1
                | Self::Imc2
                | Self::Imc3
                | Self::Imc4
                | Self::P010
                | Self::P016
                | Self::Yuv420p10
        )
    }

    /// Whether the pixel data is compressed and cannot be addressed per pixel.
    pub fn is_compressed(self) -> bool {
        self == Self::Jpeg
    }

    /// Luma (first plane) stride for a frame of the given width.
    pub fn stride_for_width(self, width: usize) -> usize {
        align_up(width * self.stride_factor(), STRIDE_ALIGNMENT)
    }

    /// Per-plane `(bytes_per_line, bytes)` for a freshly allocated frame.
    pub(crate) fn plane_sizes(self, width: usize, height: usize) -> [(usize, usize); MAX_PLANES] {
        let stride = self.stride_for_width(width);
        let luma = stride * height;
        let chroma_rows = height.div_ceil(2);
        let mut planes = [(0, 0); MAX_PLANES];
        match self.layout() {
            PlaneLayout::Packed => {
                planes[0] = (stride, luma);
            }
            PlaneLayout::Planar { half_height } => {
                let rows = if half_height { chroma_rows } else { height };
                let chroma_stride = stride / 2;
                planes[0] = (stride, luma);
                planes[1] = (chroma_stride, chroma_stride * rows);
                planes[2] = (chroma_stride, chroma_stride * rows);
            }
            PlaneLayout::SemiPlanar => {
                planes[0] = (stride, luma);
                planes[1] = (stride, stride * chroma_rows);
            }
            PlaneLayout::PaddedPlanar => {
                planes[0] = (stride, luma);
                planes[1] = (stride, stride * chroma_rows);
                planes[2] = (stride, stride * chroma_rows);
            }
        }
        planes
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[inline]
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Pixel dimensions of a frame.
///
/// Dimensions are signed so that an unset size (`-1 x -1`) and degenerate
/// requests can be reported back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Unset size.
    pub const INVALID: Self = Self::new(-1, -1);

    /// Both dimensions are positive.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Clockwise display rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    /// Rotation angle in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 90,
            Self::Clockwise180 => 180,
            Self::Clockwise270 => 270,
        }
    }

    /// Rotation from an angle in degrees, normalized modulo 360.
    /// Returns `None` for angles that are not a multiple of 90.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::None),
            90 => Some(Self::Clockwise90),
            180 => Some(Self::Clockwise180),
            270 => Some(Self::Clockwise270),
            _ => None,
        }
    }
}

/// Describes the layout and presentation of the frames of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameFormat {
    pub size: Size,
    pub pixel_format: PixelFormat,
    /// Mirror horizontally before presenting
    #[serde(default)]
    pub mirrored: bool,
    #[serde(default)]
    pub rotation: Rotation,
    /// Frames per second of the originating stream, 0 when unknown
    #[serde(default)]
    pub stream_frame_rate: f64,
}

impl FrameFormat {
    /// Create a format with the given size and pixel format.
    pub fn new(size: Size, pixel_format: PixelFormat) -> Self {
        Self {
            size,
            pixel_format,
            ..Default::default()
        }
    }

    pub fn with_mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_stream_frame_rate(mut self, rate: f64) -> Self {
        self.stream_frame_rate = rate;
        self
    }

    /// A format is valid when its size is valid and its pixel format is known.
    pub fn is_valid(&self) -> bool {
        self.size.is_valid() && self.pixel_format != PixelFormat::Invalid
    }

    pub fn plane_count(&self) -> usize {
        self.pixel_format.plane_count()
    }

    /// Bytes per line of `plane` in a freshly allocated frame, 0 when the
    /// format is invalid or the plane does not exist.
    pub fn bytes_per_line(&self, plane: usize) -> usize {
        if !self.is_valid() || plane >= self.plane_count() {
            return 0;
        }
        self.pixel_format.plane_sizes(self.size.width as usize, self.size.height as usize)[plane].0
    }

    /// Total bytes needed to allocate one frame of this format.
    pub fn frame_size_bytes(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        self.pixel_format
            .plane_sizes(self.size.width as usize, self.size.height as usize)
            .iter()
            .map(|(_, bytes)| bytes)
            .sum()
    }
}
