//! Video frames: a shared buffer plus frame-local metadata.
//!
//! Copies of a frame share one buffer through an `Arc`. Everything else,
//! timestamps and presentation hints included, belongs to the copy. A map
//! made through one copy is only visible through that copy: the others see
//! the buffer's mode but cannot read its planes or undo its map levels.

use crate::buffer::{
    check_transition, HandleType, MapData, MapMode, MemoryVideoBuffer, TextureContext, VideoBuffer,
};
use crate::convert::{self, PlaneView};
use crate::error::{FrameError, Result};
use crate::format::{FrameFormat, PixelFormat, Rotation, Size};
use crate::layout::UNSET_TIME;
use image::DynamicImage;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

type SharedBuffer = Arc<Mutex<Box<dyn VideoBuffer>>>;

/// Map levels held by one frame.
#[derive(Debug, Default)]
struct FrameMapping {
    mode: MapMode,
    depth: usize,
    data: MapData,
}

/// A video frame.
///
/// A frame without a buffer is a null frame: it reports its format but
/// every map fails. Cloning is cheap and shares the buffer; the clone starts
/// out without any map levels of its own.
pub struct VideoFrame {
    buffer: Option<SharedBuffer>,
    format: FrameFormat,
    start_time: i64,
    end_time: i64,
    mapping: FrameMapping,
}

impl VideoFrame {
    /// Null frame.
    pub fn new() -> Self {
        Self::with_shared(None, FrameFormat::default())
    }

    fn with_shared(buffer: Option<SharedBuffer>, format: FrameFormat) -> Self {
        Self {
            buffer,
            format,
            start_time: UNSET_TIME,
            end_time: UNSET_TIME,
            mapping: FrameMapping::default(),
        }
    }

    /// Frame over `buffer`, laid out as `format`.
    pub fn from_buffer(buffer: impl VideoBuffer + 'static, format: FrameFormat) -> Self {
        Self::from_boxed(Some(Box::new(buffer)), format)
    }

    /// Frame over an optional boxed buffer. `None` gives a null frame that
    /// still reports `format`.
    pub fn from_boxed(buffer: Option<Box<dyn VideoBuffer>>, format: FrameFormat) -> Self {
        Self::with_shared(buffer.map(|b| Arc::new(Mutex::new(b))), format)
    }

    /// Allocate a zero-filled frame for `format`.
    ///
    /// Formats with an invalid size or no pixel layout allocate nothing and
    /// give a frame that is not valid.
    pub fn from_format(format: FrameFormat) -> Self {
        let bytes = format.frame_size_bytes();
        if bytes == 0 {
            debug!(size = %format.size, pixel_format = %format.pixel_format, "no allocation for format");
            return Self::with_shared(None, format);
        }
        let bytes_per_line = format.bytes_per_line(0);
        debug!(bytes, bytes_per_line, pixel_format = %format.pixel_format, "allocating frame");
        Self::from_buffer(MemoryVideoBuffer::zeroed(bytes, bytes_per_line), format)
    }

    /// Frame holding a copy of `image`, or a null frame when the image is
    /// rejected.
    pub fn from_image(image: &DynamicImage) -> Self {
        Self::try_from_image(image).unwrap_or_default()
    }

    pub fn try_from_image(image: &DynamicImage) -> Result<Self> {
        let (buffer, format) = convert::buffer_for_image(image)?;
        Ok(Self::from_boxed(Some(buffer), format))
    }

    /// Holds a buffer and has a valid size.
    pub fn is_valid(&self) -> bool {
        self.buffer.is_some() && self.format.size.is_valid()
    }

    /// Whether both frames reference the same buffer.
    pub fn shares_buffer_with(&self, other: &VideoFrame) -> bool {
        match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    // ── Mapping ─────────────────────────────────────────────────

    /// Map the buffer in `mode`. Returns `false` when the map is refused.
    pub fn map(&mut self, mode: MapMode) -> bool {
        self.try_map(mode).is_ok()
    }

    pub fn try_map(&mut self, mode: MapMode) -> Result<()> {
        let buffer = self.buffer.as_ref().ok_or(FrameError::NoBuffer)?;
        let data = {
            let mut buffer = buffer.lock();
            let current = buffer.map_mode();
            check_transition(current, mode)?;
            let data = buffer.map(mode);
            if data.is_empty() {
                debug!(?mode, "buffer refused map");
                return Err(FrameError::MapRefused(mode));
            }
            if current == MapMode::NotMapped {
                debug!(?mode, planes = data.plane_count(), "mapped frame");
            }
            data
        };

        if self.mapping.depth == 0 {
            self.mapping.mode = mode;
            self.mapping.data = data.split_for(&self.format);
        }
        self.mapping.depth += 1;
        trace!(depth = self.mapping.depth, "frame map level");
        Ok(())
    }

    /// Release one map level taken through this frame. Does nothing when
    /// this frame holds none.
    pub fn unmap(&mut self) {
        if self.mapping.depth == 0 {
            return;
        }
        if let Some(buffer) = &self.buffer {
            buffer.lock().unmap();
        }
        self.mapping.depth -= 1;
        trace!(depth = self.mapping.depth, "frame unmap level");
        if self.mapping.depth == 0 {
            self.mapping = FrameMapping::default();
        }
    }

    /// Current mode of the shared buffer.
    pub fn map_mode(&self) -> MapMode {
        self.buffer
            .as_ref()
            .map_or(MapMode::NotMapped, |buffer| buffer.lock().map_mode())
    }

    pub fn is_mapped(&self) -> bool {
        self.map_mode() != MapMode::NotMapped
    }

    pub fn is_readable(&self) -> bool {
        self.map_mode().is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.map_mode().is_writable()
    }

    /// Bytes of `plane` mapped through this frame.
    pub fn bits(&self, plane: usize) -> Option<&[u8]> {
        if self.mapping.depth == 0 {
            return None;
        }
        // SAFETY: this frame holds a map level, so the buffer stays mapped
        // and alive for as long as `self` is borrowed. A writable mapping is
        // only reachable through `bits_mut`, which needs `&mut self`.
        unsafe { self.mapping.data.plane_bytes(plane) }
    }

    /// Writable bytes of `plane`. `None` unless this frame mapped the
    /// buffer in a writable mode.
    pub fn bits_mut(&mut self, plane: usize) -> Option<&mut [u8]> {
        if self.mapping.depth == 0 || !self.mapping.mode.is_writable() {
            return None;
        }
        // SAFETY: a writable map cannot nest, so this frame is the only
        // holder of the mapping and the exclusive borrow of `self` rules out
        // any other slice into it.
        unsafe { self.mapping.data.plane_bytes_mut(plane) }
    }

    /// Bytes per line of mapped `plane`, 0 when not mapped through this frame.
    pub fn bytes_per_line(&self, plane: usize) -> usize {
        self.mapping.data.bytes_per_line(plane)
    }

    /// Size in bytes of mapped `plane`, 0 when not mapped through this frame.
    pub fn mapped_bytes(&self, plane: usize) -> usize {
        self.mapping.data.size(plane)
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn plane_count(&self) -> usize {
        self.format.plane_count()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format.pixel_format
    }

    pub fn size(&self) -> Size {
        self.format.size
    }

    pub fn width(&self) -> i32 {
        self.format.size.width
    }

    pub fn height(&self) -> i32 {
        self.format.size.height
    }

    pub fn handle_type(&self) -> HandleType {
        self.buffer
            .as_ref()
            .map_or(HandleType::NoHandle, |buffer| buffer.lock().handle_type())
    }

    /// Inspection access to the buffer, `None` for a null frame.
    pub fn video_buffer(&self) -> Option<BufferRef<'_>> {
        self.buffer.as_ref().map(|buffer| BufferRef { buffer })
    }

    /// Format of this frame including its presentation overrides.
    pub fn surface_format(&self) -> FrameFormat {
        self.format
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn set_start_time(&mut self, time: i64) {
        self.start_time = time;
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn set_end_time(&mut self, time: i64) {
        self.end_time = time;
    }

    pub fn mirrored(&self) -> bool {
        self.format.mirrored
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.format.mirrored = mirrored;
    }

    pub fn rotation(&self) -> Rotation {
        self.format.rotation
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.format.rotation = rotation;
    }

    pub fn stream_frame_rate(&self) -> f64 {
        self.format.stream_frame_rate
    }

    pub fn set_stream_frame_rate(&mut self, rate: f64) {
        self.format.stream_frame_rate = rate;
    }

    // ── Images ──────────────────────────────────────────────────

    /// Snapshot of the frame as an image, `None` when it cannot be converted.
    pub fn to_image(&self) -> Option<DynamicImage> {
        self.try_to_image().ok()
    }

    /// Snapshot of the frame as an image.
    ///
    /// Reuses this frame's mapping when it is readable, otherwise maps a
    /// temporary copy read-only. The mapping state seen by other copies is
    /// the same afterwards.
    pub fn try_to_image(&self) -> Result<DynamicImage> {
        if self.buffer.is_none() {
            return Err(FrameError::NoBuffer);
        }
        let size = self.format.size;
        if !size.is_valid() {
            return Err(FrameError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }
        let pixel_format = self.format.pixel_format;
        if pixel_format.is_compressed() || pixel_format == PixelFormat::Invalid {
            return Err(FrameError::UnsupportedPixelFormat(pixel_format.to_string()));
        }

        let snapshot = |frame: &VideoFrame| {
            let planes: Vec<PlaneView<'_>> = (0..frame.mapping.data.plane_count())
                .filter_map(|plane| {
                    let bytes = frame.bits(plane)?;
                    Some(PlaneView {
                        bytes,
                        stride: frame.bytes_per_line(plane),
                    })
                })
                .collect();
            convert::image_from_planes(pixel_format, size, &planes)
        };

        if self.mapping.depth > 0 && self.mapping.mode.is_readable() {
            return snapshot(self);
        }
        let mut temporary = self.clone();
        temporary.try_map(MapMode::ReadOnly)?;
        snapshot(&temporary)
    }
}

impl Default for VideoFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for VideoFrame {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            format: self.format,
            start_time: self.start_time,
            end_time: self.end_time,
            mapping: FrameMapping::default(),
        }
    }
}

impl Drop for VideoFrame {
    fn drop(&mut self) {
        while self.mapping.depth > 0 {
            self.unmap();
        }
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("format", &self.format)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("has_buffer", &self.buffer.is_some())
            .field("map_depth", &self.mapping.depth)
            .finish()
    }
}

/// Read-only view of a frame's buffer.
///
/// Each call takes the buffer lock briefly. Mapping goes through the frame.
#[derive(Clone, Copy)]
pub struct BufferRef<'a> {
    buffer: &'a SharedBuffer,
}

impl BufferRef<'_> {
    pub fn handle_type(&self) -> HandleType {
        self.buffer.lock().handle_type()
    }

    pub fn map_mode(&self) -> MapMode {
        self.buffer.lock().map_mode()
    }

    /// Native texture handle of `plane`, 0 for CPU buffers.
    pub fn texture_handle(&self, context: Option<&dyn TextureContext>, plane: usize) -> u64 {
        self.buffer.lock().texture_handle(context, plane)
    }

    /// Number of frames sharing the buffer.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(self.buffer)
    }
}

impl fmt::Debug for BufferRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRef")
            .field("handle_type", &self.handle_type())
            .field("map_mode", &self.map_mode())
            .finish()
    }
}
