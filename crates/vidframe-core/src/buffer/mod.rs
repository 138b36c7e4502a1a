//! Pluggable pixel buffers with explicit map/unmap access.
//!
//! A buffer exposes its memory only while it is mapped. Mapping follows one
//! compatibility rule for every buffer variant:
//!
//! - a fresh map in any real mode is only allowed from `NotMapped`
//! - a `ReadOnly` map of a `ReadOnly` buffer nests and returns the same planes
//! - everything else is rejected and leaves the buffer untouched

mod image;
mod memory;
mod texture;

pub use self::image::ImageVideoBuffer;
pub use memory::{MemoryVideoBuffer, SharedBytes};
pub use texture::{TextureContext, TextureVideoBuffer};

use crate::error::{FrameError, Result};
use crate::format::{FrameFormat, PlaneLayout};
use crate::layout::MAX_PLANES;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ptr::NonNull;
use tracing::trace;

/// Access intent under which buffer memory is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MapMode {
    #[default]
    NotMapped,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl MapMode {
    #[inline]
    pub fn is_readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Kind of resource backing a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HandleType {
    /// CPU addressable memory
    #[default]
    NoHandle,
    /// Opaque texture owned by a rendering backend
    RhiTexture,
}

/// Outcome of checking a map request against the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapTransition {
    /// The buffer is unmapped; map it for real.
    Fresh,
    /// Read-only on read-only; reuse the existing mapping.
    Nested,
}

/// Check whether a buffer currently in `current` may be mapped as `requested`.
pub fn check_transition(current: MapMode, requested: MapMode) -> Result<MapTransition> {
    match (current, requested) {
        (_, MapMode::NotMapped) => Err(FrameError::NotMappedRequested),
        (MapMode::NotMapped, _) => Ok(MapTransition::Fresh),
        (MapMode::ReadOnly, MapMode::ReadOnly) => Ok(MapTransition::Nested),
        (current, requested) => Err(FrameError::MapConflict { current, requested }),
    }
}

/// One mapped plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedPlane {
    data: NonNull<u8>,
    bytes_per_line: usize,
    size: usize,
}

impl MappedPlane {
    pub fn new(data: NonNull<u8>, bytes_per_line: usize, size: usize) -> Self {
        Self {
            data,
            bytes_per_line,
            size,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    #[inline]
    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Plane starting `offset` bytes into this one.
    fn sub_plane(&self, offset: usize, bytes_per_line: usize, size: usize) -> Option<Self> {
        if offset.checked_add(size)? > self.size {
            return None;
        }
        let data = NonNull::new(self.data.as_ptr().wrapping_add(offset))?;
        Some(Self::new(data, bytes_per_line, size))
    }
}

/// Planes exposed by a successful map. Empty on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapData {
    planes: SmallVec<[MappedPlane; MAX_PLANES]>,
}

// SAFETY: MapData only carries addresses. Dereferencing them is gated by the
// `VideoBuffer` contract and the map mode, not by the thread holding them.
unsafe impl Send for MapData {}
unsafe impl Sync for MapData {}

impl MapData {
    /// Map result with no planes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single plane over `bytes`, laid out with `bytes_per_line`.
    ///
    /// Returns an empty result for zero-length storage.
    pub fn from_bytes(bytes: &[u8], bytes_per_line: usize) -> Self {
        match NonNull::new(bytes.as_ptr() as *mut u8) {
            Some(data) if !bytes.is_empty() => {
                Self::empty().with_plane(MappedPlane::new(data, bytes_per_line, bytes.len()))
            }
            _ => Self::empty(),
        }
    }

    /// Writable single plane over `bytes`.
    pub fn from_bytes_mut(bytes: &mut [u8], bytes_per_line: usize) -> Self {
        match NonNull::new(bytes.as_mut_ptr()) {
            Some(data) if !bytes.is_empty() => {
                Self::empty().with_plane(MappedPlane::new(data, bytes_per_line, bytes.len()))
            }
            _ => Self::empty(),
        }
    }

    /// Append a plane. Planes beyond the fourth are ignored.
    pub fn with_plane(mut self, plane: MappedPlane) -> Self {
        if self.planes.len() < MAX_PLANES {
            self.planes.push(plane);
        }
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    #[inline]
    pub fn plane(&self, plane: usize) -> Option<&MappedPlane> {
        self.planes.get(plane)
    }

    /// Address of `plane`, or `None` when out of range.
    pub fn data_ptr(&self, plane: usize) -> Option<*const u8> {
        self.plane(plane).map(MappedPlane::as_ptr)
    }

    pub fn bytes_per_line(&self, plane: usize) -> usize {
        self.plane(plane).map_or(0, MappedPlane::bytes_per_line)
    }

    pub fn size(&self, plane: usize) -> usize {
        self.plane(plane).map_or(0, MappedPlane::size)
    }

    /// Borrow the bytes of `plane`.
    ///
    /// # Safety
    ///
    /// The buffer that produced this `MapData` must still be mapped and alive
    /// for the whole borrow, and nobody may write to the plane meanwhile.
    pub unsafe fn plane_bytes(&self, plane: usize) -> Option<&[u8]> {
        let plane = self.plane(plane)?;
        // SAFETY: upheld by the caller together with the VideoBuffer contract.
        Some(unsafe { std::slice::from_raw_parts(plane.as_ptr(), plane.size()) })
    }

    /// Mutably borrow the bytes of `plane`.
    ///
    /// # Safety
    ///
    /// As for [`MapData::plane_bytes`], and the mapping must be writable with
    /// no other borrow of the plane alive.
    pub(crate) unsafe fn plane_bytes_mut(&mut self, plane: usize) -> Option<&mut [u8]> {
        let plane = self.plane(plane)?;
        // SAFETY: upheld by the caller together with the VideoBuffer contract.
        Some(unsafe { std::slice::from_raw_parts_mut(plane.data.as_ptr(), plane.size()) })
    }

    /// Split a single mapped plane into the planes `format` expects.
    ///
    /// Buffers usually hand out one contiguous region; multi-plane formats
    /// are carved out of it by their layout. Anything that does not fit is
    /// returned unchanged.
    pub fn split_for(self, format: &FrameFormat) -> Self {
        if self.plane_count() != 1 || format.plane_count() <= 1 || !format.size.is_valid() {
            return self;
        }
        let whole = self.planes[0];
        let height = format.size.height as usize;
        let stride = whole.bytes_per_line();
        let luma = stride * height;
        if luma > whole.size() {
            return self;
        }
        let rest = whole.size() - luma;

        let carve = |regions: &[(usize, usize, usize)]| -> Option<Self> {
            let mut data = Self::empty();
            for &(offset, bytes_per_line, size) in regions {
                data = data.with_plane(whole.sub_plane(offset, bytes_per_line, size)?);
            }
            Some(data)
        };

        let planes = match format.pixel_format.layout() {
            PlaneLayout::Packed => return self,
            PlaneLayout::Planar { half_height } => {
                let rows = if half_height { height.div_ceil(2) } else { height };
                // Derive the chroma stride from what is left so unaligned
                // producer strides still line up.
                let chroma_stride = rest / rows / 2;
                let chroma = chroma_stride * rows;
                carve(&[
                    (0, stride, luma),
                    (luma, chroma_stride, chroma),
                    (luma + chroma, chroma_stride, chroma),
                ])
            }
            PlaneLayout::SemiPlanar => carve(&[(0, stride, luma), (luma, stride, rest)]),
            PlaneLayout::PaddedPlanar => {
                let chroma = stride * height.div_ceil(2);
                carve(&[
                    (0, stride, luma),
                    (luma, stride, chroma),
                    (luma + chroma, stride, chroma),
                ])
            }
        };

        planes.unwrap_or(self)
    }
}

/// Map bookkeeping shared by the buffer implementations.
///
/// Holds the current mode, the read nesting depth and the planes handed out
/// by the fresh map so nested read maps return the same addresses.
#[derive(Debug, Default)]
pub struct MapState {
    mode: MapMode,
    depth: usize,
    data: MapData,
}

impl MapState {
    #[inline]
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Apply a map request. `map_fresh` is only called for a fresh map and
    /// may return an empty result to refuse it.
    pub fn map_with(&mut self, mode: MapMode, map_fresh: impl FnOnce(MapMode) -> MapData) -> MapData {
        match check_transition(self.mode, mode) {
            Ok(MapTransition::Nested) => {
                self.depth += 1;
                trace!(depth = self.depth, "nested read-only map");
                self.data.clone()
            }
            Ok(MapTransition::Fresh) => {
                let data = map_fresh(mode);
                if !data.is_empty() {
                    self.mode = mode;
                    self.depth = 1;
                    self.data = data.clone();
                }
                data
            }
            Err(e) => {
                trace!(error = %e, "map rejected");
                MapData::empty()
            }
        }
    }

    /// Pop one map level. Returns `true` when the buffer is now unmapped
    /// and was mapped before the call.
    pub fn unmap(&mut self) -> bool {
        match self.depth {
            0 => false,
            1 => {
                self.depth = 0;
                self.mode = MapMode::NotMapped;
                self.data = MapData::empty();
                true
            }
            _ => {
                self.depth -= 1;
                trace!(depth = self.depth, "nested unmap");
                false
            }
        }
    }
}

/// A region of pixel memory with map-mode-gated access.
///
/// # Safety
///
/// Every plane of a non-empty [`MapData`] returned by [`VideoBuffer::map`]
/// must address `size` initialized bytes that stay valid, and do not move,
/// until the buffer is back in `NotMapped` or dropped. A writable mapping
/// must not alias memory reachable through any other live reference.
pub unsafe trait VideoBuffer: Send {
    /// Resource kind backing this buffer.
    fn handle_type(&self) -> HandleType {
        HandleType::NoHandle
    }

    fn map_mode(&self) -> MapMode;

    /// Expose the planes in `mode`. Returns an empty result when refused.
    fn map(&mut self, mode: MapMode) -> MapData;

    /// Release one map level. Unmapping an unmapped buffer does nothing.
    fn unmap(&mut self);

    /// Native texture handle for `plane`, 0 when there is none.
    fn texture_handle(&self, _context: Option<&dyn TextureContext>, _plane: usize) -> u64 {
        0
    }
}
