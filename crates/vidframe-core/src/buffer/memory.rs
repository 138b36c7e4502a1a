//! Buffer over a shared, reference-counted byte array.

use super::{MapData, MapMode, MapState, VideoBuffer};
use std::sync::Arc;
use tracing::debug;

/// Reference-counted byte storage. Cloning shares the bytes.
pub type SharedBytes = Arc<Vec<u8>>;

/// Single-plane buffer over [`SharedBytes`].
///
/// Read-only maps expose the shared bytes directly. A writable map first
/// detaches from every other holder of the storage, so bytes handed out
/// through [`MemoryVideoBuffer::underlying_byte_array`] never change.
#[derive(Debug)]
pub struct MemoryVideoBuffer {
    data: SharedBytes,
    bytes_per_line: usize,
    state: MapState,
}

impl MemoryVideoBuffer {
    pub fn new(data: impl Into<SharedBytes>, bytes_per_line: usize) -> Self {
        Self {
            data: data.into(),
            bytes_per_line,
            state: MapState::default(),
        }
    }

    /// Buffer of `len` zero bytes.
    pub fn zeroed(len: usize, bytes_per_line: usize) -> Self {
        Self::new(vec![0u8; len], bytes_per_line)
    }

    #[inline]
    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shared handle to the storage of `plane`.
    ///
    /// Only plane 0 exists. Returns `None` while the buffer is mapped for
    /// writing, since the bytes may be changing under the mapping.
    pub fn underlying_byte_array(&self, plane: usize) -> Option<SharedBytes> {
        if plane != 0 || self.state.mode().is_writable() {
            return None;
        }
        Some(Arc::clone(&self.data))
    }
}

// SAFETY: mapped planes point into `data`, which is neither reallocated nor
// replaced while the state is mapped. Writable maps come from `make_mut`, so
// no other `SharedBytes` aliases them, and `underlying_byte_array` refuses to
// hand out a new alias until the buffer is unmapped.
unsafe impl VideoBuffer for MemoryVideoBuffer {
    fn map_mode(&self) -> MapMode {
        self.state.mode()
    }

    fn map(&mut self, mode: MapMode) -> MapData {
        let Self {
            data,
            bytes_per_line,
            state,
        } = self;
        state.map_with(mode, |mode| {
            if data.is_empty() {
                debug!("refusing to map empty storage");
                return MapData::empty();
            }
            if mode.is_writable() {
                if Arc::strong_count(data) > 1 {
                    debug!(bytes = data.len(), "detaching shared storage for write map");
                }
                MapData::from_bytes_mut(Arc::make_mut(data).as_mut_slice(), *bytes_per_line)
            } else {
                MapData::from_bytes(data, *bytes_per_line)
            }
        })
    }

    fn unmap(&mut self) {
        self.state.unmap();
    }
}
