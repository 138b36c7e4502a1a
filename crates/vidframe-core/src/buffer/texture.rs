//! Opaque buffers living in a rendering backend.

use super::{HandleType, MapData, MapMode, VideoBuffer};
use tracing::trace;

/// Resolves backend texture keys to native handles.
///
/// Implemented by the rendering backend that owns the textures.
pub trait TextureContext {
    /// Native handle of `plane` of the texture registered under `key`.
    fn native_handle(&self, key: u64, plane: usize) -> Option<u64>;
}

/// Buffer whose pixels are not CPU addressable.
///
/// Mapping always fails. The only way at the pixels is the native handle
/// returned by [`VideoBuffer::texture_handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureVideoBuffer {
    handle_type: HandleType,
    key: u64,
    plane_count: usize,
}

impl TextureVideoBuffer {
    pub fn new(handle_type: HandleType, key: u64, plane_count: usize) -> Self {
        Self {
            handle_type,
            key,
            plane_count,
        }
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.plane_count
    }
}

// SAFETY: never hands out a mapping.
unsafe impl VideoBuffer for TextureVideoBuffer {
    fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    fn map_mode(&self) -> MapMode {
        MapMode::NotMapped
    }

    fn map(&mut self, mode: MapMode) -> MapData {
        trace!(key = self.key, ?mode, "texture buffers cannot be mapped");
        MapData::empty()
    }

    fn unmap(&mut self) {}

    fn texture_handle(&self, context: Option<&dyn TextureContext>, plane: usize) -> u64 {
        if plane >= self.plane_count {
            return 0;
        }
        context
            .and_then(|ctx| ctx.native_handle(self.key, plane))
            .unwrap_or(0)
    }
}
