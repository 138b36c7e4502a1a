//! vidframe core - video frames over pluggable, mappable buffers
//!
//! This crate provides:
//! - Pixel formats, plane layouts and frame format descriptors
//! - The `VideoBuffer` capability with in-memory, image and texture variants
//! - `VideoFrame`, a cheap-to-copy frame sharing one buffer across copies
//! - Conversion between frames and `image::DynamicImage` surfaces

pub mod buffer;
pub mod convert;
pub mod error;
pub mod format;
pub mod frame;

pub use buffer::{
    HandleType, ImageVideoBuffer, MapData, MapMode, MappedPlane, MemoryVideoBuffer, SharedBytes,
    TextureContext, TextureVideoBuffer, VideoBuffer,
};
pub use error::{FrameError, Result};
pub use format::{FrameFormat, PixelFormat, Rotation, Size};
pub use frame::{BufferRef, VideoFrame};

/// Layout constants shared by allocation and plane splitting
pub mod layout {
    /// Row alignment, in bytes, of freshly allocated planes
    pub const STRIDE_ALIGNMENT: usize = 16;

    /// Maximum number of planes a mapping can expose
    pub const MAX_PLANES: usize = 4;

    /// Timestamp value meaning "not set"
    pub const UNSET_TIME: i64 = -1;
}
