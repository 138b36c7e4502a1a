//! Error types for vidframe.

use crate::buffer::MapMode;
use thiserror::Error;

/// Main error type for frame and buffer operations.
///
/// The sentinel-returning APIs (`VideoFrame::map`, `VideoFrame::from_image`,
/// `VideoFrame::to_image`) are thin wrappers over the `try_*` variants that
/// surface one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("image is null")]
    NullImage,

    #[error("image has an empty area: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("frame has no buffer")]
    NoBuffer,

    #[error("image too large for a frame: {width}x{height}")]
    ImageTooLarge { width: u32, height: u32 },

    #[error("invalid frame size: {width}x{height}")]
    InvalidSize { width: i32, height: i32 },

    #[error("cannot map in NotMapped mode")]
    NotMappedRequested,

    #[error("buffer mapped as {current:?}, cannot map as {requested:?}")]
    MapConflict { current: MapMode, requested: MapMode },

    #[error("buffer refused mapping as {0:?}")]
    MapRefused(MapMode),

    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),
}

/// Result type alias for vidframe operations.
pub type Result<T> = std::result::Result<T, FrameError>;
