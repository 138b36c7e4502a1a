//! Buffer over a decoded [`DynamicImage`].

use super::{MapData, MapMode, MapState, VideoBuffer};
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

/// Single-plane buffer backed by an image surface.
///
/// The image is shared with whoever handed it over until the first writable
/// map, which detaches a private copy.
#[derive(Debug)]
pub struct ImageVideoBuffer {
    image: Arc<DynamicImage>,
    state: MapState,
}

impl ImageVideoBuffer {
    pub fn new(image: impl Into<Arc<DynamicImage>>) -> Self {
        Self {
            image: image.into(),
            state: MapState::default(),
        }
    }

    /// The wrapped image.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Tightly packed row length of the image.
    pub fn bytes_per_line(&self) -> usize {
        self.image.width() as usize * usize::from(self.image.color().bytes_per_pixel())
    }
}

/// Mutable view of the raw sample bytes of `image`.
fn image_bytes_mut(image: &mut DynamicImage) -> Option<&mut [u8]> {
    match image {
        DynamicImage::ImageLuma8(buf) => Some(&mut **buf),
        DynamicImage::ImageLumaA8(buf) => Some(&mut **buf),
        DynamicImage::ImageRgb8(buf) => Some(&mut **buf),
        DynamicImage::ImageRgba8(buf) => Some(&mut **buf),
        DynamicImage::ImageLuma16(buf) => Some(bytemuck::cast_slice_mut(&mut **buf)),
        DynamicImage::ImageLumaA16(buf) => Some(bytemuck::cast_slice_mut(&mut **buf)),
        DynamicImage::ImageRgb16(buf) => Some(bytemuck::cast_slice_mut(&mut **buf)),
        DynamicImage::ImageRgba16(buf) => Some(bytemuck::cast_slice_mut(&mut **buf)),
        DynamicImage::ImageRgb32F(buf) => Some(bytemuck::cast_slice_mut(&mut **buf)),
        DynamicImage::ImageRgba32F(buf) => Some(bytemuck::cast_slice_mut(&mut **buf)),
        _ => None,
    }
}

// SAFETY: the pixel storage of `image` is not touched by anything but a
// mapping while mapped. Writable maps come from `make_mut`, so the bytes are
// owned by this buffer alone.
unsafe impl VideoBuffer for ImageVideoBuffer {
    fn map_mode(&self) -> MapMode {
        self.state.mode()
    }

    fn map(&mut self, mode: MapMode) -> MapData {
        let bytes_per_line = self.bytes_per_line();
        let Self { image, state } = self;
        state.map_with(mode, |mode| {
            if mode.is_writable() {
                if Arc::strong_count(image) > 1 {
                    debug!(
                        width = image.width(),
                        height = image.height(),
                        "detaching shared image for write map"
                    );
                }
                match image_bytes_mut(Arc::make_mut(image)) {
                    Some(bytes) => MapData::from_bytes_mut(bytes, bytes_per_line),
                    None => MapData::empty(),
                }
            } else {
                MapData::from_bytes(image.as_bytes(), bytes_per_line)
            }
        })
    }

    fn unmap(&mut self) {
        self.state.unmap();
    }
}
