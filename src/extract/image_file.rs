//! Image previews
//!
//! Decoded images are normalized before they are embedded:
//! - color mode reduced to RGB8 (RGBA8 when the source has alpha)
//! - downscaled to fit the maximum dimension, keeping the aspect ratio
//! - re-encoded as PNG

use super::{ExtractionStrategy, ImagePreview, Preview};
use crate::walker::FileEntry;
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;

/// Normalize a decoded image and encode it as a PNG preview
pub fn encode_preview(img: DynamicImage, max_dimension: u32) -> Result<ImagePreview, String> {
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    let img = resize_if_needed(img, max_dimension);

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| format!("Failed to encode image: {}", e))?;

    Ok(ImagePreview {
        width: img.width(),
        height: img.height(),
        png: buffer.into_inner(),
    })
}

/// Resize image if it exceeds maximum dimensions
fn resize_if_needed(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());

    if width <= max_dimension && height <= max_dimension {
        return img;
    }

    // resize() fits within the box and preserves the aspect ratio
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

/// Loads image files directly
pub struct ImageStrategy {
    max_dimension: u32,
}

impl ImageStrategy {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl ExtractionStrategy for ImageStrategy {
    fn name(&self) -> &'static str {
        "image decode"
    }

    fn extract(&self, entry: &FileEntry) -> Result<Preview, String> {
        let img = image::open(&entry.path).map_err(|e| format!("Failed to open image: {}", e))?;

        tracing::debug!(
            "[ImageStrategy] {}: {}x{} {:?}",
            entry.label(),
            img.width(),
            img.height(),
            img.color()
        );

        encode_preview(img, self.max_dimension).map(Preview::Image)
    }
}
