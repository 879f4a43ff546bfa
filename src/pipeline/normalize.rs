//! Image normalization: raw upload bytes → upright, capped `DynamicImage`.
//!
//! Phone cameras store pixels in sensor orientation and record the intended
//! rotation in EXIF tag 0x0112. Layout math on the raw pixels would treat a
//! portrait photo as landscape, so orientation is applied first, then the
//! colour mode is reduced to L8 or RGB8, then the size cap bounds memory for
//! the encode step.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Decode failure for a stored payload.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct NormalizeError(pub String);

/// Decode, orient, colour-normalize, and size-cap one payload.
pub fn normalize(raw: &[u8], max_dimension: u32) -> Result<DynamicImage, NormalizeError> {
    let image = image::load_from_memory(raw).map_err(|e| NormalizeError(e.to_string()))?;
    let image = apply_orientation(image, read_exif_orientation(raw));
    let image = normalize_color(image);
    Ok(cap_dimensions(image, max_dimension))
}

/// Check that `raw` decodes as an image without keeping the pixels.
pub fn probe(raw: &[u8]) -> Result<(u32, u32), NormalizeError> {
    image::load_from_memory(raw)
        .map(|img| img.dimensions())
        .map_err(|e| NormalizeError(e.to_string()))
}

/// Read the EXIF orientation tag; 1 (upright) when absent or unreadable.
pub fn read_exif_orientation(raw: &[u8]) -> u32 {
    let mut cursor = Cursor::new(raw);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return 1,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation value (1–8) so the pixels are stored upright.
///
/// 1 = upright, 2 = mirrored, 3 = 180°, 4 = flipped vertically,
/// 5 = mirrored + 90° CW, 6 = 90° CW, 7 = mirrored + 270° CW, 8 = 270° CW.
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Keep 8-bit grayscale and 8-bit RGB; everything else becomes RGB8.
pub fn normalize_color(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Downscale with Lanczos3 so neither side exceeds `max_dimension`.
pub fn cap_dimensions(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }

    let resized = image.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    debug!(
        "Resized image from {}x{} to {}x{}",
        width,
        height,
        resized.width(),
        resized.height()
    );
    resized
}
