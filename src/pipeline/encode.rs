//! Image encoding: normalized `DynamicImage` → JPEG bytes for a DCT stream.
//!
//! PDF viewers decode `/DCTDecode` streams natively, so a JPEG can be
//! embedded byte-for-byte without any re-compression by the PDF writer.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::borrow::Cow;
use tracing::debug;

/// Colour space of an encoded page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
}

impl ColorSpace {
    /// PDF colour space name.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::Gray => "DeviceGray",
            ColorSpace::Rgb => "DeviceRGB",
        }
    }
}

/// A JPEG ready to embed as an image XObject.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
}

/// Encode a normalized image as JPEG at `quality` (1–100).
///
/// Grayscale input stays single-channel; anything else is written as RGB.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedImage, image::ImageError> {
    let (img, color_space) = match img {
        DynamicImage::ImageLuma8(_) => (Cow::Borrowed(img), ColorSpace::Gray),
        DynamicImage::ImageRgb8(_) => (Cow::Borrowed(img), ColorSpace::Rgb),
        other => (
            Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
            ColorSpace::Rgb,
        ),
    };

    let mut buf = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?;
    debug!(
        "Encoded {}x{} image → {} bytes JPEG",
        img.width(),
        img.height(),
        buf.len()
    );

    Ok(EncodedImage {
        data: buf,
        width: img.width(),
        height: img.height(),
        color_space,
    })
}
