//! Image encoding: `DynamicImage` → JPEG or PNG bytes.
//!
//! JPEG has no alpha channel, so JPEG output is always flattened to 8-bit
//! RGB first. PNG keeps the raster's own colour layout.

use crate::config::TargetFormat;
use image::codecs::jpeg::JpegEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, ImageError, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a page raster in the given format.
///
/// `Pdf` is not an image encoding and yields a parameter error.
pub fn encode_page(
    img: &DynamicImage,
    format: TargetFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, ImageError> {
    let buf = match format {
        TargetFormat::Jpeg => encode_jpeg(img, jpeg_quality)?,
        TargetFormat::Png => {
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
            buf
        }
        TargetFormat::Pdf => {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::Generic("pdf is not a page image format".into()),
            )))
        }
    };

    debug!("Encoded {}x{} image → {} bytes {:?}", img.width(), img.height(), buf.len(), format);
    Ok(buf)
}

/// Encode as baseline JPEG at `quality` (1–100), dropping any alpha channel.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}
