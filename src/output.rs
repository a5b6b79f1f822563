//! Values produced by the pipeline: page images and the final payload.

use image::{ColorType, DynamicImage};
use serde::Serialize;

/// Channel layout of a page raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorMode {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl From<ColorType> for ColorMode {
    fn from(ct: ColorType) -> Self {
        match (ct.has_color(), ct.has_alpha()) {
            (false, false) => ColorMode::Gray,
            (false, true) => ColorMode::GrayAlpha,
            (true, false) => ColorMode::Rgb,
            (true, true) => ColorMode::Rgba,
        }
    }
}

/// One raster page, produced by rasterisation or decoding.
///
/// `index` is the 0-based position of the page in its source (document page
/// order or upload order) and survives every later stage so packaging can
/// name and order its output.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: usize,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    /// 1-based page number, as used in filenames and messages.
    pub fn page_number(&self) -> usize {
        self.index + 1
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn color_mode(&self) -> ColorMode {
        self.image.color().into()
    }
}

/// The packaged response body of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Zip archive or PDF document bytes.
    pub payload: Vec<u8>,
    /// MIME type of `payload`.
    pub mime_type: &'static str,
    /// Download filename offered to the client.
    pub suggested_filename: String,
    /// Number of pages packaged.
    pub page_count: usize,
}

impl ConversionResult {
    /// `Content-Disposition` header value for an attachment download.
    pub fn content_disposition(&self) -> String {
        let safe: String = self
            .suggested_filename
            .chars()
            .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        format!("attachment; filename=\"{safe}\"")
    }
}
