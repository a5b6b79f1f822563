//! PDF rasterisation: render every page of an uploaded document via pdfium.
//!
//! The adapter sits behind the [`PageRasterizer`] trait so the orchestrator
//! and the HTTP layer never name pdfium directly; tests substitute a fake
//! rasteriser and run without a native library.
//!
//! ## Blocking
//!
//! `pdfium-render` wraps the pdfium C++ library, which is not async-safe.
//! [`PageRasterizer::rasterize`] is a plain blocking call; the orchestrator
//! moves it onto the blocking pool with `tokio::task::spawn_blocking`.
//!
//! ## Resolution
//!
//! Pages render at `dpi / 72` scale (PDF user space is 72 units per inch),
//! with each edge capped at [`MAX_EDGE_PX`] so an oversized page cannot
//! allocate an unbounded bitmap.

use crate::error::ConversionError;
use crate::output::PageImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Longest edge of a rendered page, in pixels.
pub const MAX_EDGE_PX: i32 = 10_000;

/// Something that turns PDF bytes into one raster image per page.
pub trait PageRasterizer: Send + Sync {
    /// Render every page of `pdf` at `dpi`, in document page order.
    ///
    /// Any page failure aborts the whole call; partial results are never
    /// returned.
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<PageImage>, ConversionError>;

    /// Number of pages in `pdf`, without rendering any of them.
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ConversionError>;
}

/// [`PageRasterizer`] backed by pdfium.
///
/// The library is bound per call, on the calling thread, so the rasteriser
/// itself holds no native state and is cheap to share.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    lib_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Bind the system pdfium (or one next to the executable).
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the pdfium library at `path`.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            lib_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, ConversionError> {
        let bindings = match self.lib_path {
            Some(ref path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| ConversionError::PdfiumBindingFailed(e.to_string()))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<PageImage>, ConversionError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| classify_load_error(&e))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);
        if total_pages == 0 {
            return Err(ConversionError::EmptyDocument);
        }

        let render_config = render_config(dpi);
        let mut results = Vec::with_capacity(total_pages);

        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ConversionError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );

            results.push(PageImage::new(idx, image));
        }

        Ok(results)
    }

    fn page_count(&self, pdf: &[u8]) -> Result<usize, ConversionError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| classify_load_error(&e))?;
        Ok(document.pages().len() as usize)
    }
}

/// Render settings for `dpi`.
fn render_config(dpi: u32) -> PdfRenderConfig {
    PdfRenderConfig::new()
        .scale_page_by_factor(scale_for_dpi(dpi))
        .set_maximum_width(MAX_EDGE_PX)
        .set_maximum_height(MAX_EDGE_PX)
}

/// Scale factor from PDF points (1/72 in) to pixels at `dpi`.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

/// Map a pdfium load failure onto a conversion error.
fn classify_load_error(e: &PdfiumError) -> ConversionError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        ConversionError::PasswordRequired
    } else {
        ConversionError::CorruptPdf { detail: err_str }
    }
}
