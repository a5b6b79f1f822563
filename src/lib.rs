//! # pagecraft
//!
//! Convert PDFs to page images and images to PDFs, over HTTP or from the
//! command line.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF ──▶ negotiate ──▶ rasterize (pdfium) ──▶ encode jpg/png ──▶ zip
//!
//! images ──▶ negotiate ──▶ decode ──▶ compose on page ──▶ encode jpg ──▶ PDF
//! ```
//!
//! Every stage works on in-memory buffers. pdfium rendering and image work
//! are CPU-bound and run on tokio's blocking pool.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagecraft::{convert, ConversionOptions, ConversionRequest, PdfiumRasterizer, UploadedFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pdf = UploadedFile::new("pdf", "report.pdf", std::fs::read("report.pdf")?);
//!     let request = ConversionRequest::pdf_to_images(Some(pdf), Some("png"), ConversionOptions::default())?;
//!     let result = convert(request, Arc::new(PdfiumRasterizer::new())).await?;
//!     std::fs::write(&result.suggested_filename, &result.payload)?;
//!     eprintln!("{} pages", result.page_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagecraft` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pagecraft = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod rating;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CanvasLayout, ConversionOptions, LayoutPolicy, PageSize, ServerConfig, ServerConfigBuilder,
    SourceKind, TargetFormat,
};
pub use convert::{convert, convert_blocking, Stage};
pub use error::{ConfigError, ConversionError, ConvertError, RatingError, ValidationError};
pub use output::{ColorMode, ConversionResult, PageImage};
pub use pipeline::negotiate::{ConversionRequest, UploadedFile};
pub use pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
pub use rating::{RatingSnapshot, RatingStore, RatingSummary};
pub use server::{router, serve, AppState};
