//! Conversion orchestration: sequence the pipeline stages for one request.
//!
//! ```text
//! Received ─▶ Validated ─▶ Rasterized ─────────────▶ Packaged ─▶ Responded
//!                      └─▶ Decoded ─▶ Composed ─────┘
//!      any stage ──────────────────────────────────▶ Failed
//! ```
//!
//! Validation happens when the HTTP layer builds a [`ConversionRequest`];
//! everything after that lives here. The pipeline is fail-fast: the first
//! error from any page aborts the request and nothing partial is returned.
//!
//! CPU-bound stages (pdfium rendering, decoding, resampling, encoding) run on
//! tokio's blocking pool. Rasterisation is additionally bounded by
//! [`ConversionOptions::rasterize_timeout_secs`]; a timed-out render thread
//! is left to finish on its own, since pdfium offers no cancellation.

use crate::config::{ConversionOptions, SourceKind, TargetFormat};
use crate::error::{ConversionError, ConvertError, ValidationError};
use crate::output::{ConversionResult, PageImage};
use crate::pipeline::compose;
use crate::pipeline::negotiate::{ConversionRequest, UploadedFile};
use crate::pipeline::package;
use crate::pipeline::rasterize::PageRasterizer;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Download name for the images → PDF direction.
pub const MERGED_PDF_FILENAME: &str = "merged_output.pdf";

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Rasterized,
    Decoded,
    Composed,
    Packaged,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Rasterized => "rasterized",
            Stage::Decoded => "decoded",
            Stage::Composed => "composed",
            Stage::Packaged => "packaged",
            Stage::Responded => "responded",
        };
        f.write_str(s)
    }
}

/// Records stage transitions for one request in the log.
#[derive(Debug, Clone, Copy)]
struct StageTracker {
    kind: SourceKind,
    stage: Stage,
}

impl StageTracker {
    fn validated(kind: SourceKind) -> Self {
        debug!(stage = %Stage::Validated, "{} request validated", kind.label());
        Self {
            kind,
            stage: Stage::Validated,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(stage = %next, from = %self.stage, "{} request advanced", self.kind.label());
        self.stage = next;
    }

    fn fail(&self, err: &ConvertError) {
        warn!(stage = %self.stage, "{} conversion failed: {}", self.kind.label(), err);
    }
}

/// Run a validated request to completion.
///
/// # Errors
/// Returns the first [`ConvertError`] encountered; no partial payload is
/// produced.
pub async fn convert(
    request: ConversionRequest,
    rasterizer: Arc<dyn PageRasterizer>,
) -> Result<ConversionResult, ConvertError> {
    let started = Instant::now();
    let mut tracker = StageTracker::validated(request.source_kind);

    let result = match request.source_kind {
        SourceKind::Pdf => pdf_to_images(request, rasterizer, &mut tracker).await,
        SourceKind::ImageSequence => images_to_pdf(request, &mut tracker).await,
    };

    match result {
        Ok(ref out) => info!(
            "Conversion complete: {} pages → {} bytes {} in {}ms",
            out.page_count,
            out.payload.len(),
            out.mime_type,
            started.elapsed().as_millis()
        ),
        Err(ref e) => tracker.fail(e),
    }
    result
}

/// Synchronous variant of [`convert`] for callers without a runtime.
///
/// Runs every stage on the calling thread; no timeout applies.
pub fn convert_blocking(
    request: ConversionRequest,
    rasterizer: &dyn PageRasterizer,
) -> Result<ConversionResult, ConvertError> {
    let mut tracker = StageTracker::validated(request.source_kind);
    let result = match request.source_kind {
        SourceKind::Pdf => {
            let ConversionRequest {
                sources,
                target_format,
                options,
                ..
            } = request;
            let pdf = single_source(sources)?;
            rasterize_source(&pdf, &options, rasterizer).and_then(|pages| {
                tracker.advance(Stage::Rasterized);
                let out = package_pages(&pages, pdf.stem(), target_format, &options)?;
                tracker.advance(Stage::Packaged);
                Ok(out)
            })
        }
        SourceKind::ImageSequence => {
            let (result, stage) = images_pipeline(request.sources, &request.options, tracker);
            tracker.stage = stage;
            result
        }
    };
    if let Err(ref e) = result {
        tracker.fail(e);
    }
    result
}

// ── PDF → images ─────────────────────────────────────────────────────────

async fn pdf_to_images(
    request: ConversionRequest,
    rasterizer: Arc<dyn PageRasterizer>,
    tracker: &mut StageTracker,
) -> Result<ConversionResult, ConvertError> {
    let ConversionRequest {
        sources,
        target_format,
        options,
        ..
    } = request;
    let pdf = single_source(sources)?;
    let stem = pdf.stem().to_string();
    let dpi = options.dpi;
    let max_pages = options.max_pages;

    // ── Step 1: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let bytes = pdf.bytes;
    let task = tokio::task::spawn_blocking(move || {
        render_pages(&*rasterizer, &bytes, dpi, max_pages)
    });
    let joined = match options.rasterize_timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), task)
            .await
            .map_err(|_| ConversionError::Timeout { secs })?,
        None => task.await,
    };
    let pages = joined
        .map_err(|e| ConversionError::Internal(format!("Render task panicked: {}", e)))??;
    tracker.advance(Stage::Rasterized);
    info!(
        "Rendered {} pages at {} DPI in {}ms",
        pages.len(),
        dpi,
        render_start.elapsed().as_millis()
    );

    // ── Step 2: Encode + archive ─────────────────────────────────────────
    let result = tokio::task::spawn_blocking(move || {
        package_pages(&pages, &stem, target_format, &options)
    })
    .await
    .map_err(|e| ConversionError::Internal(format!("Archive task panicked: {}", e)))??;
    tracker.advance(Stage::Packaged);
    Ok(result)
}

fn single_source(sources: Vec<UploadedFile>) -> Result<UploadedFile, ConversionError> {
    sources
        .into_iter()
        .next()
        .ok_or_else(|| ConversionError::Internal("validated request has no source".into()))
}

fn rasterize_source(
    pdf: &UploadedFile,
    options: &ConversionOptions,
    rasterizer: &dyn PageRasterizer,
) -> Result<Vec<PageImage>, ConvertError> {
    render_pages(rasterizer, &pdf.bytes, options.dpi, options.max_pages)
}

/// Count pages, enforce `max_pages`, then render.
///
/// Every rendered page stays in memory until the archive is written, so the
/// page count is checked before any bitmap is allocated.
fn render_pages(
    rasterizer: &dyn PageRasterizer,
    pdf: &[u8],
    dpi: u32,
    max_pages: usize,
) -> Result<Vec<PageImage>, ConvertError> {
    let total = rasterizer.page_count(pdf)?;
    if total == 0 {
        return Err(ConversionError::EmptyDocument.into());
    }
    if total > max_pages {
        return Err(ValidationError::TooManyPages {
            pages: total,
            max: max_pages,
        }
        .into());
    }
    let pages = rasterizer.rasterize(pdf, dpi)?;
    if pages.is_empty() {
        return Err(ConversionError::EmptyDocument.into());
    }
    Ok(pages)
}

fn package_pages(
    pages: &[PageImage],
    stem: &str,
    format: TargetFormat,
    options: &ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    let payload = package::build_archive(pages, format, options.jpeg_quality)?;
    Ok(ConversionResult {
        payload,
        mime_type: "application/zip",
        suggested_filename: format!("{}_pages.zip", stem),
        page_count: pages.len(),
    })
}

// ── Images → PDF ─────────────────────────────────────────────────────────

async fn images_to_pdf(
    request: ConversionRequest,
    tracker: &mut StageTracker,
) -> Result<ConversionResult, ConvertError> {
    let ConversionRequest {
        sources, options, ..
    } = request;
    let start = *tracker;

    let (result, stage) =
        tokio::task::spawn_blocking(move || images_pipeline(sources, &options, start))
            .await
            .map_err(|e| ConversionError::Internal(format!("Merge task panicked: {}", e)))?;
    tracker.stage = stage;
    result
}

/// Decode → compose → assemble, reporting the last stage reached.
fn images_pipeline(
    sources: Vec<UploadedFile>,
    options: &ConversionOptions,
    mut tracker: StageTracker,
) -> (Result<ConversionResult, ConvertError>, Stage) {
    let result = (|| -> Result<ConversionResult, ConvertError> {
        let decoded = decode_images(&sources)?;
        drop(sources);
        tracker.advance(Stage::Decoded);

        let composed = compose::compose_all(decoded, &options.layout, options.trim)?;
        tracker.advance(Stage::Composed);

        let payload = package::build_document(&composed, options.jpeg_quality)?;
        tracker.advance(Stage::Packaged);

        Ok(ConversionResult {
            payload,
            mime_type: "application/pdf",
            suggested_filename: MERGED_PDF_FILENAME.to_string(),
            page_count: composed.len(),
        })
    })();
    (result, tracker.stage)
}

/// Decode every uploaded image, in order. The first failure aborts.
pub fn decode_images(sources: &[UploadedFile]) -> Result<Vec<PageImage>, ConversionError> {
    sources
        .iter()
        .enumerate()
        .map(|(i, part)| {
            image::load_from_memory(&part.bytes)
                .map(|img| {
                    debug!(
                        "Decoded image {} '{}' → {}x{}",
                        i + 1,
                        part.filename,
                        img.width(),
                        img.height()
                    );
                    PageImage::new(i, img)
                })
                .map_err(|e| ConversionError::DecodeFailed {
                    index: i + 1,
                    filename: part.filename.clone(),
                    detail: e.to_string(),
                })
        })
        .collect()
}
