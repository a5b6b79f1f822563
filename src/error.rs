//! Error types for the pagecraft library.
//!
//! Three error families map onto three distinct failure modes:
//!
//! * [`ValidationError`] — the request itself is unacceptable (missing file,
//!   wrong extension, oversize upload, unknown output format). Nothing has
//!   been decoded or rendered yet. Surfaces as HTTP 400 (or 413).
//!
//! * [`ConversionError`] — the request was valid but a collaborator failed
//!   while doing the work (pdfium could not render a page, an image could
//!   not be decoded, the archive could not be written). Surfaces as HTTP 500
//!   with the underlying cause interpolated into the message.
//!
//! * [`RatingError`] — the vote counter rejected or failed to persist a vote.
//!
//! [`ConvertError`] is the tagged union returned by the orchestrator so the
//! HTTP layer can pick a status code by matching on the kind instead of
//! inspecting message strings.

use std::path::PathBuf;
use thiserror::Error;

/// A request that was rejected before any conversion work started.
#[derive(Debug, Error)]
pub enum ValidationError {
    // ── Upload shape ──────────────────────────────────────────────────────
    /// The multipart body had no part with the expected field name.
    #[error("No file part '{field}' in the request")]
    MissingFile { field: String },

    /// A file part was present but its filename was empty.
    #[error("No file selected")]
    EmptyFilename,

    /// The filename extension does not match the expected source kind.
    #[error("File '{filename}' is not a {expected} file")]
    WrongExtension { filename: String, expected: String },

    /// The file claims to be a PDF but lacks the `%PDF` header.
    #[error("File '{filename}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { filename: String, magic: Vec<u8> },

    /// Measured size exceeded the configured maximum.
    #[error("File is too large: {size} bytes (maximum is {max} bytes)")]
    TooLarge { size: usize, max: usize },

    /// The request body as a whole exceeded the server limit.
    #[error("Request body is too large (maximum is {max} bytes)")]
    RequestTooLarge { max: usize },

    /// The PDF has more pages than the server will rasterise.
    #[error("PDF has {pages} pages (maximum is {max})")]
    TooManyPages { pages: usize, max: usize },

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    // ── Options ───────────────────────────────────────────────────────────
    /// A required form field was absent.
    #[error("Missing form field '{field}'")]
    MissingField { field: String },

    /// The requested output format is not supported.
    #[error("Unsupported output format '{format}'. Must be 'jpg' or 'png'")]
    UnsupportedFormat { format: String },

    /// The requested page layout is not supported.
    #[error("Unsupported layout '{layout}'. Must be 'letter', 'a4' or 'image'")]
    UnsupportedLayout { layout: String },

    /// A numeric option could not be parsed or is out of range.
    #[error("Invalid value '{value}' for option '{option}'")]
    InvalidOption { option: String, value: String },

    /// The image-to-PDF direction received zero images.
    #[error("No images uploaded")]
    NoImages,
}

impl ValidationError {
    /// `true` when the rejection is about payload size rather than content.
    pub fn is_oversize(&self) -> bool {
        matches!(
            self,
            ValidationError::TooLarge { .. } | ValidationError::RequestTooLarge { .. }
        )
    }
}

/// A failure inside a collaborator while converting a valid request.
#[derive(Debug, Error)]
pub enum ConversionError {
    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt or unsupported: {detail}")]
    CorruptPdf { detail: String },

    /// PDF requires a password; password-protected uploads are not supported.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// The document parsed but has no pages to render.
    #[error("PDF has no pages")]
    EmptyDocument,

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Rendering did not finish within the configured bound.
    #[error("Rasterisation timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Image errors ──────────────────────────────────────────────────────
    /// An uploaded image could not be decoded.
    #[error("Could not decode image {index} ('{filename}'): {detail}")]
    DecodeFailed {
        index: usize,
        filename: String,
        detail: String,
    },

    /// A page image could not be encoded to the target format.
    #[error("Image encoding failed for page {page}: {detail}")]
    EncodeFailed { page: usize, detail: String },

    // ── Packaging errors ──────────────────────────────────────────────────
    /// Writing the zip archive failed.
    #[error("Failed to build archive: {0}")]
    Archive(String),

    /// Writing the PDF document failed.
    #[error("Failed to build PDF document: {0}")]
    Document(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PAGECRAFT_PDFIUM_LIB (or --pdfium-lib) to the location of libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a worker task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Every way a conversion request can fail, tagged by kind.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Failures of the vote counter.
#[derive(Debug, Error)]
pub enum RatingError {
    /// The rating is outside `1..=5`.
    #[error("Rating must be an integer between 1 and 5, got {0}")]
    InvalidRating(i64),

    /// The client already voted during the current UTC day.
    #[error("Client already voted today")]
    AlreadyVotedToday,

    /// Reading or writing one of the rating documents failed.
    #[error("Rating storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rating document exists but does not parse.
    #[error("Rating document '{path}' is corrupt: {detail}")]
    Corrupt { path: PathBuf, detail: String },
}

/// Invalid server configuration detected by the builder.
#[derive(Debug, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);
