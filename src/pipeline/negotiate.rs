//! Format negotiation: decide whether an upload is acceptable.
//!
//! Runs before any decoding or rendering. Every check works on metadata
//! already in hand (field name, filename, measured length, leading bytes),
//! so a rejected request costs nothing beyond reading its body.
//!
//! Uploaded parts are fully buffered by the HTTP layer before they reach
//! this module; there is no stream position to restore afterwards.

use crate::config::{ConversionOptions, SourceKind, TargetFormat};
use crate::error::ValidationError;
use std::path::Path;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF";

/// How far into a file the `%PDF` header may start.
pub const PDF_HEADER_WINDOW: usize = 1024;

/// A validated conversion request.
///
/// Only constructible through [`ConversionRequest::pdf_to_images`] and
/// [`ConversionRequest::images_to_pdf`], so holding one means every
/// negotiation check has passed.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// One PDF, or the ordered image parts.
    pub sources: Vec<UploadedFile>,
    pub source_kind: SourceKind,
    pub target_format: TargetFormat,
    pub options: ConversionOptions,
}

impl ConversionRequest {
    /// Validate a PDF → images request.
    pub fn pdf_to_images(
        pdf: Option<UploadedFile>,
        format_token: Option<&str>,
        options: ConversionOptions,
    ) -> Result<Self, ValidationError> {
        check_file(pdf.as_ref(), "pdf", SourceKind::Pdf, options.max_bytes)?;
        let target_format = negotiate_image_format(format_token)?;
        Ok(Self {
            sources: pdf.into_iter().collect(),
            source_kind: SourceKind::Pdf,
            target_format,
            options,
        })
    }

    /// Validate an images → PDF request.
    pub fn images_to_pdf(
        parts: Vec<UploadedFile>,
        options: ConversionOptions,
    ) -> Result<Self, ValidationError> {
        let sources = check_images(parts, options.max_bytes)?;
        Ok(Self {
            sources,
            source_kind: SourceKind::ImageSequence,
            target_format: TargetFormat::Pdf,
            options,
        })
    }
}

/// One file part of a multipart upload, fully read into memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Multipart field name, e.g. `pdf` or `images[2]`.
    pub field: String,
    /// Client-supplied filename (may be empty).
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(field: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            bytes,
        }
    }

    /// Filename without its extension, for naming derived downloads.
    pub fn stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
    }
}

/// Lower-cased extension of `filename`, if any.
pub fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Validate a single uploaded file against the expected source kind.
///
/// Checks, in order: presence, non-empty filename, extension, measured size,
/// and (for PDFs) the `%PDF` magic bytes.
pub fn check_file<'a>(
    file: Option<&'a UploadedFile>,
    field: &str,
    kind: SourceKind,
    max_bytes: usize,
) -> Result<&'a UploadedFile, ValidationError> {
    let file = file.ok_or_else(|| ValidationError::MissingFile {
        field: field.to_string(),
    })?;

    if file.filename.trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    let accepted = extension(&file.filename)
        .map(|ext| kind.extensions().contains(&ext.as_str()))
        .unwrap_or(false);
    if !accepted {
        return Err(ValidationError::WrongExtension {
            filename: file.filename.clone(),
            expected: kind.label().to_string(),
        });
    }

    if file.bytes.len() > max_bytes {
        return Err(ValidationError::TooLarge {
            size: file.bytes.len(),
            max: max_bytes,
        });
    }

    if kind == SourceKind::Pdf && !has_pdf_header(&file.bytes) {
        return Err(ValidationError::NotAPdf {
            filename: file.filename.clone(),
            magic: file.bytes.iter().take(4).copied().collect(),
        });
    }

    debug!(
        "Accepted {} upload '{}' ({} bytes)",
        kind.label(),
        file.filename,
        file.bytes.len()
    );
    Ok(file)
}

/// `%PDF` appears within the first [`PDF_HEADER_WINDOW`] bytes.
fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// Resolve the `format` form field for the PDF → images direction.
pub fn negotiate_image_format(token: Option<&str>) -> Result<TargetFormat, ValidationError> {
    match token {
        Some(t) if !t.trim().is_empty() => TargetFormat::parse_image_token(t),
        _ => Err(ValidationError::MissingField {
            field: "format".to_string(),
        }),
    }
}

/// Position of an image part within the upload form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    /// `images[N]`
    Indexed(usize),
    /// `images`, `images[]` or `file`
    Plain,
}

/// Classify a multipart field name as an image part, if it is one.
pub fn image_field(name: &str) -> Option<ImageField> {
    if matches!(name, "images" | "images[]" | "file" | "files") {
        return Some(ImageField::Plain);
    }
    name.strip_prefix("images[")
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|idx| idx.parse::<usize>().ok())
        .map(ImageField::Indexed)
}

/// Order image parts the way the upload form numbered them.
///
/// Indexed parts (`images[0]`, `images[1]`, …) come first, in index order,
/// and stop at the first missing index. Plain parts follow in arrival order.
/// Parts with neither a filename nor content (an empty file input) are
/// dropped.
pub fn order_image_parts(parts: Vec<UploadedFile>) -> Vec<UploadedFile> {
    let mut indexed: Vec<(usize, UploadedFile)> = Vec::new();
    let mut plain: Vec<UploadedFile> = Vec::new();

    for part in parts {
        if part.filename.trim().is_empty() && part.bytes.is_empty() {
            continue;
        }
        match image_field(&part.field) {
            Some(ImageField::Indexed(i)) => indexed.push((i, part)),
            Some(ImageField::Plain) => plain.push(part),
            None => {}
        }
    }

    indexed.sort_by_key(|(i, _)| *i);

    let mut ordered = Vec::with_capacity(indexed.len() + plain.len());
    let mut expected = 0usize;
    for (i, part) in indexed {
        if i != expected {
            break;
        }
        ordered.push(part);
        expected += 1;
    }
    ordered.extend(plain);
    ordered
}

/// Validate and order the image parts of an images → PDF upload.
pub fn check_images(
    parts: Vec<UploadedFile>,
    max_bytes: usize,
) -> Result<Vec<UploadedFile>, ValidationError> {
    let ordered = order_image_parts(parts);
    if ordered.is_empty() {
        return Err(ValidationError::NoImages);
    }
    for part in &ordered {
        check_file(Some(part), &part.field, SourceKind::ImageSequence, max_bytes)?;
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile::new("pdf", name, bytes.to_vec())
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = check_file(None, "pdf", SourceKind::Pdf, 100).unwrap_err();
        assert!(matches!(err, ValidationError::MissingFile { ref field } if field == "pdf"));
    }

    #[test]
    fn empty_filename_is_rejected() {
        let f = pdf("", b"%PDF-1.7");
        let err = check_file(Some(&f), "pdf", SourceKind::Pdf, 100).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyFilename));
    }

    #[test]
    fn extension_must_match_kind() {
        let f = pdf("scan.png", b"%PDF-1.7");
        let err = check_file(Some(&f), "pdf", SourceKind::Pdf, 100).unwrap_err();
        assert!(matches!(err, ValidationError::WrongExtension { .. }));

        let f = pdf("REPORT.PDF", b"%PDF-1.7");
        assert!(check_file(Some(&f), "pdf", SourceKind::Pdf, 100).is_ok());
    }

    #[test]
    fn oversize_is_rejected_before_magic_check() {
        let f = pdf("big.pdf", &[b'x'; 101]);
        let err = check_file(Some(&f), "pdf", SourceKind::Pdf, 100).unwrap_err();
        assert!(err.is_oversize());
    }

    #[test]
    fn size_at_limit_is_accepted() {
        let mut bytes = b"%PDF".to_vec();
        bytes.resize(100, b' ');
        let f = pdf("ok.pdf", &bytes);
        assert!(check_file(Some(&f), "pdf", SourceKind::Pdf, 100).is_ok());
    }

    #[test]
    fn pdf_magic_is_checked() {
        let f = pdf("fake.pdf", b"GIF89a");
        let err = check_file(Some(&f), "pdf", SourceKind::Pdf, 100).unwrap_err();
        assert!(matches!(err, ValidationError::NotAPdf { ref magic, .. } if magic == b"GIF8"));
    }

    #[test]
    fn pdf_header_may_follow_leading_bytes() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"\r\n%PDF-1.4\n");
        let f = pdf("bom.pdf", &bytes);
        assert!(check_file(Some(&f), "pdf", SourceKind::Pdf, 4096).is_ok());

        let mut late = vec![b' '; PDF_HEADER_WINDOW];
        late.extend_from_slice(b"%PDF-1.4");
        let f = pdf("late.pdf", &late);
        assert!(matches!(
            check_file(Some(&f), "pdf", SourceKind::Pdf, 4096).unwrap_err(),
            ValidationError::NotAPdf { .. }
        ));

        let mut edge = vec![b' '; PDF_HEADER_WINDOW - 4];
        edge.extend_from_slice(b"%PDF-1.4");
        let f = pdf("edge.pdf", &edge);
        assert!(check_file(Some(&f), "pdf", SourceKind::Pdf, 4096).is_ok());
    }

    #[test]
    fn format_negotiation() {
        assert_eq!(negotiate_image_format(Some("png")).unwrap(), TargetFormat::Png);
        assert_eq!(negotiate_image_format(Some("jpg")).unwrap(), TargetFormat::Jpeg);
        assert!(matches!(
            negotiate_image_format(None).unwrap_err(),
            ValidationError::MissingField { .. }
        ));
        assert!(matches!(
            negotiate_image_format(Some("gif")).unwrap_err(),
            ValidationError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn image_field_names() {
        assert_eq!(image_field("images[0]"), Some(ImageField::Indexed(0)));
        assert_eq!(image_field("images[12]"), Some(ImageField::Indexed(12)));
        assert_eq!(image_field("images[]"), Some(ImageField::Plain));
        assert_eq!(image_field("images"), Some(ImageField::Plain));
        assert_eq!(image_field("images[x]"), None);
        assert_eq!(image_field("format"), None);
    }

    #[test]
    fn indexed_parts_are_ordered_and_stop_at_gap() {
        let parts = vec![
            UploadedFile::new("images[1]", "b.png", vec![1]),
            UploadedFile::new("images[0]", "a.png", vec![0]),
            UploadedFile::new("images[3]", "d.png", vec![3]),
            UploadedFile::new("layout", "", vec![]),
            UploadedFile::new("images", "e.png", vec![4]),
        ];
        let names: Vec<_> = order_image_parts(parts)
            .into_iter()
            .map(|p| p.filename)
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "e.png"]);
    }

    #[test]
    fn no_images_is_rejected() {
        let parts = vec![UploadedFile::new("images[0]", "", vec![])];
        assert!(matches!(
            check_images(parts, 100).unwrap_err(),
            ValidationError::NoImages
        ));
    }

    #[test]
    fn non_image_extension_in_sequence_is_rejected() {
        let parts = vec![
            UploadedFile::new("images[0]", "a.jpg", vec![1]),
            UploadedFile::new("images[1]", "notes.txt", vec![1]),
        ];
        assert!(matches!(
            check_images(parts, 100).unwrap_err(),
            ValidationError::WrongExtension { .. }
        ));
    }

    #[test]
    fn stem_falls_back() {
        assert_eq!(UploadedFile::new("pdf", "report.pdf", vec![]).stem(), "report");
        assert_eq!(UploadedFile::new("pdf", ".pdf", vec![]).stem(), ".pdf");
        assert_eq!(UploadedFile::new("pdf", "", vec![]).stem(), "document");
    }
}
