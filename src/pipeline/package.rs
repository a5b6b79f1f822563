//! Multi-page packaging: turn ordered pages into one downloadable payload.
//!
//! * [`build_archive`]: PDF → images direction. Each page is encoded on its
//!   own and stored as `page_<n>.<ext>` in a deflated zip, in page order.
//! * [`build_document`]: images → PDF direction. Each composed page becomes
//!   one PDF page, in input order, with its image embedded as a JPEG
//!   (`DCTDecode`) XObject drawn at the composed placement.
//!
//! Intermediate encodings are plain in-memory buffers owned by the call, so
//! nothing outlives a failed packaging attempt.

use crate::config::TargetFormat;
use crate::error::ConversionError;
use crate::output::PageImage;
use crate::pipeline::compose::ComposedPage;
use crate::pipeline::encode::{encode_jpeg, encode_page};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive entry name for a 1-based page number.
pub fn entry_name(page_number: usize, format: TargetFormat) -> String {
    format!("page_{}.{}", page_number, format.extension())
}

/// Encode every page and store it in a zip archive, preserving order.
pub fn build_archive(
    pages: &[PageImage],
    format: TargetFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, ConversionError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for page in pages {
        let bytes = encode_page(&page.image, format, jpeg_quality).map_err(|e| {
            ConversionError::EncodeFailed {
                page: page.page_number(),
                detail: e.to_string(),
            }
        })?;

        let name = entry_name(page.page_number(), format);
        zip.start_file(name.as_str(), options)
            .map_err(|e| ConversionError::Archive(format!("{name}: {e}")))?;
        zip.write_all(&bytes)
            .map_err(|e| ConversionError::Archive(format!("{name}: {e}")))?;
        debug!("Archived {} ({} bytes)", name, bytes.len());
    }

    let cursor = zip
        .finish()
        .map_err(|e| ConversionError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Page geometry in PDF points (1/72 in), origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub image_x: f32,
    pub image_y: f32,
    pub image_width: f32,
    pub image_height: f32,
}

impl PageGeometry {
    /// Convert a composed page's pixel layout into points, flipping the y axis.
    pub fn of(page: &ComposedPage) -> Self {
        let k = 72.0 / page.dpi.max(1) as f32;
        let p = page.placement;
        let flipped_y = page.page_height_px.saturating_sub(p.y + p.height);
        Self {
            width: page.page_width_px as f32 * k,
            height: page.page_height_px as f32 * k,
            image_x: p.x as f32 * k,
            image_y: flipped_y as f32 * k,
            image_width: p.width as f32 * k,
            image_height: p.height as f32 * k,
        }
    }
}

/// Assemble composed pages into a single PDF, one page per input, in order.
pub fn build_document(
    pages: &[ComposedPage],
    jpeg_quality: u8,
) -> Result<Vec<u8>, ConversionError> {
    if pages.is_empty() {
        return Err(ConversionError::Document("no pages to assemble".into()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let page_number = page.index + 1;
        let jpeg = encode_jpeg(&page.image, jpeg_quality).map_err(|e| {
            ConversionError::EncodeFailed {
                page: page_number,
                detail: e.to_string(),
            }
        })?;

        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.image.width() as i64,
                "Height" => page.image.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = doc.add_object(image_stream);

        let geometry = PageGeometry::of(page);
        let content = Content {
            operations: page_operations(&geometry, page.background),
        };
        let content_bytes = content
            .encode()
            .map_err(|e| ConversionError::Document(format!("page {page_number}: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(geometry.width),
                Object::Real(geometry.height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        debug!(
            "Page {}: {:.1}x{:.1} pt, image at ({:.1}, {:.1})",
            page_number, geometry.width, geometry.height, geometry.image_x, geometry.image_y
        );
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(concat!("pagecraft ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConversionError::Document(format!("failed to save PDF: {e}")))?;
    Ok(buffer)
}

/// Content stream for one page: optional background fill, then the image.
fn page_operations(g: &PageGeometry, background: Option<[u8; 3]>) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(12);

    if let Some([r, gr, b]) = background {
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "rg",
            vec![
                Object::Real(r as f32 / 255.0),
                Object::Real(gr as f32 / 255.0),
                Object::Real(b as f32 / 255.0),
            ],
        ));
        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(g.width),
                Object::Real(g.height),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            Object::Real(g.image_width),
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(g.image_height),
            Object::Real(g.image_x),
            Object::Real(g.image_y),
        ],
    ));
    ops.push(Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]));
    ops.push(Operation::new("Q", vec![]));
    ops
}
