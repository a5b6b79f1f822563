//! Page composition: fit a decoded image onto its page.
//!
//! Two layout policies exist (see [`LayoutPolicy`]):
//!
//! * **FitToCanvas**: the page is a fixed canvas (US Letter, A4). The image
//!   is scaled by `min(cw/sw, ch/sh)`, resampled with Lanczos3, and centred.
//! * **FitToImage**: the page takes the image's own size; the image sits at
//!   the origin unscaled.
//!
//! Either policy may first trim a uniform border: everything matching the
//! top-left pixel's colour is cropped away.

use crate::config::LayoutPolicy;
use crate::error::ValidationError;
use crate::output::PageImage;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use tracing::debug;

/// Position and size of the placed image on its page, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A page ready for packaging.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    /// Source position (0-based upload order).
    pub index: usize,
    /// The placed image, already at `placement.width × placement.height`.
    pub image: DynamicImage,
    pub placement: Placement,
    pub page_width_px: u32,
    pub page_height_px: u32,
    /// Pixel density mapping page pixels to PDF points.
    pub dpi: u32,
    /// Fill behind the image; `None` when the image covers the page.
    pub background: Option<[u8; 3]>,
}

impl ComposedPage {
    /// Render the page raster: background filled, image overlaid.
    pub fn flatten(&self) -> RgbImage {
        let [r, g, b] = self.background.unwrap_or([255, 255, 255]);
        let mut canvas = RgbImage::from_pixel(self.page_width_px, self.page_height_px, Rgb([r, g, b]));
        imageops::overlay(
            &mut canvas,
            &self.image.to_rgb8(),
            self.placement.x as i64,
            self.placement.y as i64,
        );
        canvas
    }
}

/// Compose one page.
pub fn compose(page: PageImage, policy: &LayoutPolicy, trim: bool) -> ComposedPage {
    let PageImage { index, image } = page;
    let image = if trim { trim_uniform_border(image) } else { image };

    match policy {
        LayoutPolicy::FitToImage { dpi } => {
            let (w, h) = image.dimensions();
            ComposedPage {
                index,
                image,
                placement: Placement {
                    x: 0,
                    y: 0,
                    width: w,
                    height: h,
                },
                page_width_px: w,
                page_height_px: h,
                dpi: *dpi,
                background: None,
            }
        }
        LayoutPolicy::FitToCanvas(canvas) => {
            let (sw, sh) = image.dimensions();
            let (nw, nh) = fit_dimensions(sw, sh, canvas.width_px, canvas.height_px);
            let image = if (nw, nh) == (sw, sh) {
                image
            } else {
                image.resize_exact(nw, nh, FilterType::Lanczos3)
            };
            let placement = Placement {
                x: (canvas.width_px - nw) / 2,
                y: (canvas.height_px - nh) / 2,
                width: nw,
                height: nh,
            };
            debug!(
                "Page {}: {}x{} → {}x{} at ({}, {}) on {}x{} canvas",
                index + 1,
                sw,
                sh,
                nw,
                nh,
                placement.x,
                placement.y,
                canvas.width_px,
                canvas.height_px
            );
            ComposedPage {
                index,
                image,
                placement,
                page_width_px: canvas.width_px,
                page_height_px: canvas.height_px,
                dpi: canvas.dpi,
                background: Some(canvas.background),
            }
        }
    }
}

/// Compose every page, preserving order.
pub fn compose_all(
    pages: Vec<PageImage>,
    policy: &LayoutPolicy,
    trim: bool,
) -> Result<Vec<ComposedPage>, ValidationError> {
    if pages.is_empty() {
        return Err(ValidationError::NoImages);
    }
    Ok(pages
        .into_iter()
        .map(|page| compose(page, policy, trim))
        .collect())
}

/// Aspect-preserving size of a `sw × sh` image fitted inside `cw × ch`.
///
/// Rounded to whole pixels and clamped to `1..=canvas` on each axis.
pub fn fit_dimensions(sw: u32, sh: u32, cw: u32, ch: u32) -> (u32, u32) {
    if sw == 0 || sh == 0 {
        return (cw.min(1), ch.min(1));
    }
    let scale = f64::min(cw as f64 / sw as f64, ch as f64 / sh as f64);
    let nw = ((sw as f64 * scale).round() as u32).clamp(1, cw.max(1));
    let nh = ((sh as f64 * scale).round() as u32).clamp(1, ch.max(1));
    (nw, nh)
}

/// Bounding box `(x, y, w, h)` of pixels that differ from the top-left one.
///
/// `None` when the image is uniform (or empty).
pub fn content_bounds(image: &DynamicImage) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let reference = image.get_pixel(0, 0);

    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;

    for (x, y, px) in image.pixels() {
        if px != reference {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Crop away the border whose colour matches the top-left pixel.
///
/// A uniform image is returned unchanged.
pub fn trim_uniform_border(image: DynamicImage) -> DynamicImage {
    match content_bounds(&image) {
        Some((x, y, w, h)) if (w, h) != image.dimensions() => image.crop_imm(x, y, w, h),
        _ => image,
    }
}
