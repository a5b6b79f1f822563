//! Pipeline stages for page conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the rendering backend can change without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! PDF → images:   negotiate ──▶ rasterize ──▶ encode ──▶ package (zip)
//!                 (checks)      (pdfium)      (jpg/png)
//!
//! images → PDF:   negotiate ──▶ decode ──▶ compose ──▶ encode ──▶ package (pdf)
//!                               (image)    (fit/centre) (jpg)
//! ```
//!
//! 1. [`negotiate`] — validate uploads by extension, size and magic bytes
//!    before any decoding happens
//! 2. [`rasterize`] — render PDF pages via pdfium; blocking, so callers run
//!    it on `spawn_blocking`
//! 3. [`compose`]   — scale and centre each image on its page canvas
//! 4. [`encode`]    — JPEG/PNG encoding of page rasters
//! 5. [`package`]   — bundle ordered pages into a zip archive or a PDF

pub mod compose;
pub mod encode;
pub mod negotiate;
pub mod package;
pub mod rasterize;
