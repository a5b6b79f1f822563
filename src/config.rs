//! Configuration types for the conversion service.
//!
//! Every server knob lives in [`ServerConfig`], built via its
//! [`ServerConfigBuilder`]. Per-request behaviour is derived from it as a
//! [`ConversionOptions`] value, which request handlers may narrow further
//! from form fields (output format, layout, trim) before handing it to the
//! orchestrator.

use crate::error::{ConfigError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default upload cap: 15 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

/// Default cap on pages rasterised from one PDF.
pub const DEFAULT_MAX_PAGES: usize = 300;

/// Configuration for the conversion server.
///
/// Built via [`ServerConfig::builder()`] or using [`ServerConfig::default()`].
///
/// # Example
/// ```rust
/// use pagecraft::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .dpi(150)
///     .max_upload_bytes(10 * 1024 * 1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind. Default: `0.0.0.0`.
    pub host: String,

    /// Port to listen on. Default: 5000.
    pub port: u16,

    /// Rasterisation DPI for PDF pages. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Largest accepted file part, in bytes. Default: 15 MiB.
    ///
    /// The request body as a whole is capped slightly above this to leave
    /// room for multipart framing.
    pub max_upload_bytes: usize,

    /// Most pages a PDF may have before it is rejected. Default: 300.
    ///
    /// Every page is held as a full bitmap until the archive is written, so
    /// this bounds peak memory per request (about 15 MB per Letter page at
    /// 200 DPI).
    pub max_pages: usize,

    /// Upper bound on rasterisation wall-clock time. `None` disables it.
    /// Default: 60 s.
    pub rasterize_timeout_secs: Option<u64>,

    /// JPEG quality for encoded pages (1–100). Default: 90.
    pub jpeg_quality: u8,

    /// Pixel density of fixed canvases in the image-to-PDF direction. Default: 150.
    ///
    /// At 150 DPI a US Letter canvas is 1275 × 1650 px.
    pub canvas_dpi: u32,

    /// Page layout used when the request does not name one. Default: Letter.
    pub default_layout: PageSize,

    /// Trim uniform borders before composing. Default: false.
    pub trim_whitespace: bool,

    /// Directory holding the rating documents. Default: `./data`.
    pub data_dir: PathBuf,

    /// Scheme used when redirecting `www.` hosts to the apex. Default: https.
    pub canonical_scheme: String,

    /// Public base URL for sitemap/robots (e.g. `https://example.com`).
    /// Falls back to the request `Host` header when unset.
    pub site_url: Option<String>,

    /// Body served at `/ads.txt`. `None` answers 404.
    pub ads_txt: Option<String>,

    /// Directory served under `/static`. `None` disables static serving.
    pub static_dir: Option<PathBuf>,

    /// Explicit pdfium library path. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Identify voters by the first `X-Forwarded-For` hop. Default: false.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            dpi: 200,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_pages: DEFAULT_MAX_PAGES,
            rasterize_timeout_secs: Some(60),
            jpeg_quality: 90,
            canvas_dpi: 150,
            default_layout: PageSize::default(),
            trim_whitespace: false,
            data_dir: PathBuf::from("data"),
            canonical_scheme: "https".to_string(),
            site_url: None,
            ads_txt: None,
            static_dir: None,
            pdfium_lib_path: None,
            trust_forwarded_for: false,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dpi", &self.dpi)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_pages", &self.max_pages)
            .field("rasterize_timeout_secs", &self.rasterize_timeout_secs)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("canvas_dpi", &self.canvas_dpi)
            .field("default_layout", &self.default_layout)
            .field("trim_whitespace", &self.trim_whitespace)
            .field("data_dir", &self.data_dir)
            .field("site_url", &self.site_url)
            .field("ads_txt", &self.ads_txt.as_ref().map(|s| s.len()))
            .field("static_dir", &self.static_dir)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Request body cap: the per-file limit plus multipart framing headroom.
    pub fn max_request_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_add(64 * 1024)
    }

    /// Per-request conversion options seeded from this configuration.
    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            dpi: self.dpi,
            max_bytes: self.max_upload_bytes,
            max_pages: self.max_pages,
            jpeg_quality: self.jpeg_quality,
            layout: self.default_layout.policy(self.canvas_dpi),
            trim: self.trim_whitespace,
            rasterize_timeout_secs: self.rasterize_timeout_secs,
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    pub fn rasterize_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.rasterize_timeout_secs = secs.filter(|s| *s > 0);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn canvas_dpi(mut self, dpi: u32) -> Self {
        self.config.canvas_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn default_layout(mut self, layout: PageSize) -> Self {
        self.config.default_layout = layout;
        self
    }

    pub fn trim_whitespace(mut self, v: bool) -> Self {
        self.config.trim_whitespace = v;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn canonical_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.canonical_scheme = scheme.into();
        self
    }

    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.site_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn ads_txt(mut self, body: impl Into<String>) -> Self {
        self.config.ads_txt = Some(body.into());
        self
    }

    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.static_dir = Some(dir.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn trust_forwarded_for(mut self, v: bool) -> Self {
        self.config.trust_forwarded_for = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(ConfigError("max upload size must be > 0".into()));
        }
        if c.max_pages == 0 {
            return Err(ConfigError("max pages must be > 0".into()));
        }
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConfigError(format!("DPI must be 72–600, got {}", c.dpi)));
        }
        if c.canonical_scheme != "http" && c.canonical_scheme != "https" {
            return Err(ConfigError(format!(
                "canonical scheme must be 'http' or 'https', got '{}'",
                c.canonical_scheme
            )));
        }
        if let Some(ref url) = c.site_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError(format!(
                    "site URL must start with http:// or https://, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Per-request options ──────────────────────────────────────────────────

/// Options for a single conversion, derived from [`ServerConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Rasterisation DPI (PDF → images).
    pub dpi: u32,
    /// Largest accepted file, in bytes.
    pub max_bytes: usize,
    /// Most pages rasterised from one PDF.
    pub max_pages: usize,
    /// JPEG quality for encoded output.
    pub jpeg_quality: u8,
    /// Page layout (images → PDF).
    pub layout: LayoutPolicy,
    /// Trim uniform borders before composing (images → PDF).
    pub trim: bool,
    /// Rasterisation timeout.
    pub rasterize_timeout_secs: Option<u64>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ServerConfig::default().conversion_options()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the uploaded bytes are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A single PDF document.
    Pdf,
    /// One or more raster images.
    ImageSequence,
}

impl SourceKind {
    /// Lower-case extensions accepted for this source kind.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Pdf => &["pdf"],
            SourceKind::ImageSequence => {
                &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"]
            }
        }
    }

    /// Human-readable name used in rejection messages.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "PDF",
            SourceKind::ImageSequence => "image",
        }
    }
}

/// Output encoding of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetFormat {
    /// JPEG page images.
    #[default]
    Jpeg,
    /// PNG page images.
    Png,
    /// One paginated PDF document.
    Pdf,
}

impl TargetFormat {
    /// Parse the `format` form token accepted for page images.
    ///
    /// Only image formats are valid here; `pdf` is the fixed output of the
    /// reverse direction and is never requested by token.
    pub fn parse_image_token(token: &str) -> Result<Self, ValidationError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            _ => Err(ValidationError::UnsupportedFormat {
                format: token.to_string(),
            }),
        }
    }

    /// File extension used for entries/filenames.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::Pdf => "pdf",
        }
    }

}

/// Named page layouts selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// US Letter canvas (8.5 × 11 in), image fitted and centred. (default)
    #[default]
    Letter,
    /// ISO A4 canvas (210 × 297 mm), image fitted and centred.
    A4,
    /// No canvas: each page is sized to its image.
    Image,
}

impl PageSize {
    /// Parse the `layout` form token.
    pub fn parse(token: &str) -> Result<Self, ValidationError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PageSize::Letter),
            "a4" => Ok(PageSize::A4),
            "image" | "auto" | "fit" => Ok(PageSize::Image),
            _ => Err(ValidationError::UnsupportedLayout {
                layout: token.to_string(),
            }),
        }
    }

    /// Resolve into a concrete layout policy at the given canvas density.
    pub fn policy(&self, canvas_dpi: u32) -> LayoutPolicy {
        match self {
            PageSize::Letter => LayoutPolicy::FitToCanvas(CanvasLayout::letter(canvas_dpi)),
            PageSize::A4 => LayoutPolicy::FitToCanvas(CanvasLayout::a4(canvas_dpi)),
            PageSize::Image => LayoutPolicy::FitToImage { dpi: canvas_dpi },
        }
    }
}

/// A fixed page canvas in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasLayout {
    pub width_px: u32,
    pub height_px: u32,
    /// Pixel density used to map the canvas onto PDF points.
    pub dpi: u32,
    /// RGB fill behind the placed image.
    pub background: [u8; 3],
}

impl CanvasLayout {
    /// US Letter (8.5 × 11 in) on a white background.
    pub fn letter(dpi: u32) -> Self {
        Self::from_inches(8.5, 11.0, dpi)
    }

    /// ISO A4 (210 × 297 mm) on a white background.
    pub fn a4(dpi: u32) -> Self {
        Self::from_inches(210.0 / 25.4, 297.0 / 25.4, dpi)
    }

    fn from_inches(width_in: f64, height_in: f64, dpi: u32) -> Self {
        Self {
            width_px: (width_in * dpi as f64).round() as u32,
            height_px: (height_in * dpi as f64).round() as u32,
            dpi,
            background: [255, 255, 255],
        }
    }
}

/// How a source image becomes a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutPolicy {
    /// Scale to fit inside the canvas, preserving aspect ratio, and centre.
    FitToCanvas(CanvasLayout),
    /// Size the page to the (optionally trimmed) image.
    FitToImage { dpi: u32 },
}
