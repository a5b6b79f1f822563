//! CLI binary for pagecraft.
//!
//! A thin shim over the library crate: `serve` runs the web service, the
//! other subcommands run one conversion locally and write the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pagecraft::{
    convert_blocking, serve, AppState, ConversionOptions, ConversionRequest, PageSize,
    PdfiumRasterizer, ServerConfig, UploadedFile,
};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the web service on port 8080, storing ratings in /var/lib/pagecraft
  pagecraft serve --port 8080 --data-dir /var/lib/pagecraft

  # Every page of a PDF as PNG files in a zip
  pagecraft pdf-to-images report.pdf -o report_pages.zip --format png --dpi 150

  # Merge photos into one A4 PDF, trimming white borders
  pagecraft images-to-pdf scan1.jpg scan2.jpg -o scans.pdf --layout a4 --trim

ENVIRONMENT VARIABLES:
  PAGECRAFT_HOST, PAGECRAFT_PORT        Bind address
  PAGECRAFT_DPI                         Default rasterisation DPI
  PAGECRAFT_MAX_UPLOAD_BYTES            Per-file upload limit
  PAGECRAFT_MAX_PAGES                   Largest PDF (in pages) the server renders
  PAGECRAFT_DATA_DIR                    Rating store directory
  PAGECRAFT_PDFIUM_LIB                  Path to libpdfium (else system library)
  RUST_LOG                              Overrides -v / -q log filtering
"#;

/// Convert PDFs to page images and images to PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pagecraft",
    version,
    about = "Convert PDFs to page images and images to PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to libpdfium. Defaults to ./ then the system library.
    #[arg(long, global = true, env = "PAGECRAFT_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAGECRAFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAGECRAFT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Render every page of a PDF into a zip of images.
    PdfToImages(PdfToImagesArgs),
    /// Merge images into one PDF, one page per image.
    ImagesToPdf(ImagesToPdfArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host address to bind to.
    #[arg(long, env = "PAGECRAFT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PAGECRAFT_PORT", default_value_t = 5000)]
    port: u16,

    /// Rendering DPI for uploaded PDFs (72–600).
    #[arg(long, env = "PAGECRAFT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Largest accepted file, in bytes.
    #[arg(long, env = "PAGECRAFT_MAX_UPLOAD_BYTES", default_value_t = pagecraft::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Largest PDF, in pages, the server will render.
    #[arg(long, env = "PAGECRAFT_MAX_PAGES", default_value_t = pagecraft::config::DEFAULT_MAX_PAGES)]
    max_pages: usize,

    /// Rasterisation timeout in seconds; 0 disables it.
    #[arg(long, env = "PAGECRAFT_RASTERIZE_TIMEOUT", default_value_t = 60)]
    rasterize_timeout: u64,

    /// JPEG quality (1–100).
    #[arg(long, env = "PAGECRAFT_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Default page size for images → PDF.
    #[arg(long, env = "PAGECRAFT_LAYOUT", value_enum, default_value = "letter")]
    layout: LayoutArg,

    /// Trim uniform borders by default.
    #[arg(long, env = "PAGECRAFT_TRIM")]
    trim: bool,

    /// Directory for the rating documents.
    #[arg(long, env = "PAGECRAFT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Scheme for `www.` → apex redirects.
    #[arg(long, env = "PAGECRAFT_CANONICAL_SCHEME", default_value = "https")]
    canonical_scheme: String,

    /// Public base URL used in sitemap.xml and robots.txt.
    #[arg(long, env = "PAGECRAFT_SITE_URL")]
    site_url: Option<String>,

    /// File whose contents are served at /ads.txt.
    #[arg(long, env = "PAGECRAFT_ADS_TXT")]
    ads_txt: Option<PathBuf>,

    /// Directory served under /static.
    #[arg(long, env = "PAGECRAFT_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Identify voters by the first X-Forwarded-For hop.
    #[arg(long, env = "PAGECRAFT_TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,
}

#[derive(Args, Debug)]
struct PdfToImagesArgs {
    /// Input PDF file.
    input: PathBuf,

    /// Output zip path. Default: `<stem>_pages.zip` next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image format inside the archive.
    #[arg(long, default_value = "jpg")]
    format: String,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PAGECRAFT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,
}

#[derive(Args, Debug)]
struct ImagesToPdfArgs {
    /// Input images, in page order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF path.
    #[arg(short, long, default_value = "merged_output.pdf")]
    output: PathBuf,

    /// Page size.
    #[arg(long, value_enum, default_value = "letter")]
    layout: LayoutArg,

    /// Trim uniform borders before placing each image.
    #[arg(long)]
    trim: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Letter,
    A4,
    Image,
}

impl From<LayoutArg> for PageSize {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::Letter => PageSize::Letter,
            LayoutArg::A4 => PageSize::A4,
            LayoutArg::Image => PageSize::Image,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let rasterizer = match cli.pdfium_lib {
        Some(ref path) => PdfiumRasterizer::with_library(path),
        None => PdfiumRasterizer::new(),
    };

    match cli.command {
        Command::Serve(ref args) => run_server(args, &cli).await,
        Command::PdfToImages(ref args) => {
            tokio::task::block_in_place(|| pdf_to_images(args, &cli, &rasterizer))
        }
        Command::ImagesToPdf(ref args) => {
            tokio::task::block_in_place(|| images_to_pdf(args, &cli, &rasterizer))
        }
    }
}

async fn run_server(args: &ServeArgs, cli: &Cli) -> Result<()> {
    let mut builder = ServerConfig::builder()
        .host(args.host.clone())
        .port(args.port)
        .dpi(args.dpi)
        .max_upload_bytes(args.max_upload_bytes)
        .max_pages(args.max_pages)
        .rasterize_timeout_secs(Some(args.rasterize_timeout))
        .jpeg_quality(args.jpeg_quality)
        .default_layout(args.layout.into())
        .trim_whitespace(args.trim)
        .data_dir(args.data_dir.clone())
        .canonical_scheme(args.canonical_scheme.clone())
        .trust_forwarded_for(args.trust_forwarded_for);

    if let Some(ref url) = args.site_url {
        builder = builder.site_url(url.clone());
    }
    if let Some(ref path) = args.ads_txt {
        let body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read ads.txt from {:?}", path))?;
        builder = builder.ads_txt(body);
    }
    if let Some(ref dir) = args.static_dir {
        builder = builder.static_dir(dir.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }

    let config = builder.build().context("Invalid server configuration")?;
    info!("Starting pagecraft on {}:{}", config.host, config.port);

    let state = AppState::from_config(config).context("Failed to open rating store")?;
    serve(state).await.context("Server error")?;
    Ok(())
}

fn pdf_to_images(args: &PdfToImagesArgs, cli: &Cli, rasterizer: &PdfiumRasterizer) -> Result<()> {
    let start = Instant::now();
    let upload = read_upload(&args.input, "pdf")?;

    let mut options = local_options();
    options.dpi = args.dpi;
    let request = ConversionRequest::pdf_to_images(Some(upload), Some(&args.format), options)
        .context("Invalid input")?;
    if !cli.quiet {
        eprintln!("{} {} at {} DPI", dim("◆"), args.input.display(), args.dpi);
    }

    let result = convert_blocking(request, rasterizer).context("Conversion failed")?;

    let output = match args.output {
        Some(ref p) => p.clone(),
        None => args.input.with_file_name(&result.suggested_filename),
    };
    std::fs::write(&output, &result.payload)
        .with_context(|| format!("Failed to write {:?}", output))?;

    if !cli.quiet {
        eprintln!(
            "{} {} pages  {}ms  →  {}",
            green("✔"),
            result.page_count,
            start.elapsed().as_millis(),
            bold(&output.display().to_string())
        );
    }
    Ok(())
}

fn images_to_pdf(args: &ImagesToPdfArgs, cli: &Cli, rasterizer: &PdfiumRasterizer) -> Result<()> {
    let start = Instant::now();
    let uploads = args
        .inputs
        .iter()
        .enumerate()
        .map(|(i, path)| read_upload(path, &format!("images[{i}]")))
        .collect::<Result<Vec<_>>>()?;

    let mut options = local_options();
    options.layout = PageSize::from(args.layout).policy(ServerConfig::default().canvas_dpi);
    options.trim = args.trim;

    let request = ConversionRequest::images_to_pdf(uploads, options).context("Invalid input")?;
    let result = convert_blocking(request, rasterizer).context("Conversion failed")?;

    std::fs::write(&args.output, &result.payload)
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    if !cli.quiet {
        eprintln!(
            "{} {} pages  {}ms  →  {}",
            green("✔"),
            result.page_count,
            start.elapsed().as_millis(),
            bold(&args.output.display().to_string())
        );
    }
    Ok(())
}

/// Options for local files: server defaults without the upload or page caps.
fn local_options() -> ConversionOptions {
    ConversionOptions {
        max_bytes: usize::MAX,
        max_pages: usize::MAX,
        rasterize_timeout_secs: None,
        ..ServerConfig::default().conversion_options()
    }
}

/// Read a local file as if it had been uploaded in form field `field`.
fn read_upload(path: &Path, field: &str) -> Result<UploadedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("Input path {:?} has no usable file name", path);
    };
    Ok(UploadedFile::new(field, filename, bytes))
}
