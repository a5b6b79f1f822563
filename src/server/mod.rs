//! HTTP surface: routes, shared state and server startup.
//!
//! ```text
//! GET  /              PDF → images form
//! POST /convert       PDF → zip of page images
//! GET  /jpg-to-pdf    images → PDF form
//! POST /jpg-to-pdf    images → merged PDF
//! GET  /rate          rating summary
//! POST /rate          cast a vote (one per client per UTC day)
//! GET  /health        liveness
//! GET  /sitemap.xml, /robots.txt, /ads.txt, /static/*
//! ```
//!
//! Layers, outermost first: request tracing, `www.` → apex redirect, request
//! body limit. The body limit sits a little above the per-file limit to
//! leave room for multipart framing; per-file sizes are enforced while the
//! form is read.

pub mod canonical;
pub mod error;
pub mod handlers;
pub mod i18n;
pub mod pages;

use crate::config::ServerConfig;
use crate::error::RatingError;
use crate::pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
use crate::rating::RatingStore;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub ratings: Arc<RatingStore>,
}

impl AppState {
    /// Build state, opening the rating store under `config.data_dir`.
    pub fn new(
        config: ServerConfig,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Result<Self, RatingError> {
        let ratings = RatingStore::open(&config.data_dir)?;
        Ok(Self {
            config: Arc::new(config),
            rasterizer,
            ratings: Arc::new(ratings),
        })
    }

    /// Build state with a pdfium rasteriser bound per `config.pdfium_lib_path`.
    pub fn from_config(config: ServerConfig) -> Result<Self, RatingError> {
        let rasterizer = match config.pdfium_lib_path {
            Some(ref path) => {
                info!("Using pdfium library at {}", path.display());
                PdfiumRasterizer::with_library(path)
            }
            None => PdfiumRasterizer::new(),
        };
        Self::new(config, Arc::new(rasterizer))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_request_bytes();

    let mut app = Router::new()
        // Pages
        .route("/", get(pages::index))
        .route("/sitemap.xml", get(pages::sitemap))
        .route("/robots.txt", get(pages::robots))
        .route("/ads.txt", get(pages::ads_txt))
        // Conversion
        .route("/convert", post(handlers::convert_pdf))
        .route(
            "/jpg-to-pdf",
            get(pages::jpg_to_pdf_form).post(handlers::jpg_to_pdf),
        )
        // Rating
        .route(
            "/rate",
            get(handlers::rating_summary).post(handlers::rate),
        )
        // Health check
        .route("/health", get(handlers::health));

    if let Some(dir) = &state.config.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            canonical::redirect_www,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.host:config.port` and serve until the process is stopped.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", listener.local_addr()?);
    info!(
        "Upload limit: {} bytes per file, {} per request",
        state.config.max_upload_bytes,
        state.config.max_request_bytes()
    );

    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
