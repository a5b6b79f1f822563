//! Route handlers.
//!
//! Conversion handlers read the whole multipart body into [`UploadForm`],
//! build a validated [`ConversionRequest`] and hand it to the orchestrator.
//! The rating handlers are thin JSON wrappers around [`RatingStore`].
//!
//! [`RatingStore`]: crate::rating::RatingStore

use super::error::ApiError;
use super::i18n;
use super::AppState;
use crate::config::{ConversionOptions, PageSize};
use crate::convert::{convert, Stage};
use crate::error::{ConvertError, RatingError, ValidationError};
use crate::output::ConversionResult;
use crate::pipeline::negotiate::{ConversionRequest, UploadedFile};
use crate::rating::RatingSnapshot;
use axum::{
    extract::{multipart::Field, ConnectInfo, Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{debug, info};

// ── Multipart ────────────────────────────────────────────────────────────

/// A fully buffered multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    /// File parts, in arrival order.
    pub files: Vec<UploadedFile>,
    /// Text fields; later duplicates win.
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Remove and return the first file part named `name`.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let pos = self.files.iter().position(|f| f.field == name)?;
        Some(self.files.remove(pos))
    }
}

/// Read every part of `multipart` into memory.
///
/// A file part growing past `max_bytes` aborts the read with
/// [`ValidationError::TooLarge`] without buffering the rest of it.
pub async fn read_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<UploadForm, ValidationError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let bytes = read_file_part(field, max_bytes).await?;
                debug!("Multipart file '{}' = '{}' ({} bytes)", name, filename, bytes.len());
                form.files.push(UploadedFile::new(name, filename, bytes));
            }
            None => {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}

async fn read_file_part(mut field: Field<'_>, max_bytes: usize) -> Result<Vec<u8>, ValidationError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(ValidationError::TooLarge {
                size: bytes.len() + chunk.len(),
                max: max_bytes,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ValidationError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::RequestTooLarge { max: 0 }
    } else {
        ValidationError::MalformedUpload(e.body_text())
    }
}

// ── Conversion routes ────────────────────────────────────────────────────

/// Handler: POST /convert
///
/// Fields: `pdf` (file), `format` (`jpg`|`jpeg`|`png`), optional `dpi`.
pub async fn convert_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ConvertError> {
    debug!(stage = %Stage::Received, "POST /convert");
    let mut form = read_form(multipart, state.config.max_upload_bytes)
        .await
        .map_err(|e| with_request_limit(e, &state))?;

    let mut options = state.config.conversion_options();
    if let Some(dpi) = form.field("dpi").filter(|v| !v.trim().is_empty()) {
        options.dpi = parse_dpi(dpi)?;
    }

    let pdf = form.take_file("pdf");
    let request = ConversionRequest::pdf_to_images(pdf, form.field("format"), options)?;
    let result = convert(request, state.rasterizer.clone()).await?;
    Ok(download(result))
}

/// Handler: POST /jpg-to-pdf
///
/// Fields: `images[N]` (files), optional `layout` (`letter`|`a4`|`image`)
/// and `trim`.
pub async fn jpg_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ConvertError> {
    debug!(stage = %Stage::Received, "POST /jpg-to-pdf");
    let form = read_form(multipart, state.config.max_upload_bytes)
        .await
        .map_err(|e| with_request_limit(e, &state))?;

    let options = image_options(&form, state.config.conversion_options(), state.config.canvas_dpi)?;
    let request = ConversionRequest::images_to_pdf(form.files, options)?;
    let result = convert(request, state.rasterizer.clone()).await?;
    Ok(download(result))
}

/// Apply the `layout` and `trim` form fields.
fn image_options(
    form: &UploadForm,
    mut options: ConversionOptions,
    canvas_dpi: u32,
) -> Result<ConversionOptions, ValidationError> {
    if let Some(layout) = form.field("layout").filter(|v| !v.trim().is_empty()) {
        options.layout = PageSize::parse(layout)?.policy(canvas_dpi);
    }
    if let Some(trim) = form.field("trim") {
        options.trim = is_truthy(trim);
    }
    Ok(options)
}

fn parse_dpi(raw: &str) -> Result<u32, ValidationError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|dpi| (72..=600).contains(dpi))
        .ok_or_else(|| ValidationError::InvalidOption {
            option: "dpi".to_string(),
            value: raw.to_string(),
        })
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

fn with_request_limit(e: ValidationError, state: &AppState) -> ValidationError {
    match e {
        ValidationError::RequestTooLarge { .. } => ValidationError::RequestTooLarge {
            max: state.config.max_request_bytes(),
        },
        other => other,
    }
}

/// Attachment response for a finished conversion.
fn download(result: ConversionResult) -> Response {
    debug!(
        stage = %Stage::Responded,
        "Sending {} ({} bytes)",
        result.suggested_filename,
        result.payload.len()
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, result.mime_type.to_string()),
            (header::CONTENT_DISPOSITION, result.content_disposition()),
        ],
        result.payload,
    )
        .into_response()
}

// ── Rating ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    #[serde(default)]
    pub lang: Option<String>,
}

/// Handler: GET /rate
pub async fn rating_summary(State(state): State<AppState>) -> Result<Json<RatingSnapshot>, ApiError> {
    Ok(Json(state.ratings.summary().await?))
}

/// Handler: POST /rate
pub async fn rate(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<LangQuery>,
    headers: HeaderMap,
    payload: Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<RatingSnapshot>, ApiError> {
    let Json(body) = payload.map_err(|e| {
        ApiError::InvalidRequest(format!("Invalid rating payload: {}", e.body_text()))
    })?;

    let client = client_id(&state, connect, &headers);
    let today = chrono::Utc::now().date_naive();

    match state.ratings.record_vote(&client, body.rating, today).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(RatingError::AlreadyVotedToday) => {
            let lang = i18n::negotiate(query.lang.as_deref(), &headers);
            Err(ApiError::AlreadyVoted(lang.already_voted().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Identify the voter: first `X-Forwarded-For` hop when trusted, else the
/// peer address.
fn client_id(
    state: &AppState,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: &HeaderMap,
) -> String {
    if state.config.trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    connect
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ── Health ───────────────────────────────────────────────────────────────

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    info!("Health check");
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
