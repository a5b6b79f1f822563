//! Canonical host: `www.` requests are redirected to the apex domain.

use super::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

/// Middleware: answer `301` for any `Host: www.*`, keeping path and query.
pub async fn redirect_www(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let apex = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(apex_host)
        .map(str::to_string);

    let Some(apex) = apex else {
        return next.run(req).await;
    };

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = canonical_url(&state.config.canonical_scheme, &apex, path_and_query);
    debug!("Redirecting www host to {}", target);

    match HeaderValue::from_str(&target) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// The apex of a `www.` host; `None` for other hosts or a bare `www.`.
fn apex_host(host: &str) -> Option<&str> {
    host.strip_prefix("www.").filter(|h| !h.is_empty())
}

fn canonical_url(scheme: &str, host: &str, path_and_query: &str) -> String {
    format!("{}://{}{}", scheme, host, path_and_query)
}
