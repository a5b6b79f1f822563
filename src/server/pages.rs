//! Static-ish pages: upload forms, sitemap, robots and ads.txt.

use super::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};

/// Paths listed in the sitemap.
pub const SITEMAP_PATHS: &[&str] = &["/", "/jpg-to-pdf"];

const PAGE_STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:40rem;margin:3rem auto;padding:0 1rem}\
form{display:grid;gap:.75rem}nav a{margin-right:1rem}";

const INDEX_BODY: &str = r#"<h1>PDF to images</h1>
<form action="/convert" method="post" enctype="multipart/form-data">
  <input type="file" name="pdf" accept="application/pdf,.pdf" required>
  <label>Format
    <select name="format">
      <option value="jpg">JPG</option>
      <option value="png">PNG</option>
    </select>
  </label>
  <label>Resolution (DPI) <input type="number" name="dpi" min="72" max="600" placeholder="200"></label>
  <button type="submit">Convert</button>
</form>"#;

const JPG_TO_PDF_BODY: &str = r#"<h1>Images to PDF</h1>
<form action="/jpg-to-pdf" method="post" enctype="multipart/form-data">
  <input type="file" name="images[0]" accept="image/*" required>
  <input type="file" name="images[1]" accept="image/*">
  <input type="file" name="images[2]" accept="image/*">
  <input type="file" name="images[3]" accept="image/*">
  <label>Page size
    <select name="layout">
      <option value="letter">US Letter</option>
      <option value="a4">A4</option>
      <option value="image">Same as image</option>
    </select>
  </label>
  <label><input type="checkbox" name="trim" value="on"> Trim uniform borders</label>
  <button type="submit">Merge into PDF</button>
</form>"#;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n<body>\n\
<nav><a href=\"/\">PDF to images</a><a href=\"/jpg-to-pdf\">Images to PDF</a></nav>\n\
{body}\n</body>\n</html>\n"
    ))
}

/// Handler: GET /
pub async fn index() -> Html<String> {
    page("PDF to images", INDEX_BODY)
}

/// Handler: GET /jpg-to-pdf
pub async fn jpg_to_pdf_form() -> Html<String> {
    page("Images to PDF", JPG_TO_PDF_BODY)
}

/// Public base URL: configured `site_url`, else derived from `Host`.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config.site_url {
        return url.clone();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", state.config.canonical_scheme, host)
}

/// Handler: GET /sitemap.xml
pub async fn sitemap(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let base = base_url(&state, &headers);
    let today = chrono::Utc::now().date_naive();

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for path in SITEMAP_PATHS {
        xml.push_str(&format!(
            "  <url>\n    <loc>{}{}</loc>\n    <lastmod>{}</lastmod>\n  </url>\n",
            xml_escape(&base),
            path,
            today.format("%Y-%m-%d")
        ));
    }
    xml.push_str("</urlset>\n");

    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

/// Handler: GET /robots.txt
pub async fn robots(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let base = base_url(&state, &headers);
    let body = format!("User-agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n", base);
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Handler: GET /ads.txt
pub async fn ads_txt(State(state): State<AppState>) -> Response {
    match &state.config.ads_txt {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_xml() {
        assert_eq!(xml_escape("https://a.b/?x=1&y=<2>"), "https://a.b/?x=1&amp;y=&lt;2&gt;");
    }

    #[test]
    fn forms_post_to_their_routes() {
        assert!(INDEX_BODY.contains("action=\"/convert\""));
        assert!(INDEX_BODY.contains("name=\"pdf\""));
        assert!(JPG_TO_PDF_BODY.contains("name=\"images[0]\""));
        assert!(JPG_TO_PDF_BODY.contains("name=\"layout\""));
    }
}
