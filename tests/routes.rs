//! HTTP endpoint integration tests using axum-test.
//!
//! A fake rasteriser stands in for pdfium, so these run without a native
//! library. Voters are told apart by `X-Forwarded-For`, which the test
//! servers trust.

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use image::{DynamicImage, Rgb, RgbImage};
use pagecraft::{
    router, AppState, ConversionError, PageImage, PageRasterizer, ServerConfig, ServerConfigBuilder,
};
use serde_json::json;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Fake rasteriser: `pages` pages of 20×(10 + index) px, counting renders.
struct FakeRasterizer {
    pages: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            pages: 1,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageRasterizer for FakeRasterizer {
    fn rasterize(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<PageImage>, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ConversionError::CorruptPdf {
                detail: "xref table missing".into(),
            });
        }
        Ok((0..self.pages)
            .map(|i| {
                let img = RgbImage::from_pixel(20, 10 + i as u32, Rgb([255, 255, 255]));
                PageImage::new(i, DynamicImage::ImageRgb8(img))
            })
            .collect())
    }

    fn page_count(&self, _pdf: &[u8]) -> Result<usize, ConversionError> {
        Ok(self.pages)
    }
}

/// A test server plus the data dir backing its rating store.
struct Harness {
    server: TestServer,
    _data: TempDir,
}

fn create_test_server_with(
    rasterizer: Arc<FakeRasterizer>,
    configure: impl FnOnce(ServerConfigBuilder) -> ServerConfigBuilder,
) -> Harness {
    let data = TempDir::new().unwrap();
    let config = configure(
        ServerConfig::builder()
            .data_dir(data.path())
            .trust_forwarded_for(true),
    )
    .build()
    .unwrap();
    let state = AppState::new(config, rasterizer).unwrap();
    Harness {
        server: TestServer::new(router(state)).unwrap(),
        _data: data,
    }
}

fn create_test_server(rasterizer: Arc<FakeRasterizer>) -> Harness {
    create_test_server_with(rasterizer, |b| b)
}

fn file(bytes: Vec<u8>, filename: &str) -> Part {
    Part::bytes(bytes)
        .file_name(filename)
        .mime_type("application/octet-stream")
}

fn voter(ip: &'static str) -> HeaderValue {
    HeaderValue::from_static(ip)
}

fn fake_pdf() -> Vec<u8> {
    b"%PDF-1.7\n% fake body\n%%EOF\n".to_vec()
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([30, 60, 90])))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn image_widths(pdf: &[u8]) -> Vec<i64> {
    let doc = lopdf::Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
            let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
            stream.dict.get(b"Width").unwrap().as_i64().unwrap()
        })
        .collect()
}

// ── PDF → images ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_page_pdf_to_png_archive() {
    let rasterizer = FakeRasterizer::new(2);
    let h = create_test_server(rasterizer.clone());

    let form = MultipartForm::new()
        .add_part("pdf", file(fake_pdf(), "report.pdf"))
        .add_text("format", "png");
    let response = h.server.post("/convert").multipart(form).await;

    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "application/zip");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "attachment; filename=\"report_pages.zip\""
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
    for i in 0..2 {
        let mut entry = archive.by_index(i).unwrap();
        assert_eq!(entry.name(), format!("page_{}.png", i + 1));
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        let img = image::load_from_memory(&data).unwrap();
        assert_eq!(img.height(), 10 + i as u32);
    }
    assert_eq!(rasterizer.calls(), 1);
}

#[tokio::test]
async fn test_jpeg_alias_and_dpi_field() {
    let h = create_test_server(FakeRasterizer::new(1));
    let form = MultipartForm::new()
        .add_part("pdf", file(fake_pdf(), "a.pdf"))
        .add_text("format", "JPEG")
        .add_text("dpi", "150");
    let response = h.server.post("/convert").multipart(form).await;

    response.assert_status_ok();
    let mut archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), "page_1.jpg");
}

#[tokio::test]
async fn test_missing_format_is_bad_request() {
    let rasterizer = FakeRasterizer::new(1);
    let h = create_test_server(rasterizer.clone());
    let form = MultipartForm::new().add_part("pdf", file(fake_pdf(), "a.pdf"));
    let response = h.server.post("/convert").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("format"));
    assert_eq!(rasterizer.calls(), 0);
}

#[tokio::test]
async fn test_missing_pdf_and_wrong_type_are_bad_requests() {
    let h = create_test_server(FakeRasterizer::new(1));

    let form = MultipartForm::new().add_text("format", "png");
    let response = h.server.post("/convert").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let form = MultipartForm::new()
        .add_part("pdf", file(b"GIF89a....".to_vec(), "a.pdf"))
        .add_text("format", "png");
    let response = h.server.post("/convert").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("not a valid PDF"));

    let form = MultipartForm::new()
        .add_part("pdf", file(fake_pdf(), "a.pdf"))
        .add_text("format", "gif");
    let response = h.server.post("/convert").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pdf_header_after_leading_bytes_is_accepted() {
    let h = create_test_server(FakeRasterizer::new(1));
    let mut bytes = b"\r\n\r\n".to_vec();
    bytes.extend_from_slice(&fake_pdf());

    let form = MultipartForm::new()
        .add_part("pdf", file(bytes, "padded.pdf"))
        .add_text("format", "png");
    h.server.post("/convert").multipart(form).await.assert_status_ok();
}

#[tokio::test]
async fn test_oversize_file_is_rejected_before_rasterisation() {
    let rasterizer = FakeRasterizer::new(1);
    let h = create_test_server_with(rasterizer.clone(), |b| b.max_upload_bytes(1024));

    let mut big = fake_pdf();
    big.resize(4096, b' ');
    let form = MultipartForm::new()
        .add_part("pdf", file(big, "big.pdf"))
        .add_text("format", "png");
    let response = h.server.post("/convert").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(rasterizer.calls(), 0);
}

#[tokio::test]
async fn test_oversize_body_is_rejected() {
    let rasterizer = FakeRasterizer::new(1);
    let h = create_test_server_with(rasterizer.clone(), |b| b.max_upload_bytes(1024));

    let mut big = fake_pdf();
    big.resize(200 * 1024, b' ');
    let form = MultipartForm::new()
        .add_part("pdf", file(big, "big.pdf"))
        .add_text("format", "png");
    let response = h.server.post("/convert").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(rasterizer.calls(), 0);
}

#[tokio::test]
async fn test_too_many_pages_is_rejected_before_rendering() {
    let rasterizer = FakeRasterizer::new(12);
    let h = create_test_server_with(rasterizer.clone(), |b| b.max_pages(10));

    let form = MultipartForm::new()
        .add_part("pdf", file(fake_pdf(), "long.pdf"))
        .add_text("format", "jpg");
    let response = h.server.post("/convert").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "PDF has 12 pages (maximum is 10)");
    assert_eq!(rasterizer.calls(), 0);
}

#[tokio::test]
async fn test_rasterisation_failure_is_server_error() {
    let h = create_test_server(FakeRasterizer::failing());
    let form = MultipartForm::new()
        .add_part("pdf", file(fake_pdf(), "a.pdf"))
        .add_text("format", "png");
    let response = h.server.post("/convert").multipart(form).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let text = response.text();
    assert!(text.starts_with("An error occurred: "), "got: {text}");
    assert!(text.contains("xref table missing"));
}

// ── Images → PDF ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_images_make_three_pages() {
    let h = create_test_server(FakeRasterizer::new(0));
    let form = MultipartForm::new()
        .add_part("images[1]", file(png(10, 40), "b.png"))
        .add_part("images[0]", file(png(40, 10), "a.png"))
        .add_part("images[2]", file(png(25, 25), "c.png"))
        .add_text("layout", "image");
    let response = h.server.post("/jpg-to-pdf").multipart(form).await;

    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "application/pdf");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "attachment; filename=\"merged_output.pdf\""
    );
    assert_eq!(image_widths(response.as_bytes()), vec![40, 10, 25]);
}

#[tokio::test]
async fn test_letter_layout_is_default() {
    let h = create_test_server(FakeRasterizer::new(0));
    let form = MultipartForm::new().add_part("images[0]", file(png(200, 100), "a.png"));
    let response = h.server.post("/jpg-to-pdf").multipart(form).await;
    response.assert_status_ok();

    let doc = lopdf::Document::load_mem(response.as_bytes()).unwrap();
    let first = *doc.get_pages().get(&1).unwrap();
    let media_box: Vec<f32> = doc
        .get_dictionary(first)
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o.as_float().unwrap())
        .collect();
    assert!((media_box[2] - 612.0).abs() < 0.01);
    assert!((media_box[3] - 792.0).abs() < 0.01);
}

#[tokio::test]
async fn test_no_images_is_bad_request() {
    let h = create_test_server(FakeRasterizer::new(0));
    let form = MultipartForm::new().add_text("layout", "a4");
    let response = h.server.post("/jpg-to-pdf").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "No images uploaded");
}

#[tokio::test]
async fn test_undecodable_image_is_server_error() {
    let h = create_test_server(FakeRasterizer::new(0));
    let form = MultipartForm::new()
        .add_part("images[0]", file(png(5, 5), "a.png"))
        .add_part("images[1]", file(b"definitely not a jpeg".to_vec(), "b.jpg"));
    let response = h.server.post("/jpg-to-pdf").multipart(form).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().starts_with("An error occurred: "));
}

#[tokio::test]
async fn test_upload_forms_are_served() {
    let h = create_test_server(FakeRasterizer::new(0));

    let response = h.server.get("/").await;
    response.assert_status_ok();
    assert!(response.text().contains("action=\"/convert\""));

    let response = h.server.get("/jpg-to-pdf").await;
    response.assert_status_ok();
    assert!(response.text().contains("images[0]"));
}

// ── Rating ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rating_round_trip_and_duplicate_vote() {
    let h = create_test_server(FakeRasterizer::new(0));

    let response = h.server.get("/rate").await;
    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 0);
    assert_eq!(json["average"], 0.0);

    let response = h
        .server
        .post("/rate")
        .add_header(FORWARDED_FOR, voter("203.0.113.7"))
        .json(&json!({ "rating": 4 }))
        .await;
    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 1);
    assert_eq!(json["average"], 4.0);

    let response = h
        .server
        .post("/rate")
        .add_header(FORWARDED_FOR, voter("203.0.113.7"))
        .json(&json!({ "rating": 5 }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], 403);
    assert!(json["error"].as_str().unwrap().contains("already rated"));

    let response = h
        .server
        .post("/rate")
        .add_header(FORWARDED_FOR, voter("203.0.113.8"))
        .json(&json!({ "rating": 2 }))
        .await;
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 2);
    assert_eq!(json["average"], 3.0);
}

#[tokio::test]
async fn test_duplicate_vote_message_is_localised() {
    let h = create_test_server(FakeRasterizer::new(0));
    let vote = || {
        h.server
            .post("/rate")
            .add_header(FORWARDED_FOR, voter("203.0.113.9"))
            .json(&json!({ "rating": 3 }))
    };
    vote().await.assert_status_ok();

    let response = vote().add_query_param("lang", "es").await;
    response.assert_status(StatusCode::FORBIDDEN);
    let json = response.json::<serde_json::Value>();
    assert!(json["error"].as_str().unwrap().contains("Ya has votado"));

    let response = vote()
        .add_header(header::COOKIE, HeaderValue::from_static("lang=fr"))
        .await;
    let json = response.json::<serde_json::Value>();
    assert!(json["error"].as_str().unwrap().contains("déjà voté"));

    let response = vote().add_query_param("lang", "xx").await;
    let json = response.json::<serde_json::Value>();
    assert!(json["error"].as_str().unwrap().contains("already rated"));
}

#[tokio::test]
async fn test_invalid_ratings_are_bad_requests() {
    let h = create_test_server(FakeRasterizer::new(0));
    for payload in [json!({ "rating": 7 }), json!({ "rating": 0 }), json!({ "rating": "five" })] {
        let response = h.server.post("/rate").json(&payload).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["status"], 400, "payload: {payload}");
    }

    let response = h
        .server
        .post("/rate")
        .bytes("not json".into())
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<serde_json::Value>()["status"], 400);
}

#[tokio::test]
async fn test_first_forwarded_hop_identifies_voter() {
    let h = create_test_server(FakeRasterizer::new(0));

    h.server
        .post("/rate")
        .add_header(FORWARDED_FOR, voter("198.51.100.4, 10.0.0.1"))
        .json(&json!({ "rating": 5 }))
        .await
        .assert_status_ok();

    // Same client behind a different proxy.
    h.server
        .post("/rate")
        .add_header(FORWARDED_FOR, voter("198.51.100.4, 10.0.0.2"))
        .json(&json!({ "rating": 5 }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    h.server
        .post("/rate")
        .add_header(FORWARDED_FOR, voter("198.51.100.9"))
        .json(&json!({ "rating": 5 }))
        .await
        .assert_status_ok();
}

// ── Site plumbing ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_www_host_redirects_to_apex() {
    let h = create_test_server(FakeRasterizer::new(0));
    let response = h
        .server
        .get("/jpg-to-pdf")
        .add_query_param("lang", "de")
        .add_header(header::HOST, HeaderValue::from_static("www.example.com"))
        .await;

    response.assert_status(StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.header(header::LOCATION),
        "https://example.com/jpg-to-pdf?lang=de"
    );
}

#[tokio::test]
async fn test_bare_www_host_is_not_redirected() {
    let h = create_test_server(FakeRasterizer::new(0));
    let response = h
        .server
        .get("/health")
        .add_header(header::HOST, HeaderValue::from_static("www."))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_robots_and_sitemap_use_site_url() {
    let h = create_test_server_with(FakeRasterizer::new(0), |b| {
        b.site_url("https://pages.example.org/")
    });

    let response = h.server.get("/robots.txt").await;
    response.assert_status_ok();
    assert!(response
        .text()
        .contains("Sitemap: https://pages.example.org/sitemap.xml"));

    let response = h.server.get("/sitemap.xml").await;
    assert_eq!(response.header(header::CONTENT_TYPE), "application/xml");
    let xml = response.text();
    assert!(xml.contains("<loc>https://pages.example.org/</loc>"));
    assert!(xml.contains("<loc>https://pages.example.org/jpg-to-pdf</loc>"));
}

#[tokio::test]
async fn test_sitemap_falls_back_to_host_header() {
    let h = create_test_server(FakeRasterizer::new(0));
    let response = h
        .server
        .get("/sitemap.xml")
        .add_header(header::HOST, HeaderValue::from_static("example.com"))
        .await;
    assert!(response.text().contains("<loc>https://example.com/</loc>"));
}

#[tokio::test]
async fn test_ads_txt_only_when_configured() {
    let h = create_test_server(FakeRasterizer::new(0));
    h.server
        .get("/ads.txt")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let h = create_test_server_with(FakeRasterizer::new(0), |b| {
        b.ads_txt("google.com, pub-0000000000000000, DIRECT\n")
    });
    let response = h.server.get("/ads.txt").await;
    response.assert_status_ok();
    assert!(response.text().starts_with("google.com"));
}

#[tokio::test]
async fn test_static_files_are_served_from_configured_dir() {
    let assets = TempDir::new().unwrap();
    std::fs::write(assets.path().join("app.css"), "body{}").unwrap();
    let dir = assets.path().to_path_buf();
    let h = create_test_server_with(FakeRasterizer::new(0), move |b| b.static_dir(dir));

    let response = h.server.get("/static/app.css").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "body{}");
    h.server
        .get("/static/missing.css")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_returns_200() {
    let h = create_test_server(FakeRasterizer::new(0));
    let response = h.server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "pagecraft");
}
