//! HTTP integration tests for img2doc.
//!
//! Each test runs the full router against a fresh temporary data directory
//! through `axum-test`. Image fixtures are generated in-process, so no
//! network access or checked-in binaries are needed.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use img2doc::{build_router, AppState, ServerConfig, ServerConfigBuilder};
use std::io::{Cursor, Read};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn server_with(
    configure: impl FnOnce(ServerConfigBuilder) -> ServerConfigBuilder,
) -> (TestServer, TempDir) {
    let tmp = TempDir::new().unwrap();
    let config = configure(ServerConfig::builder().data_dir(tmp.path()))
        .build()
        .unwrap();
    let state = AppState::from_config(&config).unwrap();
    let server = TestServer::new(build_router(state, &config)).unwrap();
    (server, tmp)
}

fn server() -> (TestServer, TempDir) {
    server_with(|b| b)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn jpeg(w: u32, h: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([30, 90, 200]))),
        ImageFormat::Jpeg,
    )
}

fn png(w: u32, h: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 200, 0, 128]))),
        ImageFormat::Png,
    )
}

fn image_part(bytes: Vec<u8>, name: &str, mime: &str) -> Part {
    Part::bytes(bytes).file_name(name).mime_type(mime)
}

/// Last path segment of a returned artifact URL.
fn id_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap()
}

fn media_boxes(pdf: &[u8]) -> Vec<(i64, i64)> {
    let doc = lopdf::Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
            (mb[2].as_i64().unwrap(), mb[3].as_i64().unwrap())
        })
        .collect()
}

// ── Greeting ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_returns_greeting() {
    let (server, _tmp) = server();

    let response = server.get("/").await;

    response.assert_status_ok();
    response.assert_text("Hello from converter server");
}

// ── PDF ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_round_trip_keeps_page_order_and_sizes() {
    let (server, tmp) = server();

    let form = MultipartForm::new()
        .add_part("images", image_part(jpeg(40, 30), "a.jpg", "image/jpeg"))
        .add_part("images", image_part(png(20, 50), "b.png", "image/png"));
    let response = server.post("/pdf").multipart(form).await;

    response.assert_status_ok();
    let url = response.text();
    assert!(url.starts_with("http://"), "got {url}");
    assert!(url.contains("/pdf/"), "got {url}");

    let id = id_of(&url);
    assert_eq!(id.len(), 8);
    assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert!(tmp.path().join("pdf").join(format!("{id}.pdf")).is_file());

    let download = server.get(&format!("/pdf/{id}")).await;
    download.assert_status_ok();
    assert_eq!(download.header("content-type"), "application/pdf");
    assert_eq!(
        download.header("content-disposition"),
        format!("attachment; filename=\"{id}.pdf\"").as_str()
    );

    let body = download.as_bytes();
    assert!(body.starts_with(b"%PDF"));
    assert_eq!(media_boxes(body), vec![(40, 30), (20, 50)]);
}

#[tokio::test]
async fn uploads_are_staged_under_sanitized_names() {
    let (server, tmp) = server();

    let form = MultipartForm::new().add_part(
        "images",
        image_part(jpeg(8, 8), "Đường Phố.jpg", "image/jpeg"),
    );
    server.post("/pdf").multipart(form).await.assert_status_ok();

    let staged: Vec<String> = std::fs::read_dir(tmp.path().join("files"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(staged.len(), 1);
    assert!(staged[0].ends_with("-duong-pho.jpg"), "got {:?}", staged);
}

#[tokio::test]
async fn non_image_upload_is_internal_error() {
    let (server, tmp) = server();

    let form = MultipartForm::new().add_part(
        "images",
        Part::text("plain words").file_name("notes.txt").mime_type("text/plain"),
    );
    let response = server.post("/pdf").multipart(form).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(std::fs::read_dir(tmp.path().join("pdf")).unwrap().count(), 0);
}

// ── ZIP ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn zip_entries_use_original_names() {
    let (server, _tmp) = server();

    let form = MultipartForm::new()
        .add_part("images", image_part(jpeg(10, 10), "Holiday Photo.jpg", "image/jpeg"))
        .add_part(
            "images",
            Part::bytes(b"hello".to_vec()).file_name("readme.txt").mime_type("text/plain"),
        );
    let response = server.post("/zip").multipart(form).await;
    response.assert_status_ok();
    let url = response.text();
    assert!(url.contains("/zip/"), "got {url}");

    let download = server.get(&format!("/zip/{}", id_of(&url))).await;
    download.assert_status_ok();
    assert_eq!(download.header("content-type"), "application/zip");

    let mut archive = zip::ZipArchive::new(Cursor::new(download.as_bytes().to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.by_index(0).unwrap().name(), "Holiday Photo.jpg");

    let mut text = String::new();
    archive
        .by_name("readme.txt")
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "hello");
}

#[tokio::test]
async fn zip_entries_never_escape_the_archive_root() {
    let (server, _tmp) = server();

    let form = MultipartForm::new()
        .add_part("images", image_part(png(4, 4), "../../x.png", "image/png"))
        .add_part("images", image_part(png(4, 4), "/etc/y.png", "image/png"));
    let response = server.post("/zip").multipart(form).await;
    response.assert_status_ok();

    let download = server.get(&format!("/zip/{}", id_of(&response.text()))).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(download.as_bytes().to_vec())).unwrap();

    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).unwrap();
        assert!(entry.enclosed_name().is_some(), "{} escapes", entry.name());
        names.push(entry.name().to_string());
    }
    assert_eq!(names, vec!["x.png", "etc/y.png"]);
}

// ── Client errors ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_files_is_bad_request() {
    let (server, _tmp) = server();

    for path in ["/pdf", "/zip"] {
        let text_only = MultipartForm::new().add_text("images", "not a file");
        let response = server.post(path).multipart(text_only).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_text("No file");

        let no_body = server.post(path).await;
        no_body.assert_status(StatusCode::BAD_REQUEST);
        no_body.assert_text("No file");
    }
}

#[tokio::test]
async fn unknown_identifiers_are_not_found() {
    let (server, _tmp) = server();

    for path in ["/pdf/zzzzzzzz", "/zip/zzzzzzzz", "/pdf/..%2Fsecret"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_text("File not found");
    }
}

#[tokio::test]
async fn identifiers_do_not_cross_namespaces() {
    let (server, _tmp) = server();

    let form = MultipartForm::new().add_part("images", image_part(png(4, 4), "x.png", "image/png"));
    let url = server.post("/zip").multipart(form).await.text();

    server
        .get(&format!("/pdf/{}", id_of(&url)))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn body_limit_rejects_large_uploads() {
    let (server, _tmp) = server_with(|b| b.body_limit(Some(1024)));

    let form = MultipartForm::new().add_part(
        "images",
        Part::bytes(vec![0u8; 64 * 1024]).file_name("big.png"),
    );
    let response = server.post("/pdf").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

// ── Downloads ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_downloads_return_identical_bytes() {
    let (server, _tmp) = server();

    let form = MultipartForm::new().add_part("images", image_part(jpeg(12, 9), "p.jpg", "image/jpeg"));
    let url = server.post("/pdf").multipart(form).await.text();
    let path = format!("/pdf/{}", id_of(&url));

    let first = server.get(&path).await;
    let second = server.get(&path).await;
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(
        first.header("content-length"),
        first.as_bytes().len().to_string().as_str()
    );
}

// ── Proxy headers + CORS ─────────────────────────────────────────────────────

#[tokio::test]
async fn forwarded_headers_shape_returned_url() {
    let (server, _tmp) = server();

    let form = MultipartForm::new().add_part("images", image_part(png(4, 4), "x.png", "image/png"));
    let response = server
        .post("/pdf")
        .add_header("x-forwarded-proto", "https")
        .add_header("x-forwarded-host", "conv.example.com")
        .multipart(form)
        .await;

    response.assert_status_ok();
    assert!(
        response.text().starts_with("https://conv.example.com/pdf/"),
        "got {}",
        response.text()
    );
}

#[tokio::test]
async fn forwarded_headers_ignored_when_proxy_untrusted() {
    let (server, _tmp) = server_with(|b| b.trust_proxy(false));

    let form = MultipartForm::new().add_part("images", image_part(png(4, 4), "x.png", "image/png"));
    let response = server
        .post("/zip")
        .add_header("x-forwarded-proto", "https")
        .add_header("x-forwarded-host", "conv.example.com")
        .multipart(form)
        .await;

    response.assert_status_ok();
    assert!(response.text().starts_with("http://"));
    assert!(!response.text().contains("conv.example.com"));
}

#[tokio::test]
async fn cors_reflects_request_origin() {
    let (server, _tmp) = server();

    let response = server
        .get("/")
        .add_header("origin", "https://app.example.org")
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.header("access-control-allow-origin"),
        "https://app.example.org"
    );
}
