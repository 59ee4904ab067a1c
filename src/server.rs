//! HTTP endpoint layer.
//!
//! | Method | Path         | Result                                   |
//! |--------|--------------|------------------------------------------|
//! | GET    | `/`          | fixed greeting                           |
//! | POST   | `/pdf`       | absolute URL of a new PDF artifact       |
//! | GET    | `/pdf/{id}`  | the PDF as an attachment                 |
//! | POST   | `/zip`       | absolute URL of a new ZIP artifact       |
//! | GET    | `/zip/{id}`  | the ZIP as an attachment                 |
//!
//! Uploads are multipart bodies with one or more files in the `images`
//! field. Each handler returns a single `Result`, converted to exactly one
//! response by [`ConverterError`]'s `IntoResponse`.

use crate::config::ServerConfig;
use crate::convert::{convert_to_pdf, convert_to_zip};
use crate::error::ConverterError;
use crate::pipeline::stage::{StagedFile, UploadStager};
use crate::store::{ArtifactStore, Namespace};
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::io::ReaderStream;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, Level};

/// Body of `GET /`.
pub const GREETING: &str = "Hello from converter server";

/// Shared handler state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub stager: UploadStager,
    pub store: ArtifactStore,
    pub trust_proxy: bool,
}

impl AppState {
    /// Create the data directories and wire the stager and store to them.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConverterError> {
        config.ensure_directories()?;
        Ok(Self {
            stager: UploadStager::new(&config.uploads_dir),
            store: ArtifactStore::new(&config.pdf_dir, &config.zip_dir),
            trust_proxy: config.trust_proxy,
        })
    }
}

/// Build the application router with CORS, body limit and tracing layers.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let body_limit = match config.body_limit {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(greeting))
        .route("/pdf", post(create_pdf))
        .route("/pdf/{id}", get(download_pdf))
        .route("/zip", post(create_zip))
        .route("/zip/{id}", get(download_zip))
        .with_state(state)
        .layer(body_limit)
        .layer(cors_layer())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Any origin is allowed; origin, method and headers are echoed back.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn greeting() -> &'static str {
    GREETING
}

async fn create_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ConverterError> {
    let staged = stage(&state, multipart).await?;
    let artifact = convert_to_pdf(&state.store, &staged).await?;
    Ok(artifact.url(&base_url(&headers, &uri, state.trust_proxy)))
}

async fn create_zip(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ConverterError> {
    let staged = stage(&state, multipart).await?;
    let artifact = convert_to_zip(&state.store, &staged).await?;
    Ok(artifact.url(&base_url(&headers, &uri, state.trust_proxy)))
}

async fn download_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ConverterError> {
    download(&state.store, Namespace::Pdf, &id).await
}

async fn download_zip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ConverterError> {
    download(&state.store, Namespace::Zip, &id).await
}

/// A body that is not multipart carries no files.
async fn stage(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Vec<StagedFile>, ConverterError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Upload is not multipart: {}", rejection.body_text());
        ConverterError::NoFilesProvided
    })?;
    state.stager.stage_multipart(&mut multipart).await
}

/// Stream an artifact back as an attachment named `{id}.{ext}`.
async fn download(
    store: &ArtifactStore,
    namespace: Namespace,
    raw_id: &str,
) -> Result<Response, ConverterError> {
    let artifact = store.resolve(namespace, raw_id).await?;

    let read_failed = |source| ConverterError::ReadFailed {
        path: artifact.path.clone(),
        source,
    };
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(read_failed)?;
    let length = file.metadata().await.map_err(read_failed)?.len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, namespace.content_type().as_ref())
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name()),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ConverterError::Internal(format!("download response: {e}")))
}

/// `{scheme}://{host}` as seen by the client.
///
/// With `trust_proxy`, the first `X-Forwarded-Proto` and `X-Forwarded-Host`
/// values win. Otherwise the scheme is `http` and the host comes from the
/// `Host` header, then the request URI, then `localhost`.
pub fn base_url(headers: &HeaderMap, uri: &Uri, trust_proxy: bool) -> String {
    let forwarded = |name: &str| {
        if trust_proxy {
            first_value(headers, name)
        } else {
            None
        }
    };

    let scheme = forwarded("x-forwarded-proto").unwrap_or("http");
    let host = forwarded("x-forwarded-host")
        .or_else(|| first_value(headers, header::HOST.as_str()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}

/// First comma-separated value of a header, trimmed. Empty counts as absent.
fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
