//! HTTP routes for PDF text extraction

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::pdf::{PageText, PdfExtractor, PdfMetadata};
use crate::source::{filename_from_url, Fetcher};
use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::{HeaderValue, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Content types accepted on the full-text upload route
const ACCEPTED_UPLOAD_TYPES: &[&str] = &["application/pdf", "application/octet-stream"];

/// Room for multipart boundaries, part headers and the pages payload
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

const DEFAULT_UPLOAD_FILENAME: &str = "upload.pdf";
const FILE_FIELD: &str = "file";
const PAYLOAD_FIELD: &str = "payload";

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    fetcher: Arc<Fetcher>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let fetcher = Fetcher::new(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            fetcher: Arc::new(fetcher),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Full-document extraction result
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractTextResponse {
    pub filename: String,
    pub pages: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// Full concatenated text from all pages
    pub text: String,
}

impl ExtractTextResponse {
    fn new(filename: String, metadata: PdfMetadata, text: String) -> Self {
        Self {
            filename,
            pages: metadata.pages,
            title: metadata.title,
            author: metadata.author,
            subject: metadata.subject,
            keywords: metadata.keywords,
            text,
        }
    }
}

/// Page selection carried in the `payload` multipart field
#[derive(Debug, Deserialize)]
pub struct PagesPayload {
    /// 0-based page indices to extract
    pub pages: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
    /// Overrides the filename derived from the URL
    #[serde(default, alias = "output_json")]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UrlPagesRequest {
    pub url: String,
    /// 0-based page indices to extract
    pub pages: Vec<i64>,
}

/// Stringified page index to page text, in requested order
pub type PagesResponse = serde_json::Map<String, serde_json::Value>;

fn pages_response(pages: Vec<PageText>) -> PagesResponse {
    pages
        .into_iter()
        .map(|page| (page.index.to_string(), serde_json::Value::String(page.text)))
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Extract full text and metadata from an uploaded PDF
async fn extract_text(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractTextResponse>> {
    let max_bytes = state.settings.max_file_bytes();
    let form = read_upload_form(multipart?, max_bytes, UploadMode::FullText).await?;
    let upload = form.file.ok_or_else(missing_file)?;

    let (metadata, text) = extract_document(upload.data).await?;
    tracing::info!(filename = %upload.filename, pages = metadata.pages, "extracted upload");

    Ok(Json(ExtractTextResponse::new(upload.filename, metadata, text)))
}

/// Extract text for selected pages of an uploaded PDF
async fn extract_text_pages(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PagesResponse>> {
    let max_bytes = state.settings.max_file_bytes();
    let form = read_upload_form(multipart?, max_bytes, UploadMode::Pages).await?;
    let payload = form.payload.ok_or_else(|| {
        Error::validation(format!("Missing multipart field '{}'", PAYLOAD_FIELD))
    })?;
    let upload = form.file.ok_or_else(missing_file)?;

    let pages = extract_pages(upload.data, payload.pages).await?;
    tracing::info!(filename = %upload.filename, returned = pages.len(), "extracted upload pages");

    Ok(Json(pages_response(pages)))
}

/// Download a PDF and extract its full text and metadata
async fn extract_text_url(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<ExtractTextResponse>> {
    let Json(request) = payload.map_err(|e| json_error(e, state.settings.max_file_bytes()))?;

    let data = state.fetcher.fetch(&request.url).await?;
    let filename = request
        .filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| filename_from_url(&request.url));

    let (metadata, text) = extract_document(data).await?;
    tracing::info!(url = %request.url, pages = metadata.pages, "extracted remote PDF");

    Ok(Json(ExtractTextResponse::new(filename, metadata, text)))
}

/// Download a PDF and extract text for selected pages
async fn extract_text_pages_url(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UrlPagesRequest>, JsonRejection>,
) -> Result<Json<PagesResponse>> {
    let Json(request) = payload.map_err(|e| json_error(e, state.settings.max_file_bytes()))?;

    let data = state.fetcher.fetch(&request.url).await?;
    let pages = extract_pages(data, request.pages).await?;
    tracing::info!(url = %request.url, returned = pages.len(), "extracted remote PDF pages");

    Ok(Json(pages_response(pages)))
}

// ============================================================================
// Upload handling
// ============================================================================

struct Upload {
    filename: String,
    data: Vec<u8>,
}

/// Which upload route is reading the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadMode {
    /// Full text: the file must be typed as a PDF, `payload` is ignored
    FullText,
    /// Page selection: `payload` carries the pages to extract
    Pages,
}

#[derive(Default)]
struct UploadForm {
    file: Option<Upload>,
    payload: Option<PagesPayload>,
}

fn missing_file() -> Error {
    Error::validation(format!("Missing multipart field '{}'", FILE_FIELD))
}

/// Walk the multipart fields, keeping the `file` upload and, for page
/// requests, the `payload` page selection. Other fields are ignored.
async fn read_upload_form(
    mut multipart: Multipart,
    max_bytes: u64,
    mode: UploadMode,
) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            FILE_FIELD => {
                if mode == UploadMode::FullText {
                    check_upload_type(field.content_type())?;
                }
                let filename = field
                    .file_name()
                    .filter(|f| !f.is_empty())
                    .unwrap_or(DEFAULT_UPLOAD_FILENAME)
                    .to_string();
                let data = read_field_limited(field, max_bytes).await?;
                tracing::debug!(filename = %filename, bytes = data.len(), "received upload");
                form.file = Some(Upload { filename, data });
            }
            PAYLOAD_FIELD if mode == UploadMode::Pages => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                let payload = serde_json::from_str(&text)
                    .map_err(|e| Error::validation(format!("Invalid pages payload: {}", e)))?;
                form.payload = Some(payload);
            }
            other => {
                tracing::debug!(field = %other, "ignoring multipart field");
            }
        }
    }

    Ok(form)
}

fn check_upload_type(content_type: Option<&str>) -> Result<()> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match essence {
        Some(ct) if ACCEPTED_UPLOAD_TYPES.contains(&ct.as_str()) => Ok(()),
        _ => Err(Error::UnsupportedContentType {
            content_type: content_type.map(str::to_string),
        }),
    }
}

/// Read a multipart field, aborting once it grows past `max_bytes`
async fn read_field_limited(mut field: Field<'_>, max_bytes: u64) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        data.extend_from_slice(&chunk);
        if data.len() as u64 > max_bytes {
            return Err(Error::TooLarge {
                size: data.len() as u64,
                max_size: max_bytes,
            });
        }
    }
    Ok(data)
}

fn multipart_error(err: MultipartError, max_bytes: u64) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::BodyTooLarge {
            max_size: max_bytes,
        }
    } else {
        Error::validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        Error::validation(format!("Expected a multipart upload: {}", rejection.body_text()))
    }
}

fn json_error(rejection: JsonRejection, max_bytes: u64) -> Error {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::BodyTooLarge {
            max_size: max_bytes,
        }
    } else {
        Error::validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Open the document and pull metadata plus full text on the blocking pool
async fn extract_document(data: Vec<u8>) -> Result<(PdfMetadata, String)> {
    run_blocking(move || {
        let extractor = PdfExtractor::open(&data)?;
        Ok((extractor.metadata(), extractor.extract_all_text()))
    })
    .await
}

/// Open the document and pull text for the requested pages on the blocking pool
async fn extract_pages(data: Vec<u8>, pages: Vec<i64>) -> Result<Vec<PageText>> {
    run_blocking(move || {
        let extractor = PdfExtractor::open(&data)?;
        Ok(extractor.extract_pages_text(&pages))
    })
    .await
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal {
            reason: format!("extraction task failed: {}", e),
        })?
}

// ============================================================================
// Router and server
// ============================================================================

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.settings().max_file_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let cors = cors_layer(state.settings());

    Router::new()
        .route("/healthz", get(healthz))
        .route("/extract/text", post(extract_text))
        .route("/extract/text/pages", post(extract_text_pages))
        .route("/extract/text/url", post(extract_text_url))
        .route("/extract/text/pages/url", post(extract_text_pages_url))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    if settings.cors_allows_any() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentialed CORS cannot use wildcards, so methods and headers are mirrored
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Bind to the configured address and serve until Ctrl+C or SIGTERM
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let app_name = settings.app_name.clone();

    let app = router(AppState::new(settings)?);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("{} listening on {}", app_name, listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
