//! HTTP front end: authenticate, download, detect, convert.

pub mod backend;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    CancellationToken, Error, FileFormat, ParseOptions, SUPPORTED_TYPES, convert_bytes, detect,
    received_type,
};

pub use backend::{Identity, RestBackend, Storage, StorageError, User};

pub const DEFAULT_BUCKET: &str = "documents";
pub const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub identity: Arc<dyn Identity>,
    pub default_bucket: String,
    pub parse_timeout: Duration,
    pub options: ParseOptions,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, identity: Arc<dyn Identity>) -> Self {
        AppState {
            storage,
            identity,
            default_bucket: DEFAULT_BUCKET.to_string(),
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
            options: ParseOptions::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseRequest {
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseResponse {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No authorization header")]
    MissingAuthorization,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request body")]
    InvalidBody(String),

    #[error("File path is required")]
    MissingFilePath,

    #[error("Failed to download file")]
    Download(#[source] StorageError),

    #[error("Unsupported file type for parsing")]
    Unsupported { received_type: String },

    #[error("Failed to parse document")]
    Parse(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::MissingAuthorization | ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({ "error": message }))
            }
            ApiError::MissingFilePath => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::InvalidBody(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "details": details }),
            ),
            ApiError::Unsupported { received_type } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": message,
                    "supportedTypes": SUPPORTED_TYPES,
                    "receivedType": received_type,
                }),
            ),
            ApiError::Download(source) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "details": source.to_string() }),
            ),
            ApiError::Parse(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "details": details }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::MissingAuthorization)?
        .to_str()
        .map_err(|_| ApiError::Unauthorized)?
        .trim();
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ApiError::Unauthorized),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A document that fails to parse yields empty content so the caller can
/// fall back to another viewer.
fn content_or_empty(result: Result<String, Error>) -> String {
    match result {
        Ok(html) => html,
        Err(e) => {
            log::warn!("document could not be parsed: {e}");
            String::new()
        }
    }
}

async fn convert_with_timeout(
    state: &AppState,
    bytes: Vec<u8>,
    format: FileFormat,
) -> Result<String, ApiError> {
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();
    let options = state.options.clone();
    let task = tokio::task::spawn_blocking(move || {
        convert_bytes(&bytes, format, &options, &worker_cancel)
    });

    match tokio::time::timeout(state.parse_timeout, task).await {
        Ok(Ok(result)) => Ok(content_or_empty(result)),
        Ok(Err(join_error)) => {
            log::error!("conversion worker failed: {join_error}");
            Err(ApiError::Parse(join_error.to_string()))
        }
        Err(_) => {
            cancel.cancel();
            log::warn!(
                "conversion of {format} cancelled after {:.1}s",
                state.parse_timeout.as_secs_f64()
            );
            Err(ApiError::Parse(format!(
                "conversion exceeded {:.1}s",
                state.parse_timeout.as_secs_f64()
            )))
        }
    }
}

async fn parse_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ParseResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let user = state
        .identity
        .verify(token)
        .await
        .ok_or(ApiError::Unauthorized)?;

    let request: ParseRequest = if body.is_empty() {
        ParseRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?
    };
    let file_path = non_empty(request.file_path).ok_or(ApiError::MissingFilePath)?;
    let bucket = non_empty(request.bucket).unwrap_or_else(|| state.default_bucket.clone());
    let mime_type = non_empty(request.mime_type);
    log::info!("user {} requested {bucket}/{file_path}", user.id);

    let bytes = state
        .storage
        .download(&bucket, &file_path)
        .await
        .map_err(|e| {
            log::error!("download of {bucket}/{file_path} failed: {e}");
            ApiError::Download(e)
        })?;

    let format = detect(mime_type.as_deref(), &file_path, &bytes).ok_or_else(|| {
        ApiError::Unsupported {
            received_type: received_type(mime_type.as_deref(), &file_path),
        }
    })?;
    log::debug!("{file_path}: {} bytes detected as {format}", bytes.len());

    let content = convert_with_timeout(&state, bytes, format).await?;
    Ok(Json(ParseResponse {
        content,
        file_id: request.file_id,
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/", post(parse_document).options(preflight))
        .route("/parse-document", post(parse_document).options(preflight))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}
