mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::*;
use parse_document::server::{AppState, Identity, Storage, StorageError, User, router};
use serde_json::{Value, json};
use tower::ServiceExt;

const VALID_TOKEN: &str = "valid-token";

#[derive(Default)]
struct MockBackend {
    files: HashMap<String, Vec<u8>>,
    downloads: AtomicUsize,
}

impl MockBackend {
    fn with_file(mut self, bucket: &str, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(format!("{bucket}/{path}"), bytes);
        self
    }
}

#[async_trait]
impl Storage for MockBackend {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(&format!("{bucket}/{path}"))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }
}

#[async_trait]
impl Identity for MockBackend {
    async fn verify(&self, token: &str) -> Option<User> {
        (token == VALID_TOKEN).then(|| User {
            id: "user-1".to_string(),
            email: None,
        })
    }
}

fn app(backend: &Arc<MockBackend>) -> Router {
    router(AppState::new(backend.clone(), backend.clone()))
}

async fn post(app: Router, authorization: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    let response = app
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn bearer() -> Option<&'static str> {
    Some("Bearer valid-token")
}

#[tokio::test]
async fn missing_authorization_is_rejected_before_download() {
    let _ = env_logger::try_init();
    let backend = Arc::new(MockBackend::default().with_file("documents", "a.txt", b"hi".to_vec()));
    let (status, body) = post(app(&backend), None, json!({ "filePath": "a.txt" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "No authorization header" }));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let backend = Arc::new(MockBackend::default());
    let (status, body) = post(
        app(&backend),
        Some("Bearer nope"),
        json!({ "filePath": "a.txt" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn authorization_without_bearer_scheme_is_unauthorized() {
    let backend = Arc::new(MockBackend::default().with_file("documents", "a.txt", b"hi".to_vec()));
    for value in ["valid-token", "Bearer", "Bearer   ", "Basic valid-token"] {
        let (status, body) = post(app(&backend), Some(value), json!({ "filePath": "a.txt" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{value:?}");
        assert_eq!(body, json!({ "error": "Unauthorized" }), "{value:?}");
    }
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn file_path_is_required() {
    let backend = Arc::new(MockBackend::default());
    let (status, body) = post(app(&backend), bearer(), json!({ "fileId": "f1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "File path is required" }));
}

#[tokio::test]
async fn download_failure_reports_details() {
    let backend = Arc::new(MockBackend::default());
    let (status, body) = post(app(&backend), bearer(), json!({ "filePath": "gone.docx" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to download file");
    assert!(body["details"].as_str().unwrap().contains("documents/gone.docx"));
}

#[tokio::test]
async fn unsupported_type_lists_supported_ones() {
    let backend =
        Arc::new(MockBackend::default().with_file("documents", "photo.png", PNG_1X1.to_vec()));
    let (status, body) = post(
        app(&backend),
        bearer(),
        json!({ "filePath": "photo.png", "mimeType": "image/png" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "error": "Unsupported file type for parsing",
            "supportedTypes": [".docx", ".doc", ".xlsx", ".xls", ".txt"],
            "receivedType": "image/png",
        })
    );
}

#[tokio::test]
async fn docx_is_converted_from_the_requested_bucket() {
    let bytes = docx(&para("Hello")).build();
    let backend = Arc::new(MockBackend::default().with_file("contracts", "c/1.docx", bytes));
    let (status, body) = post(
        app(&backend),
        bearer(),
        json!({
            "fileId": "file-42",
            "filePath": "c/1.docx",
            "bucket": "contracts",
            "mimeType": "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "content": "<p>Hello</p>", "fileId": "file-42" }));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unparseable_package_yields_empty_content() {
    let backend = Arc::new(
        MockBackend::default().with_file("documents", "broken.docx", vec![0x42; 256]),
    );
    let (status, body) = post(
        app(&backend),
        bearer(),
        json!({ "filePath": "broken.docx", "fileId": "f" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "content": "", "fileId": "f" }));
}

#[tokio::test]
async fn slow_conversion_times_out() {
    let bytes = docx(&para("filler").repeat(20_000)).build();
    let backend = Arc::new(MockBackend::default().with_file("documents", "big.docx", bytes));
    let mut state = AppState::new(backend.clone(), backend.clone());
    state.parse_timeout = Duration::from_millis(1);

    let (status, body) = post(router(state), bearer(), json!({ "filePath": "big.docx" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to parse document");
    assert!(body["details"].as_str().unwrap().contains("exceeded"), "{body}");
}

#[tokio::test]
async fn plain_text_becomes_paragraphs() {
    let backend = Arc::new(
        MockBackend::default().with_file("documents", "notes.txt", b"line1\nline2".to_vec()),
    );
    let (status, body) = post(app(&backend), bearer(), json!({ "filePath": "notes.txt" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "content": "<p>line1</p><p>line2</p>" }));
}

#[tokio::test]
async fn xlsx_and_legacy_formats_are_dispatched() {
    let sheet = xlsx(&["Header"], &[&[("A1", "#0")]]).build();
    let backend = Arc::new(
        MockBackend::default()
            .with_file("documents", "book.xlsx", sheet)
            .with_file("documents", "old.doc", vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
    );

    let (status, body) = post(app(&backend), bearer(), json!({ "filePath": "book.xlsx" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["content"].as_str().unwrap().contains("<th>Header</th>"));

    let (status, body) = post(
        app(&backend),
        bearer(),
        json!({ "filePath": "old.doc", "mimeType": "application/msword" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["content"].as_str().unwrap().contains("legacy-format-notice"));
}

#[tokio::test]
async fn preflight_allows_any_origin() {
    let backend = Arc::new(MockBackend::default());
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
        .body(Body::empty())
        .unwrap();
    let response = app(&backend).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cors_headers_accompany_responses() {
    let backend = Arc::new(MockBackend::default());
    let request = Request::builder()
        .method("POST")
        .uri("/parse-document")
        .header(header::ORIGIN, "https://app.example.com")
        .body(Body::from("{}"))
        .unwrap();
    let response = app(&backend).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
