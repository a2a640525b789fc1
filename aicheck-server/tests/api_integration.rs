//! API integration tests for aicheck-server.
//!
//! These tests drive the full router with realistic multipart requests over the
//! in-memory store and cache and a stub image processor.

use std::sync::Arc;

use aicheck_core::{
    CacheAside, DuplicateScope, ImageScorer, MemoryCache, MemoryStore, RequestContext,
    ScoreResult, ScorerError, VerificationRepository, VerificationService,
};
use aicheck_server::{create_router, AppState, Config, JwtVerifier};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::Span;

const SECRET: &str = "integration-test-secret";
const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

/// Scores every image 0.9 without any network access
struct StubScorer;

#[async_trait]
impl ImageScorer for StubScorer {
    async fn process(
        &self,
        _ctx: &RequestContext,
        _user_id: &str,
        image: &[u8],
    ) -> Result<ScoreResult, ScorerError> {
        Ok(ScoreResult {
            success: true,
            score: 0.9,
            message: format!("scored {} bytes", image.len()),
        })
    }
}

fn test_config() -> Config {
    Config {
        jwt_secret: Some(SECRET.to_string()),
        max_upload_bytes: 1024,
        ..Config::default()
    }
}

fn create_test_app_with(config: Config) -> Router {
    let repository = VerificationRepository::new(Arc::new(MemoryStore::new()), Span::none());
    let cache = CacheAside::new(Arc::new(MemoryCache::new()), Span::none());
    let service = VerificationService::new(repository, cache, Arc::new(StubScorer), Span::none())
        .with_duplicate_scope(config.duplicate_scope);

    let state = AppState::new(service, JwtVerifier::new(SECRET, None), &config);
    create_router(state, &config)
}

fn create_test_app() -> Router {
    create_test_app_with(test_config())
}

fn token_for(user_id: &str) -> String {
    let claims = json!({
        "sub": user_id,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Helper to create a multipart body with one file field
fn create_image_multipart(field: &str, content_type: &str, content: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

async fn post_image(
    app: &Router,
    token: Option<&str>,
    content_type: &str,
    content: &[u8],
) -> Response {
    let (multipart_type, body) = create_image_multipart("image", content_type, content);

    let mut request = Request::builder()
        .method("POST")
        .uri("/verify")
        .header("Content-Type", multipart_type);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }

    app.clone()
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

async fn get_authed(app: &Router, uri: &str, token: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_reports_backends() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
    assert_eq!(json["cache"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["paths"]["/verify"].is_object());
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_verify_requires_token() {
    let app = create_test_app();

    let response = post_image(&app, None, "image/png", b"png bytes").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "AUTH_MISSING_TOKEN");
}

#[tokio::test]
async fn test_verify_rejects_forged_token() {
    let app = create_test_app();
    let forged = encode(
        &Header::default(),
        &json!({"sub": "mallory"}),
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();

    let response = post_image(&app, Some(&forged), "image/png", b"png bytes").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn test_metrics_requires_token() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Upload Validation Tests
// ============================================================================

#[tokio::test]
async fn test_verify_rejects_unsupported_type() {
    let app = create_test_app();
    let token = token_for("alice");

    let response = post_image(&app, Some(&token), "text/plain", b"hello").await;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_verify_accepts_type_with_parameters() {
    let app = create_test_app();
    let token = token_for("alice");

    let response = post_image(&app, Some(&token), "IMAGE/JPEG; q=1", b"jpeg bytes").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_verify_rejects_oversized_image() {
    let app = create_test_app();
    let token = token_for("alice");

    let response = post_image(&app, Some(&token), "image/png", &[0u8; 1025]).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_verify_accepts_image_above_extractor_default() {
    let app = create_test_app_with(Config {
        jwt_secret: Some(SECRET.to_string()),
        ..Config::default()
    });
    let token = token_for("alice");
    let image = vec![0x89u8; 3 * 1024 * 1024];

    let response = post_image(&app, Some(&token), "image/png", &image).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], format!("scored {} bytes", image.len()));
}

#[tokio::test]
async fn test_verify_default_upload_limit_enforced_by_validation() {
    let app = create_test_app_with(Config {
        jwt_secret: Some(SECRET.to_string()),
        ..Config::default()
    });
    let token = token_for("alice");
    let image = vec![0x89u8; 9 * 1024 * 1024];

    let response = post_image(&app, Some(&token), "image/png", &image).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("exceeds maximum of 8388608 bytes"));
}

#[tokio::test]
async fn test_verify_rejects_empty_image() {
    let app = create_test_app();
    let token = token_for("alice");

    let response = post_image(&app, Some(&token), "image/png", b"").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_requires_image_field() {
    let app = create_test_app();
    let token = token_for("alice");
    let (content_type, body) = create_image_multipart("file", "image/png", b"png bytes");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/verify")
                .header("Content-Type", content_type)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Verification Flow Tests
// ============================================================================

#[tokio::test]
async fn test_verify_then_fetch_result() {
    let app = create_test_app();
    let token = token_for("alice");

    let response = post_image(&app, Some(&token), "image/png", b"a real png").await;
    assert_eq!(response.status(), StatusCode::OK);

    let verified = json_body(response).await;
    let request_id = verified["request_id"].as_str().unwrap().to_string();
    assert_eq!(verified["verified"], true);
    assert!((verified["score"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert_eq!(verified["message"], "scored 10 bytes");
    assert_eq!(verified["metadata"]["success"], true);
    assert_eq!(verified["metadata"]["timestamp"], verified["created_at"]);

    let response = get_authed(&app, &format!("/result/{}", request_id), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let result = json_body(response).await;
    assert_eq!(result["request_id"], request_id.as_str());
    assert_eq!(result["user_id"], "alice");
    assert_eq!(result["success"], true);
    assert_eq!(result["sha1_hash"].as_str().unwrap().len(), 40);
    assert!(result["details"].as_str().unwrap().starts_with("status:true score:0.9"));
}

#[tokio::test]
async fn test_same_image_twice_conflicts() {
    let app = create_test_app();
    let token = token_for("alice");

    let first = post_image(&app, Some(&token), "image/png", b"same bytes").await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_image(&app, Some(&token), "image/png", b"same bytes").await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(second).await["code"], "DUPLICATE_IMAGE");

    // A different user may submit the same image
    let other = post_image(&app, Some(&token_for("bob")), "image/png", b"same bytes").await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_result_is_not_found() {
    let app = create_test_app();
    let token = token_for("alice");

    let response = get_authed(&app, "/result/does-not-exist", &token).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicates_owner_scope_is_empty() {
    let app = create_test_app();
    let alice = token_for("alice");

    let response = post_image(&app, Some(&alice), "image/gif", b"gif bytes").await;
    let request_id = json_body(response).await["request_id"]
        .as_str()
        .unwrap()
        .to_string();
    post_image(&app, Some(&token_for("bob")), "image/gif", b"gif bytes").await;

    let response = get_authed(&app, &format!("/duplicates/{}", request_id), &alice).await;
    assert_eq!(response.status(), StatusCode::OK);

    let report = json_body(response).await;
    assert_eq!(report["request_id"], request_id.as_str());
    assert_eq!(report["user_id"], "alice");
    assert_eq!(report["duplicate_count"], 0);
    assert_eq!(report["duplicates"], json!([]));
}

#[tokio::test]
async fn test_duplicates_global_scope_lists_other_users() {
    let app = create_test_app_with(Config {
        duplicate_scope: DuplicateScope::Global,
        ..test_config()
    });
    let alice = token_for("alice");

    post_image(&app, Some(&token_for("bob")), "image/webp", b"webp bytes").await;
    let response = post_image(&app, Some(&alice), "image/webp", b"webp bytes").await;
    let request_id = json_body(response).await["request_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = get_authed(&app, &format!("/duplicates/{}", request_id), &alice).await;
    assert_eq!(response.status(), StatusCode::OK);

    let report = json_body(response).await;
    assert_eq!(report["duplicate_count"], 1);
    assert_ne!(report["duplicates"][0]["request_id"], request_id.as_str());
    assert_eq!(report["duplicates"][0]["success"], true);
}

#[tokio::test]
async fn test_duplicates_of_unknown_request_is_not_found() {
    let app = create_test_app();

    let response = get_authed(&app, "/duplicates/missing", &token_for("alice")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_summary() {
    let app = create_test_app();
    let token = token_for("alice");

    let empty = json_body(get_authed(&app, "/metrics/summary", &token).await).await;
    assert_eq!(empty["total_requests"], 0);
    assert_eq!(empty["success_rate"], 0.0);

    post_image(&app, Some(&token), "image/png", b"first").await;
    post_image(&app, Some(&token), "image/png", b"second").await;

    let response = get_authed(&app, "/metrics/summary", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let summary = json_body(response).await;
    assert_eq!(summary["total_requests"], 2);
    assert_eq!(summary["successful_requests"], 2);
    assert_eq!(summary["success_rate"], 1.0);
    assert!((summary["average_score"].as_f64().unwrap() - 0.9).abs() < 1e-6);
}
