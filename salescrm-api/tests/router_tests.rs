/// Router behaviour that does not need a database: authentication
/// rejections, request validation, fallbacks, and response headers.

mod common;

use axum::http::StatusCode;
use common::{lazy_app, send, TEST_SECRET};
use salescrm_shared::auth::jwt::{create_token, Claims, TokenType};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = lazy_app();

    let (status, body) = send(&app, "GET", "/v1/accounts", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert!(body["data"].is_null());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_malformed_and_foreign_tokens_are_rejected() {
    let app = lazy_app();

    let (status, _) = send(&app, "GET", "/v1/deals", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), TokenType::Access);
    let foreign = create_token(&claims, "a-different-secret-that-is-long-enough").unwrap();
    let (status, _) = send(&app, "GET", "/v1/deals", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_cannot_authenticate_requests() {
    let app = lazy_app();
    let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), TokenType::Refresh);
    let refresh = create_token(&claims, TEST_SECRET).unwrap();

    let (status, _) = send(&app, "GET", "/v1/leads", Some(&refresh), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_errors_list_fields() {
    let app = lazy_app();

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "companyName": "",
            "name": "Ada",
            "email": "not-an-email",
            "password": "short",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 422);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"companyName"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = lazy_app();

    let (status, body) = send(&app, "POST", "/v1/auth/login", None, Some(json!({ "email": 42 }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_unknown_route_uses_envelope() {
    let app = lazy_app();

    let (status, body) = send(&app, "GET", "/v1/no-such-resource", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let app = lazy_app();

    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["version"], salescrm_shared::VERSION);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let response = lazy_app()
        .oneshot(Request::builder().uri("/v1/accounts").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}
