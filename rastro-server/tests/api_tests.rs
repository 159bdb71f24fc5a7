//! Integration tests for the HTTP API
//!
//! Drives the real router over in-memory SQLite with `tower`'s oneshot.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use rastro_common::db::init_memory_database;
use rastro_server::api::auth::JwtKeys;
use rastro_server::{build_router, AppState};

async fn setup_app() -> Router {
    let db = init_memory_database().await.unwrap();
    let state = AppState::new(db, JwtKeys::new("test-secret"), None);
    build_router(state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn authed_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register + login, returning a bearer token
async fn obtain_token(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/register",
            json!({"email": email, "password": "hunter22"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            json!({"email": email, "password": "hunter22"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "rastro-server");
}

#[tokio::test]
async fn test_register_rejects_missing_fields() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/register",
            json!({"email": "a@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_duplicate_email() {
    let app = setup_app().await;

    let payload = json!({"email": "dup@example.com", "password": "hunter22"});
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/register", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["email"], "dup@example.com");
    assert!(body.get("password_hash").is_none(), "hash must not leak");

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/register", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let app = setup_app().await;
    obtain_token(&app, "user@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            json!({"email": "user@example.com", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_unknown_email() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            json!({"email": "ghost@example.com", "password": "hunter22"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_packages_require_token() {
    let app = setup_app().await;

    let request = Request::builder()
        .uri("/api/packages")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/packages", "garbage-token", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ocr_requires_token() {
    let app = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/packages/ocr")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_package_crud_flow() {
    let app = setup_app().await;
    let token = obtain_token(&app, "crud@example.com").await;

    // Create; tracking code gets uppercased
    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/packages",
            &token,
            Some(json!({
                "tracking_code": "qp123456789br",
                "title": "Smart Lamp",
                "store_name": "Amazon"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = extract_json(response.into_body()).await;
    assert_eq!(created["tracking_code"], "QP123456789BR");
    assert_eq!(created["is_delivered"], false);
    let guid = created["guid"].as_str().unwrap().to_string();

    // List
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/packages", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = extract_json(response.into_body()).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Update
    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &format!("/api/packages/{}", guid),
            &token,
            Some(json!({
                "tracking_code": "QP123456789BR",
                "title": "Desk Lamp",
                "carrier": "Correios"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = extract_json(response.into_body()).await;
    assert_eq!(updated["title"], "Desk Lamp");
    assert_eq!(updated["carrier"], "Correios");

    // Empty history for a never-polled package
    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            &format!("/api/packages/{}/history", guid),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = extract_json(response.into_body()).await;
    assert!(history.as_array().unwrap().is_empty());

    // Delete
    let response = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/packages/{}", guid),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/packages", &token, None))
        .await
        .unwrap();
    let listed = extract_json(response.into_body()).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_package_validates_fields() {
    let app = setup_app().await;
    let token = obtain_token(&app, "valid@example.com").await;

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/packages",
            &token,
            Some(json!({"title": "No code"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/packages",
            &token,
            Some(json!({"tracking_code": "QP123456789BR", "title": "   "})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_packages_are_scoped_per_user() {
    let app = setup_app().await;
    let owner = obtain_token(&app, "owner@example.com").await;
    let intruder = obtain_token(&app, "intruder@example.com").await;

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/packages",
            &owner,
            Some(json!({"tracking_code": "QP123456789BR", "title": "Mine"})),
        ))
        .await
        .unwrap();
    let created = extract_json(response.into_body()).await;
    let guid = created["guid"].as_str().unwrap().to_string();

    // The other user sees nothing and cannot touch the row
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/packages", &intruder, None))
        .await
        .unwrap();
    let listed = extract_json(response.into_body()).await;
    assert!(listed.as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &format!("/api/packages/{}", guid),
            &intruder,
            Some(json!({"tracking_code": "QP123456789BR", "title": "Stolen"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/packages/{}", guid),
            &intruder,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            &format!("/api/packages/{}/history", guid),
            &intruder,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
