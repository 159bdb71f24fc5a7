//! rastro-server library - Package tracker backend
//!
//! HTTP API for account and package management plus the background status
//! refresh service that reconciles undelivered packages against the carrier
//! tracking API.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult};

use api::auth::JwtKeys;
use services::ocr_client::GeminiOcrClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Token signing/verification keys
    pub jwt: JwtKeys,
    /// OCR assist client; `None` when no Gemini API key is configured
    pub ocr: Option<Arc<GeminiOcrClient>>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, jwt: JwtKeys, ocr: Option<Arc<GeminiOcrClient>>) -> Self {
        Self { db, jwt, ocr }
    }
}

/// Build application router
///
/// Register, login and health are public; everything under /api/packages
/// requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route(
            "/api/packages",
            get(api::packages::list_packages).post(api::packages::create_package),
        )
        .route(
            "/api/packages/:guid",
            axum::routing::put(api::packages::update_package)
                .delete(api::packages::delete_package),
        )
        .route(
            "/api/packages/:guid/history",
            get(api::packages::package_history),
        )
        .route("/api/packages/ocr", post(api::ocr::extract_from_image))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::auth_middleware,
        ));

    let public = Router::new()
        .route("/api/register", post(api::users::register))
        .route("/api/login", post(api::users::login))
        .merge(api::health::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
