//! Package CRUD handlers
//!
//! Every query is scoped to the authenticated user; a guid belonging to
//! someone else behaves exactly like a missing row (404).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use rastro_common::db::models::{Package, TrackingEvent};

use crate::api::auth::AuthUser;
use crate::{db, ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PackagePayload {
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
}

/// Validated create/update fields; tracking codes are stored uppercase
struct PackageFields {
    tracking_code: String,
    title: String,
    carrier: Option<String>,
    store_name: Option<String>,
}

fn validate_payload(payload: PackagePayload) -> Result<PackageFields, ApiError> {
    let tracking_code = payload
        .tracking_code
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .ok_or_else(|| {
            ApiError::BadRequest("Tracking code and title are required".to_string())
        })?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::BadRequest("Tracking code and title are required".to_string())
        })?;

    Ok(PackageFields {
        tracking_code,
        title,
        carrier: payload.carrier.filter(|s| !s.trim().is_empty()),
        store_name: payload.store_name.filter(|s| !s.trim().is_empty()),
    })
}

/// GET /api/packages - the caller's packages, newest first
pub async fn list_packages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Package>>> {
    let packages = db::packages::list_for_user(&state.db, &user.user_guid).await?;
    Ok(Json(packages))
}

/// POST /api/packages
pub async fn create_package(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PackagePayload>,
) -> ApiResult<(StatusCode, Json<Package>)> {
    let fields = validate_payload(payload)?;

    let package = db::packages::insert_package(
        &state.db,
        &user.user_guid,
        &fields.tracking_code,
        &fields.title,
        fields.carrier.as_deref(),
        fields.store_name.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(package)))
}

/// PUT /api/packages/:guid
pub async fn update_package(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guid): Path<String>,
    Json(payload): Json<PackagePayload>,
) -> ApiResult<Json<Package>> {
    let fields = validate_payload(payload)?;

    let updated = db::packages::update_details(
        &state.db,
        &guid,
        &user.user_guid,
        &fields.tracking_code,
        &fields.title,
        fields.carrier.as_deref(),
        fields.store_name.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Package not found".to_string()))?;

    Ok(Json(updated))
}

/// DELETE /api/packages/:guid
pub async fn delete_package(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guid): Path<String>,
) -> ApiResult<StatusCode> {
    let deleted = db::packages::delete_package(&state.db, &guid, &user.user_guid).await?;
    if !deleted {
        return Err(ApiError::NotFound("Package not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/packages/:guid/history - recorded status changes, newest first
pub async fn package_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Vec<TrackingEvent>>> {
    // Ownership check first so foreign packages 404 rather than leak history
    db::packages::fetch_for_user(&state.db, &guid, &user.user_guid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Package not found".to_string()))?;

    let events = db::packages::history_for_package(&state.db, &guid).await?;
    Ok(Json(events))
}
