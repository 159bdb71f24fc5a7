//! OCR-assist endpoint
//!
//! Accepts a multipart image upload, forwards it to the vision model, and
//! returns the structured package fields parsed from the model's reply.

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::info;

use crate::services::ocr_client::PackageExtraction;
use crate::{ApiError, ApiResult, AppState};

/// POST /api/packages/ocr
///
/// Expects an `image` part. 400 when no image was uploaded, 502 when the
/// model call fails or its reply cannot be parsed.
pub async fn extract_from_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<PackageExtraction>> {
    let mut image: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("image") {
            let mime = field
                .content_type()
                .unwrap_or("image/jpeg")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read image: {}", e)))?;
            image = Some((data.to_vec(), mime));
            break;
        }
    }

    let (data, mime) = image
        .ok_or_else(|| ApiError::BadRequest("No image file uploaded".to_string()))?;

    let ocr = state
        .ocr
        .as_ref()
        .ok_or_else(|| ApiError::Internal("OCR is not configured on this server".to_string()))?;

    info!(bytes = data.len(), mime = %mime, "Forwarding image to vision model");

    let extraction = ocr
        .extract(&data, &mime)
        .await
        .map_err(|e| ApiError::Upstream(format!("Image analysis failed: {}", e)))?;

    Ok(Json(extraction))
}
