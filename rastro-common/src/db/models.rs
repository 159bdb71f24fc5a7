//! Database models

use serde::{Deserialize, Serialize};

/// Registered account
///
/// Not `Serialize` on purpose: `password_hash` must never leave the process.
/// API responses build their own payloads from the fields they need.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub guid: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Tracked shipment
///
/// `is_delivered` holds iff `last_status` contains the carrier's delivered
/// term (case-insensitive); the refresh service maintains that invariant.
/// Timestamps are RFC 3339 text.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Package {
    pub guid: String,
    pub user_guid: String,
    pub tracking_code: String,
    pub title: String,
    pub carrier: Option<String>,
    pub store_name: Option<String>,
    pub last_status: Option<String>,
    pub is_delivered: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One recorded status change, appended by the refresh service
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackingEvent {
    pub id: i64,
    pub package_guid: String,
    pub status_description: String,
    pub recorded_at: String,
}
