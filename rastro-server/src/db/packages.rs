//! Package and tracking-history table operations
//!
//! User-facing queries are always scoped with `AND user_guid = ?`;
//! the refresh service operates across users via [`list_undelivered`] and
//! [`apply_status_update`].

use rastro_common::db::models::{Package, TrackingEvent};
use rastro_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

const PACKAGE_COLUMNS: &str = "guid, user_guid, tracking_code, title, carrier, store_name, \
     last_status, is_delivered, created_at, updated_at";

/// Insert a new package and return the created row
pub async fn insert_package(
    db: &SqlitePool,
    user_guid: &str,
    tracking_code: &str,
    title: &str,
    carrier: Option<&str>,
    store_name: Option<&str>,
) -> Result<Package> {
    let guid = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO packages (guid, user_guid, tracking_code, title, carrier, store_name, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&guid)
    .bind(user_guid)
    .bind(tracking_code)
    .bind(title)
    .bind(carrier)
    .bind(store_name)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Package {
        guid,
        user_guid: user_guid.to_string(),
        tracking_code: tracking_code.to_string(),
        title: title.to_string(),
        carrier: carrier.map(str::to_string),
        store_name: store_name.map(str::to_string),
        last_status: None,
        is_delivered: false,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// List a user's packages, newest first
pub async fn list_for_user(db: &SqlitePool, user_guid: &str) -> Result<Vec<Package>> {
    let rows = sqlx::query_as::<_, Package>(&format!(
        "SELECT {PACKAGE_COLUMNS} FROM packages WHERE user_guid = ? ORDER BY created_at DESC"
    ))
    .bind(user_guid)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Fetch a single package scoped to its owner
pub async fn fetch_for_user(
    db: &SqlitePool,
    guid: &str,
    user_guid: &str,
) -> Result<Option<Package>> {
    let row = sqlx::query_as::<_, Package>(&format!(
        "SELECT {PACKAGE_COLUMNS} FROM packages WHERE guid = ? AND user_guid = ?"
    ))
    .bind(guid)
    .bind(user_guid)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Update user-editable fields; returns None when the row is missing or
/// owned by another user
pub async fn update_details(
    db: &SqlitePool,
    guid: &str,
    user_guid: &str,
    tracking_code: &str,
    title: &str,
    carrier: Option<&str>,
    store_name: Option<&str>,
) -> Result<Option<Package>> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE packages
         SET tracking_code = ?, title = ?, carrier = ?, store_name = ?, updated_at = ?
         WHERE guid = ? AND user_guid = ?",
    )
    .bind(tracking_code)
    .bind(title)
    .bind(carrier)
    .bind(store_name)
    .bind(&now)
    .bind(guid)
    .bind(user_guid)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    fetch_for_user(db, guid, user_guid).await
}

/// Delete a package scoped to its owner; returns whether a row was removed
pub async fn delete_package(db: &SqlitePool, guid: &str, user_guid: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM packages WHERE guid = ? AND user_guid = ?")
        .bind(guid)
        .bind(user_guid)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// All packages awaiting delivery, across users
///
/// The reconciliation cycle is driven by this filter; delivered packages
/// never appear here and are therefore never polled again.
pub async fn list_undelivered(db: &SqlitePool) -> Result<Vec<Package>> {
    let rows = sqlx::query_as::<_, Package>(&format!(
        "SELECT {PACKAGE_COLUMNS} FROM packages WHERE is_delivered = 0"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Conditionally write a refreshed status
///
/// The `WHERE last_status IS ?` guard makes the read-decide-write sequence a
/// single conditional statement: if a concurrent edit changed the status
/// since this cycle read it, no row matches and the update is dropped.
/// Returns whether the write landed.
pub async fn apply_status_update(
    db: &SqlitePool,
    guid: &str,
    expected_status: Option<&str>,
    new_status: &str,
    delivered: bool,
) -> Result<bool> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE packages
         SET last_status = ?, is_delivered = ?, updated_at = ?
         WHERE guid = ? AND last_status IS ?",
    )
    .bind(new_status)
    .bind(delivered)
    .bind(&now)
    .bind(guid)
    .bind(expected_status)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Append a status change to the package's history
pub async fn record_history_event(db: &SqlitePool, package_guid: &str, status: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO tracking_history (package_guid, status_description, recorded_at) VALUES (?, ?, ?)",
    )
    .bind(package_guid)
    .bind(status)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(db)
    .await?;
    Ok(())
}

/// Recorded status changes for a package, newest first
pub async fn history_for_package(db: &SqlitePool, package_guid: &str) -> Result<Vec<TrackingEvent>> {
    let rows = sqlx::query_as::<_, TrackingEvent>(
        "SELECT id, package_guid, status_description, recorded_at
         FROM tracking_history WHERE package_guid = ? ORDER BY id DESC",
    )
    .bind(package_guid)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
