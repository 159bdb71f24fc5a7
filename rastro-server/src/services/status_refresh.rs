//! Status refresh service
//!
//! Runs the periodic reconciliation cycle: every interval, load all
//! undelivered packages, ask the carrier for each one's latest status, and
//! conditionally write changed statuses back. Each cycle is independent and
//! stateless; a package that reaches delivered state leaves the polling set
//! for good.

use async_trait::async_trait;
use rastro_common::db::models::Package;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::services::correios_client::TrackingError;

/// Carrier status term that marks a shipment as delivered
const DELIVERED_TERM: &str = "entregue";

/// Source of latest-status lookups
///
/// The seam between the scheduler and the carrier API; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Latest status label for a tracking code; `Ok(None)` means the
    /// carrier has no events for it
    async fn latest_status(&self, tracking_code: &str) -> Result<Option<String>, TrackingError>;
}

/// Outcome of a single poll attempt. Never persisted; decides whether a
/// write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Fetched status matches the stored one; no write
    NoChange,
    /// Status changed; row was updated
    Updated(String),
    /// Lookup failed or returned no data; no write
    LookupFailed,
}

/// Refresh service configuration
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Seconds between reconciliation cycles (default: hourly)
    pub interval_secs: u64,
    /// Enable the background service (default: true)
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            enabled: true,
        }
    }
}

/// Counts for one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Does a status label mean the shipment was delivered?
///
/// Case-insensitive substring match on the carrier's delivered term; the
/// stored `is_delivered` flag is always recomputed from this.
pub fn status_indicates_delivery(status: &str) -> bool {
    status.to_lowercase().contains(DELIVERED_TERM)
}

/// Decide the outcome of one poll given the stored and fetched statuses.
///
/// Comparison is exact (byte-equal); a lookup that returns nothing never
/// produces a write.
pub fn decide(current: Option<&str>, fetched: Option<String>) -> StatusOutcome {
    match fetched {
        None => StatusOutcome::LookupFailed,
        Some(status) if Some(status.as_str()) == current => StatusOutcome::NoChange,
        Some(status) => StatusOutcome::Updated(status),
    }
}

/// Status refresh service
///
/// Owns its configuration and collaborators explicitly; nothing here is
/// global state.
pub struct StatusRefreshService {
    config: RefreshConfig,
    db: SqlitePool,
    source: Arc<dyn StatusSource>,
    busy: AtomicBool,
}

impl StatusRefreshService {
    pub fn new(config: RefreshConfig, db: SqlitePool, source: Arc<dyn StatusSource>) -> Self {
        Self {
            config,
            db,
            source,
            busy: AtomicBool::new(false),
        }
    }

    /// Run the refresh service (spawns background task)
    ///
    /// A tick that fires while a previous cycle is still running is
    /// skipped, not queued; overlapping cycles cannot occur.
    pub fn run(self: Arc<Self>) {
        if !self.config.enabled {
            info!("StatusRefreshService disabled by configuration");
            return;
        }

        info!(
            "Starting StatusRefreshService (interval: {}s)",
            self.config.interval_secs
        );

        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(self.config.interval_secs));
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                if self.busy.swap(true, Ordering::SeqCst) {
                    warn!("StatusRefreshService: previous cycle still running, skipping tick");
                    continue;
                }

                match self.run_cycle().await {
                    Ok(summary) => {
                        info!(
                            checked = summary.checked,
                            updated = summary.updated,
                            unchanged = summary.unchanged,
                            failed = summary.failed,
                            "Reconciliation cycle finished"
                        );
                    }
                    // The listing query failed; this cycle is lost, the
                    // next one starts clean
                    Err(e) => error!("Reconciliation cycle aborted: {}", e),
                }

                self.busy.store(false, Ordering::SeqCst);
            }
        });
    }

    /// Execute one reconciliation cycle
    ///
    /// An error from the initial listing query propagates (aborting the
    /// cycle); errors for individual packages are contained and counted.
    pub async fn run_cycle(&self) -> rastro_common::Result<CycleSummary> {
        let packages = crate::db::packages::list_undelivered(&self.db).await?;
        debug!("Found {} packages to check", packages.len());

        let mut summary = CycleSummary {
            checked: packages.len(),
            ..Default::default()
        };

        for package in &packages {
            match self.refresh_package(package).await {
                Ok(StatusOutcome::Updated(status)) => {
                    summary.updated += 1;
                    info!(
                        package_guid = %package.guid,
                        tracking_code = %package.tracking_code,
                        status = %status,
                        "Package status updated"
                    );
                }
                Ok(StatusOutcome::NoChange) => {
                    summary.unchanged += 1;
                }
                Ok(StatusOutcome::LookupFailed) => {
                    summary.failed += 1;
                    debug!(
                        tracking_code = %package.tracking_code,
                        "No status available this cycle"
                    );
                }
                Err(e) => {
                    // Per-package persistence failure; the rest of the
                    // cycle continues
                    summary.failed += 1;
                    error!(
                        package_guid = %package.guid,
                        tracking_code = %package.tracking_code,
                        "Failed to refresh package: {}", e
                    );
                }
            }
        }

        Ok(summary)
    }

    /// Poll one package and apply the outcome
    async fn refresh_package(&self, package: &Package) -> rastro_common::Result<StatusOutcome> {
        let fetched = match self.source.latest_status(&package.tracking_code).await {
            Ok(status) => status,
            Err(e) => {
                debug!(
                    tracking_code = %package.tracking_code,
                    "Carrier lookup failed: {}", e
                );
                None
            }
        };

        match decide(package.last_status.as_deref(), fetched) {
            StatusOutcome::Updated(new_status) => {
                let delivered = status_indicates_delivery(&new_status);
                let written = crate::db::packages::apply_status_update(
                    &self.db,
                    &package.guid,
                    package.last_status.as_deref(),
                    &new_status,
                    delivered,
                )
                .await?;

                if !written {
                    // A concurrent edit changed the row since this cycle
                    // read it; the conditional update dropped the write
                    warn!(
                        package_guid = %package.guid,
                        "Stale read, status write skipped"
                    );
                    return Ok(StatusOutcome::NoChange);
                }

                crate::db::packages::record_history_event(&self.db, &package.guid, &new_status)
                    .await?;

                Ok(StatusOutcome::Updated(new_status))
            }
            outcome => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_config_defaults() {
        let config = RefreshConfig::default();
        assert_eq!(config.interval_secs, 3600);
        assert!(config.enabled);
    }

    #[test]
    fn test_status_indicates_delivery() {
        assert!(status_indicates_delivery("Objeto entregue ao destinatário"));
        assert!(status_indicates_delivery("ENTREGUE"));
        assert!(!status_indicates_delivery("Objeto postado"));
        assert!(!status_indicates_delivery("Objeto saiu para entrega ao destinatário"));
    }

    #[test]
    fn test_decide_lookup_failed() {
        assert_eq!(decide(Some("Objeto postado"), None), StatusOutcome::LookupFailed);
        assert_eq!(decide(None, None), StatusOutcome::LookupFailed);
    }

    #[test]
    fn test_decide_no_change_on_identical_status() {
        assert_eq!(
            decide(Some("Objeto postado"), Some("Objeto postado".to_string())),
            StatusOutcome::NoChange
        );
    }

    #[test]
    fn test_decide_comparison_is_case_sensitive() {
        // Exact string match only; a case change counts as an update
        assert_eq!(
            decide(Some("Objeto postado"), Some("OBJETO POSTADO".to_string())),
            StatusOutcome::Updated("OBJETO POSTADO".to_string())
        );
    }

    #[test]
    fn test_decide_first_status_is_an_update() {
        assert_eq!(
            decide(None, Some("Objeto postado".to_string())),
            StatusOutcome::Updated("Objeto postado".to_string())
        );
    }
}
