//! Background services and remote API clients

pub mod correios_client;
pub mod ocr_client;
pub mod status_refresh;

pub use correios_client::{CorreiosClient, TrackingError};
pub use status_refresh::{RefreshConfig, StatusOutcome, StatusRefreshService, StatusSource};
