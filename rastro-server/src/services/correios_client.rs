//! Correios tracking API client
//!
//! One operation: fetch the most recent status label for a tracking code.
//! The response carries the event history newest-first; only the head event
//! matters here. The client never persists anything.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::services::status_refresh::StatusSource;

const TRACKING_BASE_URL: &str = "https://api.rastro.correios.com.br/v1/rastreio";
const USER_AGENT: &str = concat!("rastro/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Tracking client errors
///
/// Callers treat every variant as "no data this cycle"; none of these abort
/// a reconciliation cycle.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Tracking lookup response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackResponse {
    #[serde(default)]
    pub objetos: Vec<TrackedObject>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackedObject {
    #[serde(rename = "codObjeto")]
    pub code: String,
    /// Event history, most recent first
    #[serde(default)]
    pub eventos: Vec<TrackEvent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackEvent {
    pub descricao: String,
    #[serde(rename = "dtHrCriado", default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub unidade: Option<String>,
}

/// Correios API client
pub struct CorreiosClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CorreiosClient {
    pub fn new(api_key: String) -> Result<Self, TrackingError> {
        Self::with_base_url(api_key, TRACKING_BASE_URL.to_string())
    }

    /// Construct against a non-default endpoint (tests)
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, TrackingError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TrackingError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    /// Fetch the full tracking response for a code
    pub async fn track(&self, tracking_code: &str) -> Result<TrackResponse, TrackingError> {
        tracing::debug!(tracking_code, "Querying Correios tracking API");

        let response = self
            .http_client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "objetos": [tracking_code] }))
            .send()
            .await
            .map_err(|e| TrackingError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrackingError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| TrackingError::Parse(e.to_string()))
    }

    /// Most recent status description from a tracking response, if any
    ///
    /// A blank description counts as no data; it must never end up as a
    /// stored status.
    pub fn latest_description(response: &TrackResponse) -> Option<String> {
        response
            .objetos
            .first()?
            .eventos
            .first()
            .map(|e| e.descricao.clone())
            .filter(|d| !d.trim().is_empty())
    }
}

#[async_trait]
impl StatusSource for CorreiosClient {
    async fn latest_status(&self, tracking_code: &str) -> Result<Option<String>, TrackingError> {
        let response = self.track(tracking_code).await?;
        Ok(Self::latest_description(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CorreiosClient::new("test-key".to_string());
        assert!(client.is_ok());
    }

    #[test]
    fn test_latest_description_picks_head_event() {
        let response: TrackResponse = serde_json::from_str(
            r#"{
                "objetos": [{
                    "codObjeto": "QP123456789BR",
                    "eventos": [
                        {"descricao": "Objeto entregue ao destinatário", "dtHrCriado": "2026-08-20T14:02:00"},
                        {"descricao": "Objeto saiu para entrega ao destinatário", "dtHrCriado": "2026-08-20T08:10:00"},
                        {"descricao": "Objeto postado", "dtHrCriado": "2026-08-18T11:30:00"}
                    ]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(
            CorreiosClient::latest_description(&response).as_deref(),
            Some("Objeto entregue ao destinatário")
        );
    }

    #[test]
    fn test_latest_description_empty_events() {
        let response: TrackResponse = serde_json::from_str(
            r#"{"objetos": [{"codObjeto": "QP123456789BR", "eventos": []}]}"#,
        )
        .unwrap();
        assert!(CorreiosClient::latest_description(&response).is_none());
    }

    #[test]
    fn test_latest_description_no_objects() {
        let response: TrackResponse = serde_json::from_str(r#"{"objetos": []}"#).unwrap();
        assert!(CorreiosClient::latest_description(&response).is_none());
    }

    #[test]
    fn test_blank_description_is_no_data() {
        let response: TrackResponse = serde_json::from_str(
            r#"{"objetos": [{"codObjeto": "QP123456789BR", "eventos": [{"descricao": "   "}]}]}"#,
        )
        .unwrap();
        assert!(CorreiosClient::latest_description(&response).is_none());
    }

    #[test]
    fn test_missing_eventos_field_defaults_empty() {
        let response: TrackResponse =
            serde_json::from_str(r#"{"objetos": [{"codObjeto": "QP123456789BR"}]}"#).unwrap();
        assert!(CorreiosClient::latest_description(&response).is_none());
    }
}
