//! Gemini vision OCR client
//!
//! Sends an extraction prompt plus the uploaded image (base64 inline data)
//! to the generateContent endpoint and parses the model's free-text JSON
//! reply into [`PackageExtraction`]. The model is instructed to answer with
//! bare JSON, but replies wrapped in markdown code fences are tolerated.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const GEMINI_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Extraction prompt. Field-by-field instructions with a strict
/// JSON-only output contract; unknown fields must come back null.
const EXTRACTION_PROMPT: &str = r#"You are a backend data-extraction system. Analyze the provided image of an online purchase page and extract the following fields:

1. "tracking_code": the shipment tracking code, a combination of letters and digits. Look for labels like "Código de Rastreio" or "Rastreamento", or an isolated alphanumeric sequence.
2. "title": the main product name or a descriptive title for the purchase.
3. "carrier": the logistics provider (e.g. "Correios", "Jadlog", "Loggi").
4. "store_name": the retailer (e.g. "Amazon", "Mercado Livre"), usually prominent at the top of the page.
5. "estimated_delivery_date": the expected delivery date, formatted DD-MM-YYYY. Look for "Chega em", "Previsão de entrega" or similar.
6. "status": the current delivery status (e.g. "A caminho", "Entregue", "Preparando pedido").

Rules:
- Respond with EXCLUSIVELY a valid JSON object. No prose, no explanation, no markdown fences.
- The object must contain every key listed above.
- If a field cannot be read clearly and unambiguously from the image, its value MUST be null. Never invent information."#;

/// OCR client errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Structured fields extracted from a purchase-page screenshot
///
/// Every field is optional: the model returns null for anything it could
/// not read with confidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageExtraction {
    pub tracking_code: Option<String>,
    pub title: Option<String>,
    pub carrier: Option<String>,
    pub store_name: Option<String>,
    pub estimated_delivery_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini generateContent client
pub struct GeminiOcrClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiOcrClient {
    pub fn new(api_key: String) -> Result<Self, OcrError> {
        Self::with_base_url(api_key, GEMINI_BASE_URL.to_string())
    }

    /// Construct against a non-default endpoint (tests)
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, OcrError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| OcrError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    /// Extract package fields from an image
    pub async fn extract(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<PackageExtraction, OcrError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": EXTRACTION_PROMPT },
                    {
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": base64::engine::general_purpose::STANDARD.encode(image),
                        }
                    }
                ]
            }]
        });

        let response = self
            .http_client
            .post(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OcrError::Api(status.as_u16(), error_text));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| OcrError::Parse(e.to_string()))?;

        let text = reply
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.clone()))
            .ok_or(OcrError::EmptyResponse)?;

        parse_extraction(&text)
    }
}

/// Parse the model's reply, tolerating markdown code fences
pub fn parse_extraction(reply: &str) -> Result<PackageExtraction, OcrError> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned).map_err(|e| OcrError::Parse(e.to_string()))
}

/// Remove a surrounding ```json ... ``` (or plain ```) fence, if present
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_json_fence() {
        let reply = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_bare_fence() {
        let reply = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_no_fence() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_extraction_full_reply() {
        let reply = r#"```json
        {
            "tracking_code": "QP123456789BR",
            "title": "Smart Lâmpada Wi-Fi",
            "carrier": "Correios",
            "store_name": "Amazon.com.br",
            "estimated_delivery_date": "20-10-2026",
            "status": "Enviado"
        }
        ```"#;

        let extraction = parse_extraction(reply).unwrap();
        assert_eq!(extraction.tracking_code.as_deref(), Some("QP123456789BR"));
        assert_eq!(extraction.carrier.as_deref(), Some("Correios"));
        assert_eq!(extraction.status.as_deref(), Some("Enviado"));
    }

    #[test]
    fn test_parse_extraction_null_fields() {
        let reply = r#"{
            "tracking_code": "ML987654321",
            "title": "Capa de Silicone",
            "carrier": null,
            "store_name": "Mercado Livre",
            "estimated_delivery_date": null,
            "status": null
        }"#;

        let extraction = parse_extraction(reply).unwrap();
        assert_eq!(extraction.tracking_code.as_deref(), Some("ML987654321"));
        assert!(extraction.carrier.is_none());
        assert!(extraction.status.is_none());
    }

    #[test]
    fn test_parse_extraction_rejects_prose() {
        let reply = "Sorry, I could not find any package details in this image.";
        assert!(parse_extraction(reply).is_err());
    }

    #[test]
    fn test_client_creation() {
        assert!(GeminiOcrClient::new("test-key".to_string()).is_ok());
    }
}
