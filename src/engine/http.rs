use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{TranslationEngine, TranslationRequest, TranslationResponse};
use crate::errors::EngineError;

/// HTTP client for a translation engine service
///
/// Speaks a minimal JSON protocol: POST /translate with
/// `{text, source_language?, target_language}`, expecting
/// `{translated_text}` back. A 4xx response is treated as rejected input
/// (not retried); 5xx and transport errors are transient.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    /// Base URL of the engine service
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Error body the engine service returns on failure
#[derive(Debug, Deserialize, Serialize)]
struct EngineErrorBody {
    /// Human-readable error detail
    detail: Option<String>,
}

impl HttpEngine {
    /// Create a new engine client for the given endpoint
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, EngineError> {
        let client = Client::builder()
            // Transport-level ceiling; the driver applies the per-block
            // timeout separately so a stuck connection cannot hang a worker.
            .timeout(Duration::from_secs(timeout_secs.saturating_mul(2)))
            .build()
            .map_err(|e| EngineError::ConnectionError(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn translate_url(&self) -> String {
        format!("{}/translate", self.base_url)
    }
}

#[async_trait]
impl TranslationEngine for HttpEngine {
    async fn translate(
        &self,
        request: TranslationRequest,
    ) -> Result<TranslationResponse, EngineError> {
        debug!(
            "Engine request: {} chars -> {}",
            request.text.len(),
            request.target_language
        );

        let response = self
            .client
            .post(self.translate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    EngineError::ConnectionError(e.to_string())
                } else {
                    EngineError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<EngineErrorBody>()
                .await
                .ok()
                .and_then(|body| body.detail)
                .unwrap_or_else(|| status.to_string());

            error!("Engine returned {}: {}", status, message);

            if status.as_u16() == 429 {
                return Err(EngineError::ApiError {
                    status_code: status.as_u16(),
                    message,
                });
            }
            if status.is_client_error() {
                return Err(EngineError::InvalidInput(message));
            }
            return Err(EngineError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<TranslationResponse>()
            .await
            .map_err(|e| EngineError::ParseError(e.to_string()))
    }

    async fn test_connection(&self) -> Result<(), EngineError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::ConnectionError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::ApiError {
                status_code: response.status().as_u16(),
                message: format!("Health check failed: {}", response.status()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_shouldTrimTrailingSlash() {
        let engine = HttpEngine::new("http://localhost:8090/", 30).unwrap();
        assert_eq!(engine.translate_url(), "http://localhost:8090/translate");
    }

    #[test]
    fn test_translationRequest_serialization_shouldOmitMissingSource() {
        let request = TranslationRequest {
            text: "Bonjour".to_string(),
            source_language: None,
            target_language: "en".to_string(),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("source_language"));
        assert!(json.contains("target_language"));
    }

    #[test]
    fn test_translationRequest_serialization_shouldIncludePresentSource() {
        let request = TranslationRequest {
            text: "Bonjour".to_string(),
            source_language: Some("fr".to_string()),
            target_language: "en".to_string(),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"source_language\":\"fr\""));
    }
}
