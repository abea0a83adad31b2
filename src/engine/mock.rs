/*!
 * Mock engine implementations for testing.
 *
 * This module provides mock engines that simulate different behaviors:
 * - `MockEngine::working()` - Always succeeds with translated text
 * - `MockEngine::failing()` - Always fails with a transient error
 * - `MockEngine::slow(ms)` - Sleeps before answering (for timeout testing)
 *
 * Every engine records the texts it was asked to translate, which lets
 * tests assert that skipped blocks never reached the engine.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{TranslationEngine, TranslationRequest, TranslationResponse};
use crate::errors::EngineError;

/// Behavior mode for the mock engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a tagged translation
    Working,
    /// Always fails with a transient server error
    Failing,
    /// Always fails with an invalid-input error (never retried)
    InvalidInput,
    /// Fails every Nth request with a transient error
    Intermittent {
        /// Every how many requests a failure is injected
        fail_every: usize,
    },
    /// Sleeps before answering, for timeout testing
    Slow {
        /// Delay before responding
        delay_ms: u64,
    },
}

/// Mock engine for testing pipeline behavior
#[derive(Debug)]
pub struct MockEngine {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared across clones
    request_count: Arc<AtomicUsize>,
    /// Every text that reached the engine, shared across clones
    seen_texts: Arc<Mutex<Vec<String>>>,
    /// Per-text behavior overrides, keyed by exact text
    overrides: Arc<Mutex<HashMap<String, MockBehavior>>>,
}

impl MockEngine {
    /// Create a new mock engine with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            seen_texts: Arc::new(Mutex::new(Vec::new())),
            overrides: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a working mock engine that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a failing mock engine that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create an intermittently failing mock engine
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a slow mock engine
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Override the behavior for one exact input text
    pub fn with_override(self, text: &str, behavior: MockBehavior) -> Self {
        self.overrides.lock().insert(text.to_string(), behavior);
        self
    }

    /// Number of requests this engine has received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// All texts that were sent to this engine, in arrival order
    pub fn seen_texts(&self) -> Vec<String> {
        self.seen_texts.lock().clone()
    }

    /// The canonical translation this mock produces for a text
    pub fn expected_translation(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text)
    }
}

impl Clone for MockEngine {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            seen_texts: Arc::clone(&self.seen_texts),
            overrides: Arc::clone(&self.overrides),
        }
    }
}

#[async_trait]
impl TranslationEngine for MockEngine {
    async fn translate(
        &self,
        request: TranslationRequest,
    ) -> Result<TranslationResponse, EngineError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.seen_texts.lock().push(request.text.clone());

        let behavior = self
            .overrides
            .lock()
            .get(&request.text)
            .copied()
            .unwrap_or(self.behavior);

        match behavior {
            MockBehavior::Working => Ok(TranslationResponse {
                translated_text: Self::expected_translation(
                    &request.text,
                    &request.target_language,
                ),
            }),

            MockBehavior::Failing => Err(EngineError::ApiError {
                status_code: 500,
                message: "Simulated engine failure".to_string(),
            }),

            MockBehavior::InvalidInput => Err(EngineError::InvalidInput(
                "Simulated malformed input".to_string(),
            )),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(EngineError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(TranslationResponse {
                        translated_text: Self::expected_translation(
                            &request.text,
                            &request.target_language,
                        ),
                    })
                }
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(TranslationResponse {
                    translated_text: Self::expected_translation(
                        &request.text,
                        &request.target_language,
                    ),
                })
            }
        }
    }

    async fn test_connection(&self) -> Result<(), EngineError> {
        match self.behavior {
            MockBehavior::Failing => Err(EngineError::ConnectionError(
                "Simulated connection failure".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            source_language: Some("fr".to_string()),
            target_language: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn test_workingEngine_shouldReturnTaggedTranslation() {
        let engine = MockEngine::working();

        let response = engine.translate(request("Bonjour")).await.unwrap();
        assert_eq!(response.translated_text, "[en] Bonjour");
    }

    #[tokio::test]
    async fn test_failingEngine_shouldReturnTransientError() {
        let engine = MockEngine::failing();

        let err = engine.translate(request("Bonjour")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_intermittentEngine_shouldFailPeriodically() {
        let engine = MockEngine::intermittent(3);

        assert!(engine.translate(request("one")).await.is_ok());
        assert!(engine.translate(request("two")).await.is_ok());
        assert!(engine.translate(request("three")).await.is_err());
        assert!(engine.translate(request("four")).await.is_ok());
    }

    #[tokio::test]
    async fn test_seenTexts_shouldRecordEveryRequest() {
        let engine = MockEngine::working();

        engine.translate(request("alpha")).await.unwrap();
        engine.translate(request("beta")).await.unwrap();

        assert_eq!(engine.request_count(), 2);
        assert_eq!(engine.seen_texts(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_override_shouldApplyToMatchingTextOnly() {
        let engine = MockEngine::working().with_override("cursed", MockBehavior::Failing);

        assert!(engine.translate(request("fine")).await.is_ok());
        assert!(engine.translate(request("cursed")).await.is_err());
        assert!(engine.translate(request("fine again")).await.is_ok());
    }

    #[tokio::test]
    async fn test_clonedEngine_shouldShareCounters() {
        let engine = MockEngine::working();
        let cloned = engine.clone();

        engine.translate(request("shared")).await.unwrap();
        assert_eq!(cloned.request_count(), 1);
    }
}
