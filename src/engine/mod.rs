/*!
 * Translation engine clients.
 *
 * The engine is an opaque text-in/text-out service keyed by language codes.
 * This module defines the boundary trait plus two implementations:
 * - `http`: client for an HTTP engine service
 * - `mock`: scripted engine behaviors for testing
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::EngineError;

/// A single translation request sent to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Text to translate
    pub text: String,
    /// Detected or declared source language, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    /// Target language code
    pub target_language: String,
}

/// The engine's response to a translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    /// Translated text
    pub translated_text: String,
}

/// Common trait for translation engine clients
///
/// The engine is assumed stateless per call, so implementations must be
/// safe to share across concurrent workers.
#[async_trait]
pub trait TranslationEngine: Send + Sync + Debug {
    /// Translate a single piece of text
    async fn translate(
        &self,
        request: TranslationRequest,
    ) -> Result<TranslationResponse, EngineError>;

    /// Test the connection to the engine
    async fn test_connection(&self) -> Result<(), EngineError>;
}

pub mod http;
pub mod mock;

pub use http::HttpEngine;
pub use mock::{MockBehavior, MockEngine};
