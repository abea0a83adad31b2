/*!
 * Error types for the doctrans pipeline.
 *
 * This module contains custom error types for different parts of the pipeline,
 * using the thiserror crate for ergonomic error definitions. The split between
 * transient and permanent engine errors drives the driver's retry policy.
 */

use thiserror::Error;

/// Errors returned by the translation engine boundary
#[derive(Error, Debug)]
pub enum EngineError {
    /// Error when making a request to the engine fails
    #[error("Engine request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an engine response fails
    #[error("Failed to parse engine response: {0}")]
    ParseError(String),

    /// Error returned by the engine service itself
    #[error("Engine responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the engine
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The engine call exceeded the configured per-block time limit
    #[error("Engine call timed out after {0} seconds")]
    Timeout(u64),

    /// The input text was rejected by the engine as malformed
    #[error("Engine rejected input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Whether the driver may retry the call that produced this error.
    ///
    /// Malformed input never succeeds on retry; everything else is treated
    /// as a transient engine or network hiccup.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EngineError::InvalidInput(_))
    }
}

/// Errors that can occur during block extraction
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The document bytes could not be parsed in the declared format
    #[error("Corrupt or unparseable {format} document: {reason}")]
    Corrupt {
        /// Declared document format
        format: String,
        /// Parse failure detail
        reason: String,
    },

    /// The declared format is not supported by any extractor
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// I/O failure while reading document content
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the translation engine
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Error from block extraction
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// The requested job does not exist
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engineError_isRetryable_shouldExcludeInvalidInput() {
        assert!(EngineError::RequestFailed("boom".to_string()).is_retryable());
        assert!(EngineError::Timeout(30).is_retryable());
        assert!(
            EngineError::ApiError {
                status_code: 503,
                message: "overloaded".to_string()
            }
            .is_retryable()
        );
        assert!(!EngineError::InvalidInput("bad bytes".to_string()).is_retryable());
    }

    #[test]
    fn test_extractError_display_shouldIncludeFormat() {
        let err = ExtractError::Corrupt {
            format: "docx".to_string(),
            reason: "missing document.xml".to_string(),
        };
        assert!(err.to_string().contains("docx"));
        assert!(err.to_string().contains("missing document.xml"));
    }
}
