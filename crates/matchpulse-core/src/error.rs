use thiserror::Error;

/// Application-wide error types for matchpulse.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source unreachable or the rendered page never stabilized.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Navigation or render exceeded its bound.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// A single record's fields could not be parsed.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// The ingestion boundary rejected the batch or could not be reached.
    #[error("Ingestion error{}: {message}", .status_code.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    IngestionError {
        message: String,
        status_code: Option<u16>,
    },

    /// Invalid schedule expression or unparseable required setting.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error is transient and a new attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ConnectionError(_) | AppError::Timeout(_) | AppError::IngestionError { .. }
        )
    }

    /// Returns true if this error must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConfigError(_))
    }
}
