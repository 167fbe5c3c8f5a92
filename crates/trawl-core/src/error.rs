use thiserror::Error;

/// Application-wide error types for trawl.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request could not be built or its body could not be read.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Request timed out.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Every CORS proxy failed for a source.
    #[error("Source '{source_id}' unreachable after trying {attempts} proxies")]
    SourceUnreachable { source_id: String, attempts: usize },

    /// A feed, JSON document, or HTML page could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid or missing configuration (tunables, vendor selectors).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The injected source store failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A pooled task was dropped or panicked before producing a result.
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if another attempt could plausibly succeed.
    ///
    /// Every transport failure and every non-success status counts; bad
    /// configuration, unparseable payloads and local failures do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::HttpStatus { .. }
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::SourceUnreachable { .. }
        )
    }
}
