use thiserror::Error;

/// Application-wide error types for Trawl.
///
/// Expected crawl outcomes (not-found, blocked, duplicate, incomplete) are
/// not errors; they travel as [`FetchOutcome`](crate::models::FetchOutcome)
/// and [`PersistOutcome`](crate::models::PersistOutcome) values.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request could not be built or read.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Proxy allocation or validation failed.
    #[error("Proxy error: {0}")]
    ProxyError(String),

    /// Page content could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
