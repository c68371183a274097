//! Error handling for TimeSked
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for the TimeSked application
#[derive(Error, Debug)]
pub enum TimeSkedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Telegram download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("Google Calendar error: {0}")]
    Google(#[from] GoogleError),

    #[error("Generative model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Google Calendar API specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoogleError {
    #[error("Google Calendar API error: {0}")]
    ApiError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Access has been revoked, the calendar must be linked again")]
    TokenRevoked,

    #[error("Calendar is not linked")]
    NotLinked,

    #[error("Malformed batch response: {0}")]
    BatchParse(String),

    #[error("Event creation failed: {0}")]
    EventCreationFailed(String),
}

/// Generative model specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model internal error: {0}")]
    InternalError(String),

    #[error("Model response blocked: {0}")]
    Blocked(String),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

/// Result type alias for TimeSked operations
pub type Result<T> = std::result::Result<T, TimeSkedError>;

/// Result type alias for Google Calendar operations
pub type GoogleResult<T> = std::result::Result<T, GoogleError>;

impl TimeSkedError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            TimeSkedError::Database(_) => false,
            TimeSkedError::Migration(_) => false,
            TimeSkedError::Telegram(_) => true,
            TimeSkedError::Download(_) => true,
            TimeSkedError::Google(GoogleError::TokenRevoked) => false,
            TimeSkedError::Google(GoogleError::NotLinked) => false,
            TimeSkedError::Google(_) => true,
            TimeSkedError::Model(e) => e.is_recoverable(),
            TimeSkedError::Config(_) => false,
            TimeSkedError::NotFound(_) => false,
            TimeSkedError::Redis(_) => true,
            TimeSkedError::Http(_) => true,
            TimeSkedError::Serialization(_) => false,
            TimeSkedError::Io(_) => true,
            TimeSkedError::UrlParse(_) => false,
            TimeSkedError::InvalidInput(_) => false,
            TimeSkedError::ServiceUnavailable(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TimeSkedError::Database(_) => ErrorSeverity::Critical,
            TimeSkedError::Migration(_) => ErrorSeverity::Critical,
            TimeSkedError::Config(_) => ErrorSeverity::Critical,
            TimeSkedError::Google(GoogleError::TokenRevoked) => ErrorSeverity::Warning,
            TimeSkedError::NotFound(_) => ErrorSeverity::Info,
            TimeSkedError::InvalidInput(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// True when the user has to link the calendar again to continue
    pub fn requires_relink(&self) -> bool {
        matches!(
            self,
            TimeSkedError::Google(GoogleError::TokenRevoked)
                | TimeSkedError::Google(GoogleError::NotLinked)
        )
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ModelError {
    /// Server-side failures are worth another round; a rejected request or a blocked prompt is not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ModelError::InternalError(_) | ModelError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoked_token_requires_relink() {
        let err = TimeSkedError::from(GoogleError::TokenRevoked);
        assert!(err.requires_relink());
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_model_hiccup_is_recoverable() {
        let err = TimeSkedError::from(ModelError::InternalError("500".to_string()));
        assert!(err.is_recoverable());
        assert!(!err.requires_relink());
    }

    #[test]
    fn test_rejected_model_request_is_permanent() {
        assert!(!ModelError::Request("API key not valid".to_string()).is_recoverable());
        assert!(!ModelError::Blocked("SAFETY".to_string()).is_recoverable());
        assert!(ModelError::EmptyResponse.is_recoverable());
    }
}
