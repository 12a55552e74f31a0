//! Common error types for Sitewatch components.

use std::fmt;

/// A specialized Result type for Sitewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Sitewatch operations.
///
/// Probe outcomes are never represented here: a failed probe is a status
/// value, not an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input or an exceeded quota. Nothing was changed.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The target registry could not complete an operation.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An outbound notification could not be delivered.
    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new validation error.
    pub fn validation(msg: impl fmt::Display) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new not-found error.
    pub fn not_found(msg: impl fmt::Display) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new persistence error.
    pub fn persistence(msg: impl fmt::Display) -> Self {
        Error::Persistence(msg.to_string())
    }

    /// Create a new delivery error.
    pub fn delivery(msg: impl fmt::Display) -> Self {
        Error::Delivery(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// Whether the caller is at fault (bad input or unknown id).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::validation("too many websites").to_string(),
            "Validation error: too many websites"
        );
        assert_eq!(Error::not_found("website 1").to_string(), "Not found: website 1");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::validation("x").is_client_error());
        assert!(Error::not_found("x").is_client_error());
        assert!(!Error::persistence("x").is_client_error());
        assert!(!Error::delivery("x").is_client_error());
    }
}
