//! Error types for the AptWise question bank.
//!
//! One enum covers every failure category the bank can hit: configuration,
//! I/O, embedding, the vector index, caller input and corpus parsing.

use thiserror::Error;

/// Unified error type for the AptWise question bank.
///
/// Library functions return `Result<T, AppError>`. Public service operations
/// that must never fail an interview flow convert these into conservative
/// defaults at their boundary; the `try_*` variants expose them unchanged.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The vector index could not be reached or rejected a call
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Caller supplied input that cannot be stored or searched
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed corpus files and serialization failures
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error comes from the vector index infrastructure.
    pub fn is_index_unavailable(&self) -> bool {
        matches!(self, AppError::IndexUnavailable(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_maps_to_parse() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_index_unavailable_display() {
        let err = AppError::IndexUnavailable("connection refused".to_string());
        assert!(err.is_index_unavailable());
        assert_eq!(err.to_string(), "Vector index unavailable: connection refused");
    }
}
