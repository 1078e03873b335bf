//! Unified error types for Quizcast.

use thiserror::Error;

/// Result type alias using QuizError.
pub type Result<T> = std::result::Result<T, QuizError>;

#[derive(Error, Debug)]
pub enum QuizError {
    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Problem / catalog source errors
    #[error("Source error: {0}")]
    Source(String),

    // Durable store errors
    #[error("Store error: {0}")]
    Store(String),

    // Channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Image probe error: {0}")]
    Image(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl QuizError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn data_source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuizError::Source("sheet unreachable".into());
        assert!(err.to_string().contains("sheet unreachable"));
        assert!(err.to_string().starts_with("Source error"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(QuizError::config("x"), QuizError::Config(_)));
        assert!(matches!(QuizError::data_source("x"), QuizError::Source(_)));
        assert!(matches!(QuizError::store("x"), QuizError::Store(_)));
        assert!(matches!(QuizError::channel("x"), QuizError::Channel(_)));
        assert!(matches!(QuizError::http("x"), QuizError::Http(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuizError = io_err.into();
        assert!(matches!(err, QuizError::Io(_)));
    }
}
