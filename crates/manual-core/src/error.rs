//! Error types for the manual library.
//!
//! Validation failures carry every message found during a write so the HTTP
//! layer can report them together; everything else is an infrastructure error.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the manual library.
#[derive(Debug, Error)]
pub enum ManualError {
    // Domain errors
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Manual not found: {id}")]
    ManualNotFound { id: i64 },

    #[error("Attachment not found: {key}")]
    AttachmentNotFound { key: String },

    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Network errors (remote images while seeding)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for manual operations.
pub type Result<T> = std::result::Result<T, ManualError>;

impl From<std::io::Error> for ManualError {
    fn from(err: std::io::Error) -> Self {
        ManualError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ManualError {
    fn from(err: serde_json::Error) -> Self {
        ManualError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ManualError {
    fn from(err: rusqlite::Error) -> Self {
        ManualError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ManualError {
    fn from(err: reqwest::Error) -> Self {
        ManualError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ManualError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ManualError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Validation messages, if this is a validation failure.
    pub fn validation_messages(&self) -> Option<&[String]> {
        match self {
            ManualError::Validation(messages) => Some(messages),
            _ => None,
        }
    }

    /// Whether the error refers to a record that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManualError::ManualNotFound { .. } | ManualError::AttachmentNotFound { .. }
        )
    }
}
