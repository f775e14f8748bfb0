//! Error Types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or missing request data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No purchase record carries this download token
    #[error("Download token not found")]
    TokenNotFound,

    /// The download window has closed
    #[error("Download token expired at {expires_at}")]
    TokenExpired { expires_at: DateTime<Utc> },

    /// Every permitted download has been used
    #[error("Download quota of {max_downloads} exhausted")]
    QuotaExceeded { max_downloads: u32 },

    /// Uniqueness constraint hit on insert
    #[error("Record already exists: {0}")]
    Duplicate(String),

    /// Store read/write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Store temporarily unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// File signing or lookup failed
    #[error("File storage error: {0}")]
    FileStorage(String),

    /// Notification could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::FileStorage(_) | Self::Notification(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => format!("Invalid request: {msg}"),
            Self::TokenNotFound => "This download link is invalid.".into(),
            Self::TokenExpired { .. } => {
                "This download link has expired. Please contact support.".into()
            }
            Self::QuotaExceeded { max_downloads } => format!(
                "This download link has reached its limit of {max_downloads} downloads."
            ),
            Self::FileStorage(_) => "The file is temporarily unavailable. Please try again.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
