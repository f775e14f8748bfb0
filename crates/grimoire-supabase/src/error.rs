//! Supabase Error Types

use grimoire_core::CoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SupabaseError>;

/// Errors talking to Supabase
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Transport failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response
    #[error("API error: {status} - {message}")]
    Api { status: StatusCode, message: String },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or malformed settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SupabaseError {
    /// Transient failures worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Map a database failure onto the domain error
    pub fn into_persistence(self) -> CoreError {
        match &self {
            Self::Api { status, message } if *status == StatusCode::CONFLICT => {
                CoreError::Duplicate(message.clone())
            }
            Self::Config(msg) => CoreError::Config(msg.clone()),
            _ if self.is_transient() => CoreError::Unavailable(self.to_string()),
            _ => CoreError::Persistence(self.to_string()),
        }
    }

    /// Map a storage failure onto the domain error
    pub fn into_file_storage(self) -> CoreError {
        match self {
            Self::Config(msg) => CoreError::Config(msg),
            other => CoreError::FileStorage(other.to_string()),
        }
    }
}
