//! Payment Error Types

use grimoire_core::{CoreError, Retryable};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Cart is empty or malformed
    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    /// Malformed request data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Payment provider API error
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Payment provider unreachable or rate limiting
    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Purchase store, catalog or notification failure
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderUnavailable(_) => true,
            Self::Core(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCart(msg) => format!("Your cart could not be checked out: {msg}"),
            Self::InvalidInput(msg) => format!("Invalid request: {msg}"),
            Self::Provider(_) | Self::ProviderUnavailable(_) => {
                "Payment processing failed. Please try again.".into()
            }
            Self::WebhookSignature(_) => "Invalid webhook signature.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            Self::Core(e) => e.user_message(),
            Self::WebhookParse(_) => "An error occurred processing your request.".into(),
        }
    }
}

impl Retryable for PaymentError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        match err {
            stripe::StripeError::Timeout | stripe::StripeError::ClientError(_) => {
                Self::ProviderUnavailable(err.to_string())
            }
            _ => Self::Provider(err.to_string()),
        }
    }
}
