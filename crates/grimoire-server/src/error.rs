//! API Error Mapping
//!
//! Every failure leaves the server as `{ "error": ..., "code": ... }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use grimoire_core::CoreError;
use grimoire_payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Stripe is not configured on this instance
    #[error("Payments not configured")]
    PaymentsDisabled,

    /// Webhook arrived without a signature header
    #[error("Missing Stripe signature")]
    MissingSignature,

    /// Request body could not be read as the expected JSON
    #[error("Malformed request body: {message}")]
    BadBody { code: &'static str, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl ApiError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::PaymentsDisabled => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
            Self::MissingSignature => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
            Self::BadBody { code, .. } => (StatusCode::BAD_REQUEST, *code),
            Self::Core(e) => core_status(e),
            Self::Payment(e) => match e {
                PaymentError::InvalidCart(_) => (StatusCode::BAD_REQUEST, "INVALID_CART"),
                PaymentError::InvalidInput(_) | PaymentError::WebhookParse(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT")
                }
                PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
                PaymentError::Provider(_)
                | PaymentError::ProviderUnavailable(_)
                | PaymentError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR"),
                PaymentError::Core(e) => core_status(e),
            },
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::PaymentsDisabled | Self::MissingSignature => self.to_string(),
            Self::BadBody { message, .. } => format!("Invalid request: {message}"),
            Self::Core(e) => e.user_message(),
            Self::Payment(e) => e.user_message(),
        }
    }
}

const fn core_status(error: &CoreError) -> (StatusCode, &'static str) {
    match error {
        CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        CoreError::TokenNotFound => (StatusCode::NOT_FOUND, "LINK_INVALID"),
        CoreError::TokenExpired { .. } => (StatusCode::GONE, "LINK_EXPIRED"),
        CoreError::QuotaExceeded { .. } => (StatusCode::FORBIDDEN, "LIMIT_REACHED"),
        CoreError::FileStorage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::warn!(code, error = %self, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.user_message(),
                code: code.into(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_redemption_failures() {
        assert_eq!(
            ApiError::from(CoreError::TokenNotFound).status_and_code(),
            (StatusCode::NOT_FOUND, "LINK_INVALID")
        );
        assert_eq!(
            ApiError::from(CoreError::TokenExpired { expires_at: Utc::now() }).status_and_code(),
            (StatusCode::GONE, "LINK_EXPIRED")
        );
        assert_eq!(
            ApiError::from(CoreError::QuotaExceeded { max_downloads: 3 }).status_and_code(),
            (StatusCode::FORBIDDEN, "LIMIT_REACHED")
        );
        assert_eq!(
            ApiError::from(CoreError::FileStorage("sign".into())).status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
        );
    }

    #[test]
    fn test_payment_failures() {
        assert_eq!(
            ApiError::from(PaymentError::InvalidCart("empty".into())).status_and_code(),
            (StatusCode::BAD_REQUEST, "INVALID_CART")
        );
        assert_eq!(
            ApiError::from(PaymentError::WebhookSignature("bad".into())).status_and_code(),
            (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE")
        );
        assert_eq!(
            ApiError::from(PaymentError::ProviderUnavailable("down".into())).status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR")
        );
        assert_eq!(
            ApiError::from(PaymentError::Core(CoreError::Unavailable("db".into())))
                .status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR")
        );
        assert_eq!(
            ApiError::PaymentsDisabled.status_and_code(),
            (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED")
        );
    }
}
