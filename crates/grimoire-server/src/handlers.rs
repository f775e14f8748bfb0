//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use grimoire_core::{CoreError, DownloadGrant};
use grimoire_payments::{
    CheckoutCart, CheckoutRedirect, PaymentVerification, SIGNATURE_HEADER, WebhookReport,
};

use crate::error::ApiError;
use crate::state::{AppState, Payments};

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub store: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(flatten)]
    pub report: WebhookReport,
}

fn payments(state: &AppState) -> Result<&Arc<Payments>, ApiError> {
    state.payments.as_ref().ok_or(ApiError::PaymentsDisabled)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.payments.is_some(),
        store: state.store.name().to_string(),
    })
}

/// Create checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutCart>, JsonRejection>,
) -> Result<Json<CheckoutRedirect>, ApiError> {
    let payments = payments(&state)?;
    let Json(cart) = payload.map_err(|e| ApiError::BadBody {
        code: "INVALID_CART",
        message: e.body_text(),
    })?;

    let redirect = payments.checkout.start(&cart).await?;
    Ok(Json(redirect))
}

/// Verify a checkout session after the provider redirects back
pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<PaymentVerification>, ApiError> {
    let payments = payments(&state)?;
    let Json(request) = payload.map_err(|e| ApiError::BadBody {
        code: "INVALID_INPUT",
        message: e.body_text(),
    })?;

    let session_id = request.session_id.unwrap_or_default();
    let verification = payments.verifier.verify(&session_id).await?;
    Ok(Json(verification))
}

/// Redeem a download token
pub async fn redeem_download(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<DownloadGrant>, ApiError> {
    let grant = state.redeemer.redeem(&token).await?;
    Ok(Json(grant))
}

/// `/download` without a token
pub async fn missing_token() -> ApiError {
    ApiError::Core(CoreError::InvalidInput("download token is required".into()))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let payments = payments(&state)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingSignature)?;

    let report = payments.webhooks.handle(&body, signature).await?;

    Ok(Json(WebhookAck {
        received: true,
        report,
    }))
}
