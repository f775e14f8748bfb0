//! # grimoire-server
//!
//! Axum server for the grimoire storefront: checkout, payment webhooks and
//! download redemption.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    create_checkout, health_check, missing_token, redeem_download, stripe_webhook,
    verify_payment,
};

pub use config::{AppConfig, StoreBackend};
pub use error::{ApiError, ErrorResponse};
pub use state::{AppState, Backends, PaymentGateway, Payments};

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Purchase
        .route("/api/checkout", post(create_checkout))
        .route("/api/checkout/verify", post(verify_payment))
        .route("/webhook/stripe", post(stripe_webhook))
        // Fulfilment
        .route("/download", get(missing_token))
        .route("/download/{token}", get(redeem_download))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
