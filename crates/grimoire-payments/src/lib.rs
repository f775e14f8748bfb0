//! # grimoire-payments
//!
//! Checkout, payment webhooks and purchase minting for the grimoire
//! storefront.
//!
//! ## Purchase Flow
//!
//! **Flow:** Storefront cart → Stripe hosted checkout → webhook → e-mailed
//! download link
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Storefront │────▶│  Stripe Hosted  │────▶│  Storefront │
//! │   (cart)    │     │  Checkout Page  │     │  (success)  │
//! └─────────────┘     └────────┬────────┘     └─────────────┘
//!                              │ checkout.session.completed
//!                              ▼
//!                     ┌─────────────────┐     ┌─────────────┐
//!                     │ WebhookHandler  │────▶│ Notification│
//!                     │ (1 record/item) │     │ (link mail) │
//!                     └─────────────────┘     └─────────────┘
//! ```
//!
//! Every cart entry becomes its own line item. The provider-side product
//! carries `kind` / `item_id` metadata, which is how the webhook maps a paid
//! line back to a catalog product. Records are unique per
//! `(session, kind, product)`, so redelivered events mint nothing new. A
//! session paid by a delayed method mints on `async_payment_succeeded`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grimoire_payments::{CheckoutInitiator, StripeClient};
//!
//! let stripe = Arc::new(StripeClient::from_env()?);
//! let checkout = CheckoutInitiator::new(stripe, "https://shop.example");
//!
//! let redirect = checkout.start(&cart).await?;
//! // Redirect buyer to: redirect.url
//! ```

mod cart;
mod checkout;
mod error;
mod mock;
mod provider;
mod stripe_client;
mod verify;
mod webhook;

pub use cart::{CartItem, CatalogItem, CheckoutCart, SagaRef, metadata, resolve_product};
pub use checkout::CheckoutInitiator;
pub use error::{PaymentError, Result};
pub use mock::MockPaymentProvider;
pub use provider::{
    CURRENCY, CheckoutRedirect, CheckoutSessionRequest, LineItemRequest, PaymentProvider,
    PaymentStatus, PurchasedLineItem, SessionSummary,
};
pub use stripe_client::StripeClient;
pub use verify::{PaymentVerification, PaymentVerifier};
pub use webhook::{
    DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, WebhookEvent, WebhookHandler, WebhookReport,
    WebhookVerifier,
};
