//! Payment Provider Abstraction
//!
//! The hosted checkout is a black box; this trait is everything the
//! storefront needs from it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settlement currency for every checkout
pub const CURRENCY: &str = "eur";

/// One priced line of a checkout request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub name: String,
    pub description: Option<String>,
    /// Unit price in minor currency units
    pub unit_amount_cents: i64,
    /// Correlation metadata stored on the provider-side product
    pub metadata: BTreeMap<String, String>,
}

/// Everything needed to open a hosted checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<LineItemRequest>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Provider-issued checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRedirect {
    pub session_id: String,
    /// Hosted checkout page to redirect the buyer to
    pub url: String,
}

/// Payment state of a checkout session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid | Self::NoPaymentRequired)
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paid" => Self::Paid,
            "no_payment_required" => Self::NoPaymentRequired,
            _ => Self::Unpaid,
        }
    }
}

/// Read-only view of a checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// Total in minor units
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub payment_intent: Option<String>,
}

/// A line item of a completed session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedLineItem {
    pub id: String,
    pub description: Option<String>,
    pub quantity: u64,
    /// Line total in minor units
    pub amount_total: i64,
    pub currency: String,
    /// Provider-side product id
    pub product_id: Option<String>,
    /// Correlation metadata copied from the provider-side product
    #[serde(skip)]
    pub product_metadata: BTreeMap<String, String>,
}

/// Payment provider trait (Strategy pattern)
///
/// `StripeClient` talks to Stripe; `MockPaymentProvider` keeps sessions in
/// memory for development and tests.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a hosted checkout session
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutRedirect>;

    /// Fetch a session's payment state and buyer details
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSummary>;

    /// Fetch a session's line items with their product metadata
    async fn list_line_items(&self, session_id: &str) -> Result<Vec<PurchasedLineItem>>;

    /// Provider name
    fn name(&self) -> &str;
}
