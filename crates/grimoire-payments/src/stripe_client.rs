//! Stripe Checkout Integration
//!
//! Implements `PaymentProvider` with Stripe's hosted checkout in one-off
//! payment mode.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    Currency, Product, RetrieveCheckoutSessionLineItems,
};

use crate::error::{PaymentError, Result};
use crate::provider::{
    CheckoutRedirect, CheckoutSessionRequest, PaymentProvider, PaymentStatus, PurchasedLineItem,
    SessionSummary,
};

/// Line items fetched per session; carts never come close
const LINE_ITEM_PAGE: u64 = 100;

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    fn session_id(session_id: &str) -> Result<CheckoutSessionId> {
        session_id
            .parse()
            .map_err(|_| PaymentError::InvalidInput(format!("not a checkout session id: {session_id}")))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutRedirect> {
        let mut params = CreateCheckoutSession::new();
        params.customer_email = request.customer_email.as_deref();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);

        if let Some(name) = &request.customer_name {
            let mut metadata = HashMap::new();
            metadata.insert("customer_name".to_string(), name.clone());
            params.metadata = Some(metadata);
        }

        params.line_items = Some(
            request
                .line_items
                .iter()
                .map(|item| CreateCheckoutSessionLineItems {
                    quantity: Some(1),
                    price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                        currency: Currency::EUR,
                        unit_amount: Some(item.unit_amount_cents),
                        product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: item.name.clone(),
                            description: item.description.clone(),
                            metadata: Some(item.metadata.clone().into_iter().collect()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
        );

        let session = StripeCheckoutSession::create(&self.client, params).await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Provider("No checkout URL returned".into()))?;

        Ok(CheckoutRedirect {
            session_id: session.id.to_string(),
            url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSummary> {
        let id = Self::session_id(session_id)?;
        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[]).await?;

        let details = session.customer_details.as_ref();
        let customer_name = details.and_then(|d| d.name.clone()).or_else(|| {
            session
                .metadata
                .as_ref()
                .and_then(|m| m.get("customer_name").cloned())
        });

        Ok(SessionSummary {
            id: session.id.to_string(),
            payment_status: PaymentStatus::parse(session.payment_status.as_str()),
            amount_total: session.amount_total,
            currency: session.currency.map(|c| c.to_string()),
            customer_email: details
                .and_then(|d| d.email.clone())
                .or_else(|| session.customer_email.clone()),
            customer_name,
            payment_intent: session.payment_intent.as_ref().map(|p| p.id().to_string()),
        })
    }

    async fn list_line_items(&self, session_id: &str) -> Result<Vec<PurchasedLineItem>> {
        let id = Self::session_id(session_id)?;
        let params = RetrieveCheckoutSessionLineItems {
            limit: Some(LINE_ITEM_PAGE),
            ..Default::default()
        };
        let list = StripeCheckoutSession::retrieve_line_items(&self.client, &id, &params).await?;

        let mut items = Vec::with_capacity(list.data.len());
        for item in list.data {
            let product_id = item
                .price
                .as_ref()
                .and_then(|price| price.product.as_ref())
                .map(|product| product.id());

            let (description, product_metadata) = match &product_id {
                Some(product_id) => {
                    let product = Product::retrieve(&self.client, product_id, &[]).await?;
                    let metadata: BTreeMap<String, String> =
                        product.metadata.unwrap_or_default().into_iter().collect();
                    (product.name, metadata)
                }
                None => (None, BTreeMap::new()),
            };

            items.push(PurchasedLineItem {
                id: item.id.to_string(),
                description,
                quantity: item.quantity.unwrap_or(1),
                amount_total: item.amount_total,
                currency: item.currency.to_string(),
                product_id: product_id.map(|id| id.to_string()),
                product_metadata,
            });
        }

        tracing::debug!(session_id, count = items.len(), "Fetched Stripe line items");
        Ok(items)
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
