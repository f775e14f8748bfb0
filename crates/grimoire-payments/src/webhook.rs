//! Stripe Webhook Handling
//!
//! Verifies webhook authenticity and mints one purchase record, with its own
//! download token, per paid line item.

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use grimoire_core::{
    CatalogStore, CoreError, NewPurchase, Notification, NotificationDispatcher, PurchaseRecord,
    PurchaseStore, RetryPolicy,
};

use crate::cart::resolve_product;
use crate::error::{PaymentError, Result};
use crate::provider::{PaymentProvider, PaymentStatus, PurchasedLineItem};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed payload, in seconds
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Delayed payment methods (e.g. SEPA debit) settle after checkout completes
const CHECKOUT_ASYNC_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

/// Event kinds we know about and deliberately do nothing with
const ACKNOWLEDGED_EVENTS: &[&str] = &[
    "checkout.session.expired",
    "checkout.session.async_payment_failed",
    "payment_intent.created",
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "charge.succeeded",
    "charge.updated",
    "charge.refunded",
];

/// Webhook signature verification (`t=<unix>,v1=<hex hmac>` scheme)
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    #[must_use]
    pub const fn with_tolerance(mut self, tolerance_secs: u64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Produce a signature header for `payload` (local tooling and tests)
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let signature = hex::encode(self.mac(timestamp, payload)?.finalize().into_bytes());
        Ok(format!("t={timestamp},v1={signature}"))
    }

    /// Verify a signature header against the raw payload
    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::WebhookSignature("missing v1 signature".into()));
        }
        if now.abs_diff(timestamp) > self.tolerance_secs {
            return Err(PaymentError::WebhookSignature(
                "timestamp outside tolerance".into(),
            ));
        }

        for signature in signatures {
            let Ok(expected) = hex::decode(signature) else {
                continue;
            };
            if self.mac(timestamp, payload)?.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }

        Err(PaymentError::WebhookSignature("no matching signature".into()))
    }
}

/// Raw provider event envelope
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EnvelopeData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EnvelopeData {
    pub object: serde_json::Value,
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout completed, or its delayed payment settled.
    ///
    /// Records are minted only once `payment_status` is paid.
    CheckoutCompleted {
        session_id: String,
        payment_status: PaymentStatus,
        customer_email: Option<String>,
        customer_name: Option<String>,
    },

    /// Known event kind with no side effect
    Acknowledged { event_type: String },

    /// Unrecognized event kind, acknowledged for forward compatibility
    Other { event_type: String },
}

impl WebhookEvent {
    /// Parse a provider event into our event type
    pub fn from_envelope(envelope: &WebhookEnvelope) -> Result<Self> {
        let event_type = envelope.event_type.as_str();

        if event_type == CHECKOUT_COMPLETED || event_type == CHECKOUT_ASYNC_SUCCEEDED {
            let object = &envelope.data.object;
            let session_id = object
                .get("id")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| PaymentError::WebhookParse("checkout session without id".into()))?;
            let text = |path: &[&str]| {
                path.iter()
                    .try_fold(object, |value, key| value.get(key))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            };

            return Ok(Self::CheckoutCompleted {
                session_id: session_id.to_string(),
                payment_status: PaymentStatus::parse(
                    object
                        .get("payment_status")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default(),
                ),
                customer_email: text(&["customer_details", "email"])
                    .or_else(|| text(&["customer_email"])),
                customer_name: text(&["customer_details", "name"])
                    .or_else(|| text(&["metadata", "customer_name"])),
            });
        }

        if ACKNOWLEDGED_EVENTS.contains(&event_type) {
            return Ok(Self::Acknowledged {
                event_type: event_type.to_string(),
            });
        }

        Ok(Self::Other {
            event_type: event_type.to_string(),
        })
    }
}

/// Outcome of one webhook delivery
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookReport {
    pub event_id: String,
    pub event_type: String,
    /// Records created by this delivery
    pub minted: usize,
    /// Line items already recorded by an earlier delivery
    pub duplicates: usize,
    /// Line items whose catalog product could not be resolved
    pub skipped: usize,
    /// Line items whose record could not be stored
    pub failed: usize,
}

/// Webhook handler
pub struct WebhookHandler {
    verifier: WebhookVerifier,
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn PurchaseStore>,
    catalog: Arc<dyn CatalogStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    public_base_url: String,
    retry: RetryPolicy,
}

impl WebhookHandler {
    pub fn new(
        verifier: WebhookVerifier,
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn PurchaseStore>,
        catalog: Arc<dyn CatalogStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            provider,
            store,
            catalog,
            notifier,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Link the buyer follows to redeem a token
    pub fn redemption_link(&self, record: &PurchaseRecord) -> String {
        format!("{}/download/{}", self.public_base_url, record.download_token)
    }

    /// Verify, parse and process one delivery
    pub async fn handle(&self, payload: &[u8], signature: &str) -> Result<WebhookReport> {
        self.verifier
            .verify(payload, signature, Utc::now().timestamp())?;

        let envelope: WebhookEnvelope = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        tracing::info!(event_id = %envelope.id, event_type = %envelope.event_type, "Processing webhook");

        let event = WebhookEvent::from_envelope(&envelope)?;
        let mut report = WebhookReport {
            event_id: envelope.id.clone(),
            event_type: envelope.event_type.clone(),
            ..Default::default()
        };

        match event {
            WebhookEvent::CheckoutCompleted {
                session_id,
                payment_status,
                customer_email,
                customer_name,
            } => {
                if !payment_status.is_paid() {
                    tracing::info!(
                        session_id = %session_id,
                        status = ?payment_status,
                        "Payment not settled yet; waiting for async_payment_succeeded"
                    );
                    return Ok(report);
                }
                self.mint_purchases(
                    &session_id,
                    customer_email.as_deref(),
                    customer_name.as_deref(),
                    &mut report,
                )
                .await?;
            }
            WebhookEvent::Acknowledged { event_type } => {
                tracing::debug!(event_type = %event_type, "Acknowledged webhook event");
            }
            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }

        Ok(report)
    }

    /// One record per line item; a failing item never aborts the others
    async fn mint_purchases(
        &self,
        session_id: &str,
        customer_email: Option<&str>,
        customer_name: Option<&str>,
        report: &mut WebhookReport,
    ) -> Result<()> {
        let line_items = self
            .retry
            .run("list_line_items", || self.provider.list_line_items(session_id))
            .await?;

        for item in &line_items {
            let Some((kind, product_id)) = resolve_product(&item.product_metadata) else {
                tracing::warn!(
                    session_id,
                    line_item = %item.id,
                    provider_product = ?item.product_id,
                    "Line item has no catalog product; skipping"
                );
                report.skipped += 1;
                continue;
            };

            let record = PurchaseRecord::mint(
                NewPurchase {
                    external_payment_ref: session_id.to_string(),
                    product_kind: kind,
                    product_id,
                    customer_email: customer_email.map(str::to_string),
                    customer_name: customer_name.map(str::to_string),
                },
                Utc::now(),
            );

            match self
                .retry
                .run("insert_purchase", || self.store.insert(&record))
                .await
            {
                Ok(()) => {
                    report.minted += 1;
                    tracing::info!(
                        purchase_id = %record.id,
                        session_id,
                        product_id = %record.product_id,
                        "Created purchase record"
                    );
                }
                Err(CoreError::Duplicate(_)) => {
                    report.duplicates += 1;
                    tracing::info!(
                        session_id,
                        product_id = %record.product_id,
                        "Purchase already recorded; skipping redelivery"
                    );
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        session_id,
                        product_id = %record.product_id,
                        error = %e,
                        "Failed to store purchase record"
                    );
                    continue;
                }
            }

            self.notify(&record, item).await;
        }

        Ok(())
    }

    /// Failures are logged; the stored record stays valid either way
    async fn notify(&self, record: &PurchaseRecord, item: &PurchasedLineItem) {
        let Some(recipient) = record.customer_email.clone() else {
            tracing::warn!(purchase_id = %record.id, "No buyer e-mail; download link not sent");
            return;
        };

        let product_name = match self
            .catalog
            .product(record.product_kind, &record.product_id)
            .await
        {
            Ok(Some(product)) => product.title,
            _ => item
                .description
                .clone()
                .unwrap_or_else(|| record.product_id.clone()),
        };

        let notification = Notification {
            recipient,
            customer_name: record.customer_name.clone(),
            product_name,
            redemption_link: self.redemption_link(record),
            expires_at: record.expires_at,
        };

        if let Err(e) = self.notifier.send(&notification).await {
            tracing::error!(
                purchase_id = %record.id,
                error = %e,
                "Failed to send download link"
            );
        }
    }
}
