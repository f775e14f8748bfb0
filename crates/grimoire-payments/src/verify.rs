//! Checkout Verification
//!
//! Read-only view of a checkout session for the success page. Advisory: the
//! download redeemer re-validates everything on its own.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use grimoire_core::{PurchaseStore, RetryPolicy};

use crate::error::{PaymentError, Result};
use crate::provider::{PaymentProvider, PurchasedLineItem};

/// Payment state reported back to the storefront
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub success: bool,
    pub paid: bool,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    /// Total in major currency units
    #[serde(with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub items: Vec<PurchasedLineItem>,
    pub payment_intent: Option<String>,
    /// Purchase records minted for this session so far
    pub purchases_recorded: usize,
}

/// Checkout verifier
pub struct PaymentVerifier {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn PurchaseStore>,
    retry: RetryPolicy,
}

impl PaymentVerifier {
    pub fn new(provider: Arc<dyn PaymentProvider>, store: Arc<dyn PurchaseStore>) -> Self {
        Self {
            provider,
            store,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn verify(&self, session_id: &str) -> Result<PaymentVerification> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(PaymentError::InvalidInput("sessionId is required".into()));
        }

        let session = self
            .retry
            .run("retrieve_session", || self.provider.retrieve_session(session_id))
            .await?;
        let items = self
            .retry
            .run("list_line_items", || self.provider.list_line_items(session_id))
            .await?;

        // Webhook may not have landed yet; a lookup failure is not fatal here
        let purchases_recorded = match self.store.find_by_payment_ref(session_id).await {
            Ok(records) => records.len(),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Could not count purchase records");
                0
            }
        };

        Ok(PaymentVerification {
            success: true,
            paid: session.payment_status.is_paid(),
            customer_email: session.customer_email,
            customer_name: session.customer_name,
            amount: session.amount_total.map(|cents| Decimal::new(cents, 2)),
            currency: session.currency,
            items,
            payment_intent: session.payment_intent,
            purchases_recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, CatalogItem, CheckoutCart};
    use crate::checkout::CheckoutInitiator;
    use crate::mock::MockPaymentProvider;
    use grimoire_core::{MemoryStore, ProductKind};
    use rust_decimal_macros::dec;

    async fn open_session(provider: Arc<MockPaymentProvider>) -> String {
        let cart = CheckoutCart {
            cart_items: vec![CartItem {
                kind: ProductKind::Scenario,
                item: CatalogItem {
                    id: "s1".into(),
                    price: dec!(4.5),
                    name: None,
                    display_name: Some("X".into()),
                },
                saga: None,
            }],
            customer_email: None,
            customer_name: None,
        };
        CheckoutInitiator::new(provider, "https://shop.example")
            .start(&cart)
            .await
            .unwrap()
            .session_id
    }

    #[tokio::test]
    async fn test_unpaid_then_paid() {
        let provider = Arc::new(MockPaymentProvider::new());
        let verifier = PaymentVerifier::new(provider.clone(), Arc::new(MemoryStore::new()));
        let session_id = open_session(provider.clone()).await;

        let before = verifier.verify(&session_id).await.unwrap();
        assert!(!before.paid);
        assert_eq!(before.items.len(), 1);

        provider
            .mark_paid(&session_id, "buyer@example.com", Some("Buyer"))
            .await
            .unwrap();
        let after = verifier.verify(&session_id).await.unwrap();
        assert!(after.paid);
        assert_eq!(after.amount, Some(dec!(4.50)));
        assert_eq!(after.currency.as_deref(), Some("eur"));
        assert_eq!(after.customer_email.as_deref(), Some("buyer@example.com"));
        assert!(after.payment_intent.is_some());
        assert_eq!(after.purchases_recorded, 0);
    }

    #[tokio::test]
    async fn test_blank_session_id_rejected() {
        let verifier = PaymentVerifier::new(
            Arc::new(MockPaymentProvider::new()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(
            verifier.verify("  ").await,
            Err(PaymentError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_is_provider_error() {
        let verifier = PaymentVerifier::new(
            Arc::new(MockPaymentProvider::new()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(
            verifier.verify("cs_missing").await,
            Err(PaymentError::Provider(_))
        ));
    }

    #[test]
    fn test_amount_serializes_as_number() {
        let verification = PaymentVerification {
            success: true,
            paid: true,
            customer_email: None,
            customer_name: None,
            amount: Some(Decimal::new(2449, 2)),
            currency: Some("eur".into()),
            items: vec![],
            payment_intent: None,
            purchases_recorded: 1,
        };
        let json = serde_json::to_value(&verification).unwrap();
        assert_eq!(json["amount"], serde_json::json!(24.49));
        assert_eq!(json["purchasesRecorded"], 1);
    }
}
