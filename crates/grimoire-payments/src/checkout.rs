//! Checkout Initiation
//!
//! Prices the cart, opens a hosted checkout session and hands back the
//! redirect target.

use std::sync::Arc;

use grimoire_core::RetryPolicy;

use crate::cart::CheckoutCart;
use crate::error::Result;
use crate::provider::{CheckoutRedirect, CheckoutSessionRequest, PaymentProvider};

/// Placeholder the provider substitutes with the real session id
const SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Checkout initiator
pub struct CheckoutInitiator {
    provider: Arc<dyn PaymentProvider>,
    public_base_url: String,
    retry: RetryPolicy,
}

impl CheckoutInitiator {
    pub fn new(provider: Arc<dyn PaymentProvider>, public_base_url: impl Into<String>) -> Self {
        Self {
            provider,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Where the provider sends the buyer after paying
    pub fn success_url(&self) -> String {
        format!("{}/success?session_id={SESSION_PLACEHOLDER}", self.public_base_url)
    }

    /// Where the provider sends the buyer after cancelling
    pub fn cancel_url(&self) -> String {
        format!("{}/cart", self.public_base_url)
    }

    /// Validate the cart and open a checkout session
    pub async fn start(&self, cart: &CheckoutCart) -> Result<CheckoutRedirect> {
        let line_items = cart.line_items()?;

        let request = CheckoutSessionRequest {
            line_items,
            customer_email: cart
                .customer_email
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            customer_name: cart.customer_name.clone(),
            success_url: self.success_url(),
            cancel_url: self.cancel_url(),
        };

        let redirect = self
            .retry
            .run("create_checkout_session", || {
                self.provider.create_checkout_session(&request)
            })
            .await?;

        tracing::info!(
            session_id = %redirect.session_id,
            items = request.line_items.len(),
            provider = self.provider.name(),
            "Checkout session created"
        );

        Ok(redirect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, CatalogItem};
    use crate::error::PaymentError;
    use crate::mock::MockPaymentProvider;
    use grimoire_core::ProductKind;
    use rust_decimal_macros::dec;

    fn cart() -> CheckoutCart {
        CheckoutCart {
            cart_items: vec![
                CartItem {
                    kind: ProductKind::Scenario,
                    item: CatalogItem {
                        id: "s1".into(),
                        price: dec!(4.5),
                        name: None,
                        display_name: Some("X".into()),
                    },
                    saga: None,
                },
                CartItem {
                    kind: ProductKind::Saga,
                    item: CatalogItem {
                        id: "g1".into(),
                        price: dec!(19.99),
                        name: Some("Ashes of the Vale".into()),
                        display_name: None,
                    },
                    saga: None,
                },
            ],
            customer_email: Some(" buyer@example.com ".into()),
            customer_name: None,
        }
    }

    #[tokio::test]
    async fn test_start_creates_one_line_per_cart_entry() {
        let provider = Arc::new(MockPaymentProvider::new());
        let initiator = CheckoutInitiator::new(provider.clone(), "https://shop.example/");

        let redirect = initiator.start(&cart()).await.unwrap();
        assert!(redirect.url.contains(&redirect.session_id));

        let items = provider.list_line_items(&redirect.session_id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].amount_total, 450);
        assert_eq!(items[1].amount_total, 1999);

        let session = provider.retrieve_session(&redirect.session_id).await.unwrap();
        assert_eq!(session.customer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(session.amount_total, Some(2449));
    }

    #[test]
    fn test_redirect_urls() {
        let initiator =
            CheckoutInitiator::new(Arc::new(MockPaymentProvider::new()), "https://shop.example/");
        assert_eq!(
            initiator.success_url(),
            "https://shop.example/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(initiator.cancel_url(), "https://shop.example/cart");
    }

    #[tokio::test]
    async fn test_empty_cart_never_reaches_provider() {
        let provider = Arc::new(MockPaymentProvider::new());
        provider.set_failing(true);
        let initiator = CheckoutInitiator::new(provider, "https://shop.example");

        let mut empty = cart();
        empty.cart_items.clear();
        assert!(matches!(
            initiator.start(&empty).await,
            Err(PaymentError::InvalidCart(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_is_surfaced() {
        let provider = Arc::new(MockPaymentProvider::new());
        provider.set_failing(true);
        let initiator = CheckoutInitiator::new(provider, "https://shop.example")
            .with_retry(RetryPolicy::none());

        assert!(matches!(
            initiator.start(&cart()).await,
            Err(PaymentError::ProviderUnavailable(_))
        ));
    }
}
