//! Application State

use std::sync::Arc;

use grimoire_core::{
    CatalogStore, DownloadRedeemer, FileStore, NotificationDispatcher, PurchaseStore,
};
use grimoire_payments::{
    CheckoutInitiator, PaymentProvider, PaymentVerifier, WebhookHandler, WebhookVerifier,
};

/// Storage and delivery capabilities, built once at startup
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn PurchaseStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub files: Arc<dyn FileStore>,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

/// Payment provider plus the secret its webhooks are signed with
pub struct PaymentGateway {
    pub provider: Arc<dyn PaymentProvider>,
    pub verifier: WebhookVerifier,
}

/// Services that need a configured payment provider
pub struct Payments {
    pub checkout: CheckoutInitiator,
    pub verifier: PaymentVerifier,
    pub webhooks: WebhookHandler,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Purchase record store
    pub store: Arc<dyn PurchaseStore>,

    /// Download token redeemer
    pub redeemer: Arc<DownloadRedeemer>,

    /// Checkout, verification and webhooks (None if Stripe is not configured)
    pub payments: Option<Arc<Payments>>,
}

impl AppState {
    pub fn new(
        backends: Backends,
        gateway: Option<PaymentGateway>,
        public_base_url: &str,
    ) -> Self {
        let redeemer = DownloadRedeemer::new(
            backends.store.clone(),
            backends.catalog.clone(),
            backends.files.clone(),
        );

        let payments = gateway.map(|gateway| {
            Arc::new(Payments {
                checkout: CheckoutInitiator::new(gateway.provider.clone(), public_base_url),
                verifier: PaymentVerifier::new(gateway.provider.clone(), backends.store.clone()),
                webhooks: WebhookHandler::new(
                    gateway.verifier,
                    gateway.provider,
                    backends.store.clone(),
                    backends.catalog.clone(),
                    backends.notifier.clone(),
                    public_base_url,
                ),
            })
        });

        Self {
            store: backends.store,
            redeemer: Arc::new(redeemer),
            payments,
        }
    }
}
