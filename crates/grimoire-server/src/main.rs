//! grimoire HTTP Server
//!
//! Storefront backend for tabletop scenario downloads.

use std::sync::Arc;

use grimoire_core::{
    LogDispatcher, MemoryStore, MockFileStore, RetryPolicy, RetryingDispatcher,
};
use grimoire_payments::{StripeClient, WebhookVerifier};
use grimoire_server::{AppConfig, AppState, Backends, PaymentGateway, StoreBackend, router};
use grimoire_supabase::{SupabaseClient, SupabaseConfig, SupabaseFileStore, SupabaseStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn backends(config: &AppConfig) -> anyhow::Result<Backends> {
    let notifier = Arc::new(RetryingDispatcher::new(LogDispatcher, RetryPolicy::default()));

    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("⚠ Using in-memory store - purchases are lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok(Backends {
                store: store.clone(),
                catalog: store,
                files: Arc::new(MockFileStore::new()),
                notifier,
            })
        }
        StoreBackend::Supabase => {
            let supabase = SupabaseConfig::from_env()?;
            tracing::info!(
                url = %supabase.url,
                bucket = %supabase.storage_bucket,
                "✓ Supabase configured"
            );
            let client = SupabaseClient::new(supabase)?;
            let store = Arc::new(SupabaseStore::new(client.clone()));
            Ok(Backends {
                store: store.clone(),
                catalog: store,
                files: Arc::new(SupabaseFileStore::new(client)),
                notifier,
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let backends = backends(&config)?;

    // Initialize payments
    let gateway = match StripeClient::from_env() {
        Ok(stripe) => {
            tracing::info!("✓ Stripe configured");
            Some(PaymentGateway {
                verifier: WebhookVerifier::new(stripe.webhook_secret()),
                provider: Arc::new(stripe),
            })
        }
        Err(e) => {
            tracing::warn!("⚠ Stripe not configured - payments disabled ({e})");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    let state = AppState::new(backends, gateway, &config.public_base_url);
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 grimoire server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Public URL: {}", config.public_base_url);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health               - Health check");
    tracing::info!("  POST /api/checkout         - Create Stripe checkout");
    tracing::info!("  POST /api/checkout/verify  - Verify checkout payment");
    tracing::info!("  POST /webhook/stripe       - Stripe webhook");
    tracing::info!("  GET  /download/{{token}}     - Redeem download link");

    axum::serve(listener, app).await?;

    Ok(())
}
