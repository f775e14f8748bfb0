//! Buyer Notifications
//!
//! Delivers the redemption link after a purchase. There is no e-mail
//! transport yet; `LogDispatcher` records what would have been sent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retry::RetryPolicy;

/// Redemption instructions for one purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub customer_name: Option<String>,
    pub product_name: String,
    pub redemption_link: String,
    pub expires_at: DateTime<Utc>,
}

/// Notification transport
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Logs notifications instead of sending them
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            product = %notification.product_name,
            link = %notification.redemption_link,
            expires_at = %notification.expires_at,
            "Download link ready (no mail transport configured)"
        );
        Ok(())
    }
}

/// Retries a dispatcher's transient failures
pub struct RetryingDispatcher<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D: NotificationDispatcher> RetryingDispatcher<D> {
    pub const fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<D: NotificationDispatcher> NotificationDispatcher for RetryingDispatcher<D> {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.policy
            .run("notify", || self.inner.send(notification))
            .await
    }
}
