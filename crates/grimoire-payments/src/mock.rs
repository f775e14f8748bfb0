//! Mock Payment Provider
//!
//! For testing and local development. Keeps checkout sessions in memory and
//! lets callers mark them paid.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::provider::{
    CURRENCY, CheckoutRedirect, CheckoutSessionRequest, PaymentProvider, PaymentStatus,
    PurchasedLineItem, SessionSummary,
};

#[derive(Clone, Debug)]
struct MockSession {
    summary: SessionSummary,
    line_items: Vec<PurchasedLineItem>,
}

/// In-memory payment provider
pub struct MockPaymentProvider {
    sessions: RwLock<HashMap<String, MockSession>>,
    failing: AtomicBool,
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every call fail with a transient provider error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Simulate the buyer completing payment
    pub async fn mark_paid(&self, session_id: &str, email: &str, name: Option<&str>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Self::missing(session_id))?;

        session.summary.payment_status = PaymentStatus::Paid;
        session.summary.customer_email = Some(email.to_string());
        if let Some(name) = name {
            session.summary.customer_name = Some(name.to_string());
        }
        session.summary.payment_intent = Some(format!("pi_{}", session_id.trim_start_matches("cs_")));
        Ok(())
    }

    /// Append a raw line item (e.g. one whose product carries no metadata)
    pub async fn push_line_item(&self, session_id: &str, item: PurchasedLineItem) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Self::missing(session_id))?;

        let total = session.summary.amount_total.unwrap_or(0) + item.amount_total;
        session.summary.amount_total = Some(total);
        session.line_items.push(item);
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::ProviderUnavailable("mock provider offline".into()));
        }
        Ok(())
    }

    fn missing(session_id: &str) -> PaymentError {
        PaymentError::Provider(format!("No such checkout session: {session_id}"))
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutRedirect> {
        self.check()?;

        let id = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
        let line_items: Vec<PurchasedLineItem> = request
            .line_items
            .iter()
            .enumerate()
            .map(|(n, item)| PurchasedLineItem {
                id: format!("li_{n}"),
                description: Some(item.name.clone()),
                quantity: 1,
                amount_total: item.unit_amount_cents,
                currency: CURRENCY.into(),
                product_id: Some(format!("prod_{n}")),
                product_metadata: item.metadata.clone(),
            })
            .collect();

        let summary = SessionSummary {
            id: id.clone(),
            payment_status: PaymentStatus::Unpaid,
            amount_total: Some(line_items.iter().map(|i| i.amount_total).sum()),
            currency: Some(CURRENCY.into()),
            customer_email: request.customer_email.clone(),
            customer_name: request.customer_name.clone(),
            payment_intent: None,
        };

        self.sessions
            .write()
            .await
            .insert(id.clone(), MockSession { summary, line_items });

        Ok(CheckoutRedirect {
            url: format!("https://checkout.invalid/pay/{id}"),
            session_id: id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSummary> {
        self.check()?;
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|s| s.summary.clone())
            .ok_or_else(|| Self::missing(session_id))
    }

    async fn list_line_items(&self, session_id: &str) -> Result<Vec<PurchasedLineItem>> {
        self.check()?;
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|s| s.line_items.clone())
            .ok_or_else(|| Self::missing(session_id))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
