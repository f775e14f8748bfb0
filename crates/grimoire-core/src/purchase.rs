//! Purchase Records
//!
//! One record per purchased line item, carrying the download token and the
//! counters that gate redemption.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Downloads allowed per purchase
pub const MAX_DOWNLOADS: u32 = 3;

/// Hours a download token stays valid after the purchase is recorded
pub const DOWNLOAD_WINDOW_HOURS: i64 = 48;

/// Random bytes behind every token (256 bits)
const TOKEN_BYTES: usize = 32;

/// Opaque download token (64 lowercase hex characters)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadToken(String);

impl DownloadToken {
    /// Generate a fresh token from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parse a token received from a client.
    ///
    /// Only emptiness is rejected here; unknown tokens are the store's call.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidInput("download token is required".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DownloadToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of catalog product a purchase entitles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// A single scenario
    Scenario,
    /// A saga bundling several scenarios
    Saga,
}

impl ProductKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scenario => "scenario",
            Self::Saga => "saga",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "scenario" => Some(Self::Scenario),
            "saga" => Some(Self::Saga),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data known about a purchase before it is recorded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPurchase {
    pub external_payment_ref: String,
    pub product_kind: ProductKind,
    pub product_id: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

/// A persisted purchase record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: Uuid,

    pub customer_email: Option<String>,

    pub customer_name: Option<String>,

    pub product_kind: ProductKind,

    /// Catalog id of the scenario or saga
    pub product_id: String,

    /// Payment provider session this purchase came from
    pub external_payment_ref: String,

    pub download_token: DownloadToken,

    pub download_count: u32,

    pub max_downloads: u32,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    pub last_download_at: Option<DateTime<Utc>>,
}

impl PurchaseRecord {
    /// Mint a record with a fresh token and the standard download window
    pub fn mint(purchase: NewPurchase, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_email: purchase.customer_email,
            customer_name: purchase.customer_name,
            product_kind: purchase.product_kind,
            product_id: purchase.product_id,
            external_payment_ref: purchase.external_payment_ref,
            download_token: DownloadToken::generate(),
            download_count: 0,
            max_downloads: MAX_DOWNLOADS,
            created_at: now,
            expires_at: now + Duration::hours(DOWNLOAD_WINDOW_HOURS),
            last_download_at: None,
        }
    }

    /// The window closes at `expires_at` itself
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub const fn is_exhausted(&self) -> bool {
        self.download_count >= self.max_downloads
    }

    /// Redeemable iff `now < expires_at` and `download_count < max_downloads`
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.is_exhausted()
    }

    pub const fn remaining_downloads(&self) -> u32 {
        self.max_downloads.saturating_sub(self.download_count)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn sample_purchase(session: &str, product: &str) -> NewPurchase {
        NewPurchase {
            external_payment_ref: session.into(),
            product_kind: ProductKind::Scenario,
            product_id: product.into(),
            customer_email: Some("mj@example.com".into()),
            customer_name: Some("Game Master".into()),
        }
    }

    #[test]
    fn test_token_generation() {
        let token = DownloadToken::generate();
        assert_eq!(token.as_str().len(), TOKEN_BYTES * 2);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, DownloadToken::generate());
    }

    #[test]
    fn test_token_parse_rejects_blank() {
        assert!(DownloadToken::parse("   ").is_err());
        assert_eq!(DownloadToken::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_mint_sets_window_and_counters() {
        let now = Utc::now();
        let record = PurchaseRecord::mint(sample_purchase("cs_1", "s1"), now);

        assert_eq!(record.download_count, 0);
        assert_eq!(record.max_downloads, MAX_DOWNLOADS);
        assert_eq!(record.created_at, now);
        assert_eq!(record.expires_at, now + Duration::hours(48));
        assert!(record.last_download_at.is_none());
        assert!(record.is_redeemable(now));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let record = PurchaseRecord::mint(sample_purchase("cs_1", "s1"), now);

        assert!(!record.is_expired(record.expires_at - Duration::seconds(1)));
        assert!(record.is_expired(record.expires_at));
        assert!(!record.is_redeemable(record.expires_at + Duration::hours(1)));
    }

    #[test]
    fn test_exhaustion() {
        let now = Utc::now();
        let mut record = PurchaseRecord::mint(sample_purchase("cs_1", "s1"), now);
        record.download_count = MAX_DOWNLOADS;

        assert!(record.is_exhausted());
        assert_eq!(record.remaining_downloads(), 0);
        assert!(!record.is_redeemable(now));
    }

    #[test]
    fn test_product_kind_parse() {
        assert_eq!(ProductKind::parse("Saga"), Some(ProductKind::Saga));
        assert_eq!(ProductKind::parse("scenario"), Some(ProductKind::Scenario));
        assert_eq!(ProductKind::parse("bundle"), None);
    }
}
