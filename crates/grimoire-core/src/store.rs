//! Purchase Record Store
//!
//! Durable records live in a hosted database; these traits are the seam.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{CoreError, Result};
use crate::purchase::{DownloadToken, ProductKind, PurchaseRecord};

/// Purchase record storage
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Insert a new record.
    ///
    /// Fails with [`CoreError::Duplicate`] when a record already exists for the
    /// same `(external_payment_ref, product_kind, product_id)` or download token.
    async fn insert(&self, record: &PurchaseRecord) -> Result<()>;

    /// Exact-match lookup by download token
    async fn find_by_token(&self, token: &DownloadToken) -> Result<Option<PurchaseRecord>>;

    /// All records minted for one payment session
    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Vec<PurchaseRecord>>;

    /// Compare-and-set download increment.
    ///
    /// Bumps `download_count` and sets `last_download_at` only if the stored
    /// count still equals `observed_count` and is below `max_downloads`.
    /// Returns the updated record, or `None` if the condition did not hold.
    async fn record_download(
        &self,
        token: &DownloadToken,
        observed_count: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<PurchaseRecord>>;

    /// Backend name for health reporting
    fn name(&self) -> &str;
}

/// A downloadable catalog product
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub kind: ProductKind,
    pub title: String,
    /// Object path inside the file store
    pub file_path: String,
    /// File name shown to the buyer
    pub file_name: String,
}

/// Read access to the scenario/saga catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, kind: ProductKind, id: &str) -> Result<Option<CatalogProduct>>;
}

#[derive(Default)]
struct Records {
    by_token: HashMap<DownloadToken, PurchaseRecord>,
    by_purchase: HashMap<(String, ProductKind, String), DownloadToken>,
}

/// In-memory store (for development/testing)
pub struct MemoryStore {
    records: RwLock<Records>,
    catalog: RwLock<HashMap<(ProductKind, String), CatalogProduct>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Records::default()),
            catalog: RwLock::new(HashMap::new()),
        }
    }

    /// Register a catalog product
    pub async fn add_product(&self, product: CatalogProduct) {
        let mut catalog = self.catalog.write().await;
        catalog.insert((product.kind, product.id.clone()), product);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.by_token.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PurchaseStore for MemoryStore {
    async fn insert(&self, record: &PurchaseRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let key = (
            record.external_payment_ref.clone(),
            record.product_kind,
            record.product_id.clone(),
        );

        if records.by_purchase.contains_key(&key) {
            return Err(CoreError::Duplicate(format!(
                "purchase of {} {} in {}",
                record.product_kind, record.product_id, record.external_payment_ref
            )));
        }
        if records.by_token.contains_key(&record.download_token) {
            return Err(CoreError::Duplicate("download token".into()));
        }

        records
            .by_purchase
            .insert(key, record.download_token.clone());
        records
            .by_token
            .insert(record.download_token.clone(), record.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &DownloadToken) -> Result<Option<PurchaseRecord>> {
        let records = self.records.read().await;
        Ok(records.by_token.get(token).cloned())
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Vec<PurchaseRecord>> {
        let records = self.records.read().await;
        let mut found: Vec<_> = records
            .by_token
            .values()
            .filter(|r| r.external_payment_ref == payment_ref)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn record_download(
        &self,
        token: &DownloadToken,
        observed_count: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<PurchaseRecord>> {
        let mut records = self.records.write().await;

        let Some(record) = records.by_token.get_mut(token) else {
            return Ok(None);
        };
        if record.download_count != observed_count || record.is_exhausted() {
            return Ok(None);
        }

        record.download_count += 1;
        record.last_download_at = Some(at);
        Ok(Some(record.clone()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, kind: ProductKind, id: &str) -> Result<Option<CatalogProduct>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.get(&(kind, id.to_string())).cloned())
    }
}
