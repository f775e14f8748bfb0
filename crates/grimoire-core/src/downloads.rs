//! Download Token Redemption
//!
//! Turns a download token into a short-lived signed file URL, enforcing the
//! expiry window and the download quota.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::files::{FileStore, SIGNED_URL_TTL};
use crate::purchase::{DownloadToken, PurchaseRecord};
use crate::retry::RetryPolicy;
use crate::store::{CatalogStore, PurchaseStore};

/// A successful redemption
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadGrant {
    /// Signed URL, valid for [`SIGNED_URL_TTL`]
    pub download_url: String,
    pub file_name: String,
    pub remaining_downloads: u32,
    pub expires_at: DateTime<Utc>,
}

/// Download token redeemer
pub struct DownloadRedeemer {
    store: Arc<dyn PurchaseStore>,
    catalog: Arc<dyn CatalogStore>,
    files: Arc<dyn FileStore>,
    retry: RetryPolicy,
}

impl DownloadRedeemer {
    pub fn new(
        store: Arc<dyn PurchaseStore>,
        catalog: Arc<dyn CatalogStore>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            store,
            catalog,
            files,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Redeem a token now
    pub async fn redeem(&self, raw_token: &str) -> Result<DownloadGrant> {
        self.redeem_at(raw_token, Utc::now()).await
    }

    /// Redeem a token as of `now`.
    ///
    /// Gates run in order: lookup, expiry, quota. Nothing is mutated unless a
    /// signed URL was issued.
    pub async fn redeem_at(&self, raw_token: &str, now: DateTime<Utc>) -> Result<DownloadGrant> {
        let token = DownloadToken::parse(raw_token)?;

        let record = self
            .retry
            .run("find_by_token", || self.store.find_by_token(&token))
            .await?
            .ok_or(CoreError::TokenNotFound)?;

        if record.is_expired(now) {
            return Err(CoreError::TokenExpired {
                expires_at: record.expires_at,
            });
        }
        if record.is_exhausted() {
            return Err(CoreError::QuotaExceeded {
                max_downloads: record.max_downloads,
            });
        }

        let product = self
            .retry
            .run("catalog_product", || {
                self.catalog.product(record.product_kind, &record.product_id)
            })
            .await?
            .ok_or_else(|| {
                CoreError::FileStorage(format!(
                    "no file registered for {} {}",
                    record.product_kind, record.product_id
                ))
            })?;

        let download_url = self
            .retry
            .run("sign_url", || {
                self.files.signed_url(&product.file_path, SIGNED_URL_TTL)
            })
            .await?;

        let expires_at = record.expires_at;
        let purchase_id = record.id;
        let remaining_downloads = self.consume(record, now).await?;

        tracing::info!(
            purchase_id = %purchase_id,
            product_id = %product.id,
            remaining = remaining_downloads,
            "Download link issued"
        );

        Ok(DownloadGrant {
            download_url,
            file_name: product.file_name,
            remaining_downloads,
            expires_at,
        })
    }

    /// Count one download against the quota.
    ///
    /// A lost compare-and-set re-reads the record; every lost round means
    /// another redemption succeeded, so the loop ends within `max_downloads`
    /// rounds. Store failures do not block delivery.
    async fn consume(&self, mut record: PurchaseRecord, now: DateTime<Utc>) -> Result<u32> {
        for _ in 0..=record.max_downloads {
            match self
                .store
                .record_download(&record.download_token, record.download_count, now)
                .await
            {
                Ok(Some(updated)) => return Ok(updated.remaining_downloads()),
                Ok(None) => match self.store.find_by_token(&record.download_token).await {
                    Ok(Some(fresh)) if fresh.is_exhausted() => {
                        return Err(CoreError::QuotaExceeded {
                            max_downloads: fresh.max_downloads,
                        });
                    }
                    Ok(Some(fresh)) => record = fresh,
                    Ok(None) => return Err(CoreError::TokenNotFound),
                    Err(e) => return Ok(Self::uncounted(&record, &e)),
                },
                Err(e) => return Ok(Self::uncounted(&record, &e)),
            }
        }

        Err(CoreError::QuotaExceeded {
            max_downloads: record.max_downloads,
        })
    }

    fn uncounted(record: &PurchaseRecord, error: &CoreError) -> u32 {
        tracing::warn!(
            purchase_id = %record.id,
            error = %error,
            "Download counter update failed; delivering without counting"
        );
        record.remaining_downloads().saturating_sub(1)
    }
}
