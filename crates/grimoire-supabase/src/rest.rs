//! PostgREST-backed Purchase Store
//!
//! `purchases` holds one row per paid line item; `scenarios` and `sagas`
//! describe the downloadable files. Uniqueness and the download counter are
//! enforced by the database (see `migrations/`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use grimoire_core::{
    CatalogProduct, CatalogStore, CoreError, DownloadToken, ProductKind, PurchaseRecord, PurchaseStore,
    Result,
};

use crate::client::SupabaseClient;
use crate::error::SupabaseError;

const PURCHASES: &str = "purchases";

/// Return the affected rows instead of an empty body
const RETURN_REPRESENTATION: &str = "return=representation";

/// `purchases` row as PostgREST returns it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseRow {
    pub id: Uuid,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub product_type: ProductKind,
    pub product_id: String,
    pub stripe_session_id: String,
    pub download_token: DownloadToken,
    pub download_count: i32,
    pub max_downloads: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_download_at: Option<DateTime<Utc>>,
}

impl PurchaseRow {
    fn count(value: u32, column: &str) -> std::result::Result<i32, SupabaseError> {
        i32::try_from(value).map_err(|_| SupabaseError::Parse(format!("{column} out of range")))
    }

    fn from_record(record: &PurchaseRecord) -> std::result::Result<Self, SupabaseError> {
        Ok(Self {
            id: record.id,
            customer_email: record.customer_email.clone(),
            customer_name: record.customer_name.clone(),
            product_type: record.product_kind,
            product_id: record.product_id.clone(),
            stripe_session_id: record.external_payment_ref.clone(),
            download_token: record.download_token.clone(),
            download_count: Self::count(record.download_count, "download_count")?,
            max_downloads: Self::count(record.max_downloads, "max_downloads")?,
            created_at: record.created_at,
            expires_at: record.expires_at,
            last_download_at: record.last_download_at,
        })
    }

    fn into_record(self) -> std::result::Result<PurchaseRecord, SupabaseError> {
        let unsigned = |value: i32, column: &str| {
            u32::try_from(value).map_err(|_| SupabaseError::Parse(format!("negative {column}")))
        };

        Ok(PurchaseRecord {
            id: self.id,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            product_kind: self.product_type,
            product_id: self.product_id,
            external_payment_ref: self.stripe_session_id,
            download_token: self.download_token,
            download_count: unsigned(self.download_count, "download_count")?,
            max_downloads: unsigned(self.max_downloads, "max_downloads")?,
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_download_at: self.last_download_at,
        })
    }
}

/// `scenarios` / `sagas` row
#[derive(Clone, Debug, Deserialize)]
struct ProductRow {
    id: String,
    title: String,
    file_path: String,
    file_name: Option<String>,
}

/// Catalog table for a product kind
const fn catalog_table(kind: ProductKind) -> &'static str {
    match kind {
        ProductKind::Scenario => "scenarios",
        ProductKind::Saga => "sagas",
    }
}

/// PostgREST equality filter value
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Purchase and catalog store on Supabase PostgREST
#[derive(Clone)]
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub const fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn select_purchases(
        &self,
        query: &[(&str, String)],
    ) -> std::result::Result<Vec<PurchaseRecord>, SupabaseError> {
        let response = self
            .client
            .http()
            .get(self.client.rest_url(PURCHASES))
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await?;

        let rows: Vec<PurchaseRow> = SupabaseClient::json(response).await?;
        rows.into_iter().map(PurchaseRow::into_record).collect()
    }
}

#[async_trait]
impl PurchaseStore for SupabaseStore {
    async fn insert(&self, record: &PurchaseRecord) -> Result<()> {
        let row = PurchaseRow::from_record(record).map_err(SupabaseError::into_persistence)?;

        let response = self
            .client
            .http()
            .post(self.client.rest_url(PURCHASES))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_persistence())?;

        SupabaseClient::check(response)
            .await
            .map_err(SupabaseError::into_persistence)?;

        tracing::debug!(purchase_id = %record.id, "Inserted purchase row");
        Ok(())
    }

    async fn find_by_token(&self, token: &DownloadToken) -> Result<Option<PurchaseRecord>> {
        let mut found = self
            .select_purchases(&[
                ("download_token", eq(token)),
                ("limit", "1".to_string()),
            ])
            .await
            .map_err(SupabaseError::into_persistence)?;
        Ok(found.pop())
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Vec<PurchaseRecord>> {
        self.select_purchases(&[
            ("stripe_session_id", eq(payment_ref)),
            ("order", "created_at.asc".to_string()),
        ])
        .await
        .map_err(SupabaseError::into_persistence)
    }

    async fn record_download(
        &self,
        token: &DownloadToken,
        observed_count: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<PurchaseRecord>> {
        let next = observed_count
            .checked_add(1)
            .ok_or_else(|| CoreError::InvalidInput("download count overflow".into()))?;

        // Matches only if nobody else counted since we read, and quota remains
        let response = self
            .client
            .http()
            .patch(self.client.rest_url(PURCHASES))
            .query(&[
                ("download_token", eq(token)),
                ("download_count", eq(observed_count)),
                ("max_downloads", format!("gt.{observed_count}")),
            ])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&serde_json::json!({
                "download_count": next,
                "last_download_at": at,
            }))
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_persistence())?;

        let mut rows: Vec<PurchaseRow> = SupabaseClient::json(response)
            .await
            .map_err(SupabaseError::into_persistence)?;

        rows.pop()
            .map(PurchaseRow::into_record)
            .transpose()
            .map_err(SupabaseError::into_persistence)
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

#[async_trait]
impl CatalogStore for SupabaseStore {
    async fn product(&self, kind: ProductKind, id: &str) -> Result<Option<CatalogProduct>> {
        let response = self
            .client
            .http()
            .get(self.client.rest_url(catalog_table(kind)))
            .query(&[
                ("select", "id,title,file_path,file_name".to_string()),
                ("id", eq(id)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_persistence())?;

        let mut rows: Vec<ProductRow> = SupabaseClient::json(response)
            .await
            .map_err(SupabaseError::into_persistence)?;

        Ok(rows.pop().map(|row| CatalogProduct {
            file_name: row
                .file_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| file_name_from_path(&row.file_path)),
            id: row.id,
            kind,
            title: row.title,
            file_path: row.file_path,
        }))
    }
}

/// Last path segment, used when a catalog row has no display file name
fn file_name_from_path(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_core::NewPurchase;

    fn record() -> PurchaseRecord {
        PurchaseRecord::mint(
            NewPurchase {
                external_payment_ref: "cs_test_1".into(),
                product_kind: ProductKind::Saga,
                product_id: "g1".into(),
                customer_email: Some("buyer@example.com".into()),
                customer_name: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_row_uses_column_names() {
        let row = PurchaseRow::from_record(&record()).unwrap();
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["product_type"], "saga");
        assert_eq!(json["stripe_session_id"], "cs_test_1");
        assert_eq!(json["download_count"], 0);
        assert_eq!(json["max_downloads"], 3);
        assert!(json["last_download_at"].is_null());
    }

    #[test]
    fn test_row_round_trips_through_postgrest_json() {
        let original = record();
        let json = serde_json::to_string(&PurchaseRow::from_record(&original).unwrap()).unwrap();
        let row: PurchaseRow = serde_json::from_str(&json).unwrap();

        assert_eq!(row.into_record().unwrap(), original);
    }

    #[test]
    fn test_negative_counter_rejected() {
        let mut row = PurchaseRow::from_record(&record()).unwrap();
        row.download_count = -1;
        assert!(row.into_record().is_err());
    }

    #[test]
    fn test_schema_keys_purchases_by_kind() {
        let schema = include_str!("../migrations/0001_purchases.sql");
        assert!(schema.contains("unique (stripe_session_id, product_type, product_id)"));
    }

    #[test]
    fn test_catalog_tables_and_filters() {
        assert_eq!(catalog_table(ProductKind::Scenario), "scenarios");
        assert_eq!(catalog_table(ProductKind::Saga), "sagas");
        assert_eq!(eq("abc"), "eq.abc");
        assert_eq!(file_name_from_path("sagas/ashes.pdf"), "ashes.pdf");
        assert_eq!(file_name_from_path("solo.pdf"), "solo.pdf");
    }
}
