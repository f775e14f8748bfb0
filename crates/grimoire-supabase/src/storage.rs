//! Supabase Storage Signing
//!
//! Files sit in a private bucket; buyers only ever see short-lived signed
//! URLs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use grimoire_core::{CoreError, FileStore, Result};

use crate::client::SupabaseClient;
use crate::error::SupabaseError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Signed-URL issuer for a Supabase Storage bucket
#[derive(Clone)]
pub struct SupabaseFileStore {
    client: SupabaseClient,
}

impl SupabaseFileStore {
    pub const fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Signed path returned by Storage is relative to `/storage/v1`
    fn absolute(&self, signed_path: &str) -> String {
        if signed_path.starts_with("http://") || signed_path.starts_with("https://") {
            return signed_path.to_string();
        }
        format!(
            "{}/{}",
            self.client.storage_root(),
            signed_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl FileStore for SupabaseFileStore {
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        let path = path.trim().trim_start_matches('/');
        if path.is_empty() {
            return Err(CoreError::FileStorage("empty file path".into()));
        }

        let bucket = self.client.config().storage_bucket.as_str();
        let url = self
            .client
            .storage_url(["object", "sign", bucket].into_iter().chain(path.split('/')))
            .map_err(SupabaseError::into_file_storage)?;

        let response = self
            .client
            .http()
            .post(url)
            .json(&SignRequest {
                expires_in: ttl.as_secs().max(1),
            })
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_file_storage())?;

        let signed: SignResponse = SupabaseClient::json(response)
            .await
            .map_err(SupabaseError::into_file_storage)?;

        tracing::debug!(bucket, path, ttl_secs = ttl.as_secs(), "Signed storage URL");
        Ok(self.absolute(&signed.signed_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;

    fn store() -> SupabaseFileStore {
        let client =
            SupabaseClient::new(SupabaseConfig::new("https://xyz.supabase.co", "service-key"))
                .unwrap();
        SupabaseFileStore::new(client)
    }

    #[test]
    fn test_signed_path_joined_to_storage_root() {
        assert_eq!(
            store().absolute("/object/sign/scenarios/s1.pdf?token=abc"),
            "https://xyz.supabase.co/storage/v1/object/sign/scenarios/s1.pdf?token=abc"
        );
    }

    #[test]
    fn test_absolute_urls_pass_through() {
        let url = "https://cdn.example/object/sign/s1.pdf?token=abc";
        assert_eq!(store().absolute(url), url);
    }

    #[test]
    fn test_sign_request_shape() {
        let json = serde_json::to_value(SignRequest { expires_in: 300 }).unwrap();
        assert_eq!(json, serde_json::json!({"expiresIn": 300}));
    }

    #[tokio::test]
    async fn test_empty_path_rejected_before_request() {
        let result = store().signed_url("  ", Duration::from_secs(300)).await;
        assert!(matches!(result, Err(CoreError::FileStorage(_))));
    }
}
