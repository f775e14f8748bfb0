//! Supabase HTTP Client
//!
//! Thin reqwest wrapper carrying the service-role credentials. PostgREST
//! lives under `/rest/v1`, Storage under `/storage/v1`.

use std::sync::Arc;

use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::config::SupabaseConfig;
use crate::error::{Result, SupabaseError};

/// Shared Supabase client
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.service_role_key)
            .map_err(|e| SupabaseError::Config(format!("Invalid service role key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.service_role_key))
            .map_err(|e| SupabaseError::Config(format!("Invalid service role key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner { http, config }),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.inner.config
    }

    /// PostgREST endpoint for a table
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.inner.config.url)
    }

    /// Storage API root
    pub fn storage_root(&self) -> String {
        format!("{}/storage/v1", self.inner.config.url)
    }

    /// Storage endpoint with every path segment percent-encoded
    pub fn storage_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = Url::parse(&self.storage_root())
            .map_err(|e| SupabaseError::Config(format!("Invalid SUPABASE_URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SupabaseError::Config("SUPABASE_URL cannot be a base".into()))?
            .extend(segments.into_iter().filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Decode a success body, or turn the response into an API error
    pub async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SupabaseError::Parse(format!("{e}: {body}")))
    }

    /// Pass success responses through, turn anything else into an API error
    pub async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        tracing::debug!(status = %status, body = %message, "Supabase request failed");
        Err(SupabaseError::Api { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::new(SupabaseConfig::new("https://xyz.supabase.co", "service-key")).unwrap()
    }

    #[test]
    fn test_rest_url() {
        assert_eq!(
            client().rest_url("purchases"),
            "https://xyz.supabase.co/rest/v1/purchases"
        );
    }

    #[test]
    fn test_storage_url_encodes_segments() {
        let url = client()
            .storage_url(["object", "sign", "scenarios", "sagas", "Ashes of the Vale.pdf"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://xyz.supabase.co/storage/v1/object/sign/scenarios/sagas/Ashes%20of%20the%20Vale.pdf"
        );
    }
}
