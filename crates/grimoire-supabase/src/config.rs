//! Supabase Configuration

use crate::error::{Result, SupabaseError};

/// Default storage bucket holding scenario files
pub const DEFAULT_BUCKET: &str = "scenarios";

/// Supabase project settings
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Service-role key (bypasses row-level security; server side only)
    pub service_role_key: String,

    /// Storage bucket holding downloadable files
    pub storage_bucket: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_role_key", &"[REDACTED]")
            .field("storage_bucket", &self.storage_bucket)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
            storage_bucket: DEFAULT_BUCKET.into(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| SupabaseError::Config("SUPABASE_URL not set".into()))?;
        let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| SupabaseError::Config("SUPABASE_SERVICE_ROLE_KEY not set".into()))?;

        let mut config = Self::new(url, key);
        if let Ok(bucket) = std::env::var("SUPABASE_STORAGE_BUCKET") {
            if !bucket.trim().is_empty() {
                config.storage_bucket = bucket.trim().to_string();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject obviously broken settings before the first request
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(SupabaseError::Config(format!(
                "SUPABASE_URL must be an http(s) URL, got {}",
                self.url
            )));
        }
        if self.service_role_key.trim().is_empty() {
            return Err(SupabaseError::Config("SUPABASE_SERVICE_ROLE_KEY is empty".into()));
        }
        Ok(())
    }
}
