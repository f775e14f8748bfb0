//! Server Configuration

use grimoire_core::{CoreError, Result};

/// Where purchase records and files live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store with mock file signing (development)
    Memory,
    /// Supabase PostgREST + Storage
    Supabase,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "memory" => Ok(Self::Memory),
            "supabase" => Ok(Self::Supabase),
            other => Err(CoreError::Config(format!(
                "GRIMOIRE_STORE must be `memory` or `supabase`, got `{other}`"
            ))),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Socket address to listen on
    pub bind_addr: String,

    /// Public origin used for redirect and redemption links
    pub public_base_url: String,

    pub store: StoreBackend,
}

impl AppConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:3000";
    pub const DEFAULT_PUBLIC_BASE_URL: &'static str = "http://localhost:3000";

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| Self::DEFAULT_BIND_ADDR.into());
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| Self::DEFAULT_PUBLIC_BASE_URL.into())
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !(public_base_url.starts_with("http://") || public_base_url.starts_with("https://")) {
            return Err(CoreError::Config(format!(
                "PUBLIC_BASE_URL must be an http(s) URL, got `{public_base_url}`"
            )));
        }
        let store = StoreBackend::parse(&lookup("GRIMOIRE_STORE").unwrap_or_default())?;

        Ok(Self {
            bind_addr,
            public_base_url,
            store,
        })
    }
}
