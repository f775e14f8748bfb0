//! File Storage
//!
//! Scenario files sit in a hosted bucket; buyers only ever receive
//! short-lived signed URLs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CoreError, Result};

/// Lifetime of every signed download URL
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(5 * 60);

/// File store trait (Strategy pattern)
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Issue a signed URL for `path`, valid for `ttl`
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String>;
}

/// Mock file store
///
/// Produces deterministic URLs; can be switched into a failing mode.
pub struct MockFileStore {
    base_url: String,
    failing: AtomicBool,
    issued: AtomicUsize,
}

impl Default for MockFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileStore {
    pub fn new() -> Self {
        Self::with_base_url("https://files.invalid")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            failing: AtomicBool::new(false),
            issued: AtomicUsize::new(0),
        }
    }

    /// Make subsequent signing calls fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of URLs issued so far
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::FileStorage(format!("cannot sign {path}")));
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "{}/{}?expires_in={}&sig={n}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            ttl.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signs_with_ttl() {
        let files = MockFileStore::with_base_url("https://cdn.example/");
        let url = files.signed_url("/scenarios/s1.pdf", SIGNED_URL_TTL).await.unwrap();

        assert!(url.starts_with("https://cdn.example/scenarios/s1.pdf?"));
        assert!(url.contains("expires_in=300"));
        assert_eq!(files.issued(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_mode() {
        let files = MockFileStore::new();
        files.set_failing(true);

        let result = files.signed_url("s1.pdf", SIGNED_URL_TTL).await;
        assert!(matches!(result, Err(CoreError::FileStorage(_))));
        assert_eq!(files.issued(), 0);
    }
}
