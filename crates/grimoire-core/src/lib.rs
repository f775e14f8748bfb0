//! # grimoire-core
//!
//! Purchase records, download tokens and the capabilities the storefront
//! delegates to hosted platforms.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     DownloadRedeemer                          │
//! │  ┌───────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │ PurchaseStore │  │ CatalogStore  │  │    FileStore     │  │
//! │  │  (records)    │──│  (products)   │──│  (signed URLs)   │  │
//! │  └───────────────┘  └───────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every capability is a trait so handlers receive explicit clients built
//! once at startup. `MemoryStore` and `MockFileStore` back development and
//! tests; `grimoire-supabase` provides the hosted implementations.

pub mod downloads;
pub mod error;
pub mod files;
pub mod notify;
pub mod purchase;
pub mod retry;
pub mod store;

pub use downloads::{DownloadGrant, DownloadRedeemer};
pub use error::{CoreError, Result};
pub use files::{FileStore, MockFileStore, SIGNED_URL_TTL};
pub use notify::{LogDispatcher, Notification, NotificationDispatcher, RetryingDispatcher};
pub use purchase::{
    DOWNLOAD_WINDOW_HOURS, DownloadToken, MAX_DOWNLOADS, NewPurchase, ProductKind, PurchaseRecord,
};
pub use retry::{RetryPolicy, Retryable};
pub use store::{CatalogProduct, CatalogStore, MemoryStore, PurchaseStore};
