//! # grimoire-supabase
//!
//! Supabase implementations of the storefront's storage capabilities.
//!
//! - [`SupabaseStore`]: purchase records and the scenario/saga catalog via
//!   PostgREST
//! - [`SupabaseFileStore`]: signed download URLs via Supabase Storage
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grimoire_supabase::{SupabaseClient, SupabaseConfig, SupabaseFileStore, SupabaseStore};
//!
//! let client = SupabaseClient::new(SupabaseConfig::from_env()?)?;
//! let store = Arc::new(SupabaseStore::new(client.clone()));
//! let files = Arc::new(SupabaseFileStore::new(client));
//! ```
//!
//! The schema the store expects is in `migrations/`.

pub mod client;
pub mod config;
pub mod error;
pub mod rest;
pub mod storage;

pub use client::SupabaseClient;
pub use config::{DEFAULT_BUCKET, SupabaseConfig};
pub use error::{Result, SupabaseError};
pub use rest::{PurchaseRow, SupabaseStore};
pub use storage::SupabaseFileStore;
