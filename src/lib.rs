// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Catalog Proxy
//!
//! A proxy-based client for a REST metadata catalog. Every remote entity
//! (dataset, resource, organization, process, ...) is represented locally by
//! a shared proxy record that loads lazily, buffers writes, and syncs them
//! back on demand or in deferred batches.
//!
//! ## Features
//!
//! - **Identity Map**: one live record per (kind, id) per registry
//! - **Lazy Loading**: entities are fetched on first read, exactly once
//! - **Write Buffering**: local edits are tracked and sent as partial updates
//! - **Deferred Sync**: scoped batches with client-local rollback
//! - **Arrow Output**: proxy lists convert to Arrow `RecordBatch`es
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use catalog_proxy::{Client, ClientConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder("https://catalog.example.org")
//!         .token("secret")
//!         .build()?;
//!     let client = Client::new(config)?;
//!
//!     let dataset = client.datasets().get_by_name("rivers").await?;
//!     dataset.set("title", "Rivers of Europe").await?;
//!     dataset.sync().await?;
//!
//!     let scope = client.deferred_sync();
//!     for proxy in client.datasets().list(Some(10), 0).await?.iter() {
//!         proxy.set("private", false).await?;
//!     }
//!     scope.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Client / Cursor                         │
//! │   get()  get_by_name()  list()  search()  fetch_all()  create() │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Registry  ──►  Proxy records                 │
//! │    EMPTY ─► CLEAN ◄─► DIRTY        ERROR        DeferredSync    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────────────┴───┬───────────────┬─────────────┐
//! │  Schema  │      EntityStore      │     HTTP      │   Output    │
//! ├──────────┼───────────────────────┼───────────────┼─────────────┤
//! │ Fields   │ HttpEntityStore       │ Retry         │ Arrow       │
//! │ Access   │ MemoryEntityStore     │ Rate Limit    │             │
//! │ Validate │                       │ Envelope      │             │
//! └──────────┴───────────────────────┴───────────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the client
pub mod error;

/// Common types and type aliases
pub mod types;

/// Client configuration
pub mod config;

/// HTTP client with retry and rate limiting
pub mod http;

/// Per-kind field schemas and value validation
pub mod schema;

/// Backend entity stores
pub mod store;

/// Offset pagination
pub mod pagination;

/// Proxy records, registry and deferred sync
pub mod proxy;

/// Per-kind entry points
pub mod cursor;

/// Client facade
pub mod client;

/// Arrow output
pub mod output;

/// Tag specifications
pub mod tags;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use client::Client;
pub use config::ClientConfig;
pub use cursor::{Cursor, SearchResult};
pub use proxy::{DeferredSync, Proxy, ProxyList, ProxyState, Registry};
pub use store::{EntityStore, HttpEntityStore, MemoryEntityStore, SearchQuery};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
