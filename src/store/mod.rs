//! Entity store module
//!
//! The `EntityStore` trait is the only way proxies talk to the backend.
//! Two implementations are provided:
//!
//! - [`HttpEntityStore`]: the catalog REST API over the retrying HTTP client
//! - [`MemoryEntityStore`]: an in-process store with call counters and
//!   failure injection, for tests and offline use

mod http;
mod memory;

pub use http::HttpEntityStore;
pub use memory::{CallCounts, MemoryEntityStore, StoreOp};

use crate::error::Result;
use crate::types::{Entity, EntityId, EntityKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Search
// ============================================================================

/// A search over one entity collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Conjunction of `<field>:<text>` terms
    #[serde(default)]
    pub query: Vec<String>,

    /// Backend-specific filter expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<serde_json::Value>,

    /// Field to sort by (ascending)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,

    /// Maximum number of results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Number of results to skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl SearchQuery {
    /// Create an empty query (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `<field>:<text>` term
    #[must_use]
    pub fn term(mut self, field: &str, text: &str) -> Self {
        self.query.push(format!("{field}:{text}"));
        self
    }

    /// Set the backend filter expression
    #[must_use]
    pub fn filters(mut self, filters: serde_json::Value) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Set the sort field
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Set the page window
    #[must_use]
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Total number of matches, not the number returned
    pub count: usize,
    /// The returned entities
    #[serde(default)]
    pub results: Vec<Entity>,
}

// ============================================================================
// Store Trait
// ============================================================================

/// Backend operations needed by the proxy layer.
///
/// Implementations report a missing entity as [`Error::NotFound`] and a
/// rejected value as [`Error::Validation`].
///
/// [`Error::NotFound`]: crate::error::Error::NotFound
/// [`Error::Validation`]: crate::error::Error::Validation
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch the full representation of an entity
    async fn fetch(&self, kind: EntityKind, id: EntityId) -> Result<Entity>;

    /// Create an entity, returning the stored representation
    async fn create(&self, kind: EntityKind, entity: Entity) -> Result<Entity>;

    /// Apply a partial update, returning the stored representation
    async fn update(&self, kind: EntityKind, id: EntityId, changes: Entity) -> Result<Entity>;

    /// Delete an entity; `purge` removes it irreversibly
    async fn delete(&self, kind: EntityKind, id: EntityId, purge: bool) -> Result<()>;

    /// Resolve a unique name to an id
    async fn resolve_name(&self, kind: EntityKind, name: &str) -> Result<EntityId>;

    /// Run a search
    async fn search(&self, kind: EntityKind, query: &SearchQuery) -> Result<SearchPage>;

    /// List ids (or names) of a collection
    async fn list(&self, kind: EntityKind, limit: usize, offset: usize) -> Result<Vec<String>>;
}
