//! Lazily materialized lists of proxies

use super::handle::Proxy;
use super::registry::Registry;
use crate::error::{Error, Result};
use crate::output::records_to_batch;
use crate::schema::schema_for;
use crate::types::{EntityId, EntityKind};
use arrow::record_batch::RecordBatch;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

/// Ordered ids of one kind; proxies are looked up on access
#[derive(Clone)]
pub struct ProxyList {
    registry: Arc<Registry>,
    kind: EntityKind,
    ids: Vec<EntityId>,
}

impl ProxyList {
    pub fn new(registry: Arc<Registry>, kind: EntityKind, ids: Vec<EntityId>) -> Self {
        Self { registry, kind, ids }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The proxy at `index`, without any I/O
    pub fn get(&self, index: usize) -> Option<Proxy> {
        let id = *self.ids.get(index)?;
        Some(self.registry.lookup(self.kind, id))
    }

    /// The proxy at `index`, loaded
    pub async fn fetch(&self, index: usize) -> Result<Proxy> {
        let proxy = self.get(index).ok_or_else(|| {
            Error::validation(
                "index",
                format!("{index} is out of range for a list of {}", self.len()),
            )
        })?;
        proxy.ensure_loaded().await?;
        Ok(proxy)
    }

    /// A new list over a sub-range of the ids; out-of-range bounds are clamped
    pub fn slice(&self, range: impl RangeBounds<usize>) -> ProxyList {
        let len = self.ids.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);

        ProxyList::new(
            Arc::clone(&self.registry),
            self.kind,
            self.ids[start..end].to_vec(),
        )
    }

    /// Iterate proxies, looking each one up as it is reached
    pub fn iter(&self) -> impl Iterator<Item = Proxy> + '_ {
        self.ids
            .iter()
            .map(move |id| self.registry.lookup(self.kind, *id))
    }

    /// One row per proxy, one column per field (all declared fields if
    /// `fields` is empty).
    ///
    /// EMPTY records are fetched, DIRTY records contribute their local
    /// values, and an ERROR record fails the whole conversion.
    pub async fn to_record_batch(&self, fields: &[&str]) -> Result<RecordBatch> {
        let all_fields: Vec<&str>;
        let fields = if fields.is_empty() {
            all_fields = schema_for(self.kind).fields.iter().map(|f| f.name).collect();
            &all_fields[..]
        } else {
            fields
        };

        let mut rows = Vec::with_capacity(self.len());
        for proxy in self.iter() {
            proxy.ensure_loaded().await?;
            rows.push(proxy.loaded_attributes());
        }
        records_to_batch(self.kind, fields, &rows)
    }
}

impl fmt::Debug for ProxyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyList")
            .field("kind", &self.kind)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}
