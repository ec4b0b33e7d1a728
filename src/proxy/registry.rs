//! Registry of live proxy records

use super::deferred::{DeferredSync, ScopeFrame};
use super::handle::Proxy;
use super::state::{ProxyRecord, ProxyState};
use crate::error::{Error, Result};
use crate::schema::{attributes_from_entity, schema_for, FieldType};
use crate::store::EntityStore;
use crate::types::{Entity, EntityId, EntityKind, JsonObject, JsonValue};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A registered record: the shared state behind every handle to one entity
pub(crate) struct RecordEntry {
    pub(crate) kind: EntityKind,
    pub(crate) id: EntityId,
    pub(crate) record: Mutex<ProxyRecord>,
    /// Serializes syncs of this record
    pub(crate) gate: tokio::sync::Mutex<()>,
}

impl RecordEntry {
    fn new(kind: EntityKind, id: EntityId) -> Self {
        Self {
            kind,
            id,
            record: Mutex::new(ProxyRecord::new()),
            gate: tokio::sync::Mutex::new(()),
        }
    }
}

/// Counts of registered records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub by_kind: BTreeMap<EntityKind, usize>,
    pub by_state: BTreeMap<ProxyState, usize>,
}

/// Maps (kind, id) to at most one live record.
///
/// A registry is an explicit context: create one per backend (or per test)
/// and share it through `Arc`. Records are never evicted.
pub struct Registry {
    store: Arc<dyn EntityStore>,
    records: Mutex<HashMap<(EntityKind, EntityId), Arc<RecordEntry>>>,
    pub(crate) scopes: Mutex<Vec<ScopeFrame>>,
    autosync: AtomicBool,
}

impl Registry {
    /// Create a registry over a store, with auto-sync off
    pub fn new(store: Arc<dyn EntityStore>) -> Arc<Self> {
        Self::with_autosync(store, false)
    }

    /// Create a registry with the given auto-sync policy
    pub fn with_autosync(store: Arc<dyn EntityStore>, autosync: bool) -> Arc<Self> {
        Arc::new(Self {
            store,
            records: Mutex::new(HashMap::new()),
            scopes: Mutex::new(Vec::new()),
            autosync: AtomicBool::new(autosync),
        })
    }

    /// The backend store
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Default auto-sync policy for records without an override
    pub fn autosync(&self) -> bool {
        self.autosync.load(Ordering::Relaxed)
    }

    pub fn set_autosync(&self, enabled: bool) {
        self.autosync.store(enabled, Ordering::Relaxed);
    }

    /// Return the proxy for (kind, id), registering an EMPTY record if needed
    pub fn lookup(self: &Arc<Self>, kind: EntityKind, id: EntityId) -> Proxy {
        let entry = {
            let mut records = self.records.lock();
            Arc::clone(records.entry((kind, id)).or_insert_with(|| {
                debug!("Registered {} {}", kind, id);
                Arc::new(RecordEntry::new(kind, id))
            }))
        };
        Proxy::new(Arc::clone(self), entry)
    }

    /// Return the proxy for (kind, id) only if it is already registered
    pub fn existing(self: &Arc<Self>, kind: EntityKind, id: EntityId) -> Option<Proxy> {
        let entry = self.records.lock().get(&(kind, id)).cloned()?;
        Some(Proxy::new(Arc::clone(self), entry))
    }

    /// Resolve a unique name with one backend query, then look up the id
    pub async fn lookup_by_name(self: &Arc<Self>, kind: EntityKind, name: &str) -> Result<Proxy> {
        let id = self.store.resolve_name(kind, name).await?;
        Ok(self.lookup(kind, id))
    }

    /// Look up by id when the argument parses as one, by name otherwise
    pub async fn resolve(self: &Arc<Self>, kind: EntityKind, name_or_id: &str) -> Result<Proxy> {
        match name_or_id.parse::<EntityId>() {
            Ok(id) => Ok(self.lookup(kind, id)),
            Err(_) => self.lookup_by_name(kind, name_or_id).await,
        }
    }

    /// Load a backend-provided entity into its record without a fetch.
    ///
    /// Fails with [`Error::Conflict`] rather than overwrite local edits.
    pub fn adopt(self: &Arc<Self>, kind: EntityKind, entity: &Entity) -> Result<Proxy> {
        let id = kind.entity_id(entity)?;
        let attributes = attributes_from_entity(kind, entity)?;
        let proxy = self.lookup(kind, id);

        {
            let mut record = proxy.entry.record.lock();
            match record.state {
                ProxyState::Empty | ProxyState::Clean => record.adopt(attributes),
                ProxyState::Dirty => {
                    return Err(Error::Conflict {
                        kind,
                        id,
                        message: "record has unsynced changes".to_string(),
                    })
                }
                ProxyState::Error => return Err(Error::ErrorState { kind, id }),
            }
        }
        Ok(proxy)
    }

    /// Open a deferred-sync scope
    pub fn deferred_sync(self: &Arc<Self>) -> DeferredSync {
        DeferredSync::open(Arc::clone(self))
    }

    /// Whether any deferred-sync scope is open
    pub fn in_deferred_scope(&self) -> bool {
        !self.scopes.lock().is_empty()
    }

    /// Number of registered records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count registered records per kind and per state
    pub fn stats(&self) -> RegistryStats {
        let records = self.records.lock();
        let mut stats = RegistryStats {
            total: records.len(),
            ..Default::default()
        };
        for ((kind, _), entry) in records.iter() {
            *stats.by_kind.entry(*kind).or_default() += 1;
            *stats.by_state.entry(entry.record.lock().state).or_default() += 1;
        }
        stats
    }

    /// Record a write in the innermost open scope, snapshotting on first touch
    pub(crate) fn touch(&self, entry: &Arc<RecordEntry>) {
        let mut scopes = self.scopes.lock();
        if let Some(frame) = scopes.last_mut() {
            if !frame.contains(entry) {
                let snapshot = entry.record.lock().snapshot();
                frame.touched.push((Arc::clone(entry), snapshot));
            }
        }
    }

    /// Make CLEAN records referenced through trigger-sync fields stale
    pub(crate) fn invalidate_references(&self, kind: EntityKind, attributes: &JsonObject) {
        for field in schema_for(kind).trigger_sync_fields() {
            let FieldType::Ref(target) = field.field_type else {
                continue;
            };
            let Some(id) = attributes
                .get(field.name)
                .and_then(JsonValue::as_str)
                .and_then(|s| s.parse::<EntityId>().ok())
            else {
                continue;
            };

            let entry = self.records.lock().get(&(target, id)).cloned();
            if let Some(entry) = entry {
                let mut record = entry.record.lock();
                if record.state == ProxyState::Clean {
                    record.clear();
                    debug!("Invalidated {} {} via {}.{}", target, id, kind, field.name);
                }
            }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.len())
            .field("open_scopes", &self.scopes.lock().len())
            .field("autosync", &self.autosync())
            .finish_non_exhaustive()
    }
}
