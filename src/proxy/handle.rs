//! Proxy handle: the public face of a registered record

use super::list::ProxyList;
use super::registry::{RecordEntry, Registry};
use super::state::ProxyState;
use crate::error::{Error, Result};
use crate::schema::{
    attributes_from_entity, entity_from_attributes, schema_for, validate_write, FieldSpec,
    FieldType,
};
use crate::types::{EntityId, EntityKind, JsonObject, JsonValue};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// In-memory representative of one remote entity.
///
/// Handles are cheap to clone; every clone (and every later lookup of the
/// same id in the same registry) shares one record, so mutations are
/// visible to all holders.
#[derive(Clone)]
pub struct Proxy {
    pub(super) registry: Arc<Registry>,
    pub(super) entry: Arc<RecordEntry>,
}

impl Proxy {
    pub(crate) fn new(registry: Arc<Registry>, entry: Arc<RecordEntry>) -> Self {
        Self { registry, entry }
    }

    pub fn id(&self) -> EntityId {
        self.entry.id
    }

    pub fn kind(&self) -> EntityKind {
        self.entry.kind
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProxyState {
        self.entry.record.lock().state
    }

    /// Whether both handles share the same record
    pub fn same_record(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    /// Pre-edit values of the fields written since the last sync
    pub fn changed(&self) -> JsonObject {
        self.entry.record.lock().changed.clone()
    }

    /// Effective auto-sync policy of this record
    pub fn autosync(&self) -> bool {
        self.entry
            .record
            .lock()
            .autosync
            .unwrap_or_else(|| self.registry.autosync())
    }

    /// Override the registry auto-sync policy; `None` follows the registry
    pub fn set_autosync(&self, autosync: Option<bool>) {
        self.entry.record.lock().autosync = autosync;
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch the entity if nothing is loaded yet.
    ///
    /// A missing entity moves the record to ERROR.
    pub async fn ensure_loaded(&self) -> Result<()> {
        match self.state() {
            ProxyState::Empty => self.sync_inner(true).await,
            ProxyState::Error => Err(self.error_state()),
            ProxyState::Clean | ProxyState::Dirty => Ok(()),
        }
    }

    /// Read an attribute, loading the entity first if needed
    pub async fn get(&self, name: &str) -> Result<JsonValue> {
        self.ensure_loaded().await?;

        let record = self.entry.record.lock();
        if record.state == ProxyState::Error {
            return Err(self.error_state());
        }
        match record.attributes.get(name) {
            Some(value) => Ok(value.clone()),
            None if schema_for(self.kind()).field(name).is_some() => Ok(JsonValue::Null),
            None => Err(Error::UnknownField {
                kind: self.kind(),
                field: name.to_string(),
            }),
        }
    }

    /// Read an attribute as a string
    pub async fn get_str(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name).await?.as_str().map(str::to_string))
    }

    /// Read an attribute without any I/O
    pub fn peek(&self, name: &str) -> Option<JsonValue> {
        self.entry.record.lock().attributes.get(name).cloned()
    }

    /// All attributes, loading the entity first if needed
    pub async fn attributes(&self) -> Result<JsonObject> {
        self.ensure_loaded().await?;
        Ok(self.entry.record.lock().attributes.clone())
    }

    /// The unique name, for kinds that have one
    pub async fn name(&self) -> Result<Option<String>> {
        match schema_for(self.kind()).name_field {
            Some(field) => self.get_str(field).await,
            None => Ok(None),
        }
    }

    /// Resolve a reference field to the referenced proxy
    pub async fn get_ref(&self, name: &str) -> Result<Option<Proxy>> {
        let FieldType::Ref(target) = self.field(name)?.field_type else {
            return Err(Error::validation(name, "not a reference field"));
        };
        match self.get(name).await? {
            JsonValue::Null => Ok(None),
            JsonValue::String(s) => Ok(Some(self.registry.lookup(target, s.parse()?))),
            other => Err(Error::validation(name, format!("expected an id, got {other}"))),
        }
    }

    /// Resolve a reference-list field to a proxy list
    pub async fn get_refs(&self, name: &str) -> Result<ProxyList> {
        let FieldType::RefList(target) = self.field(name)?.field_type else {
            return Err(Error::validation(name, "not a reference list field"));
        };
        let ids = match self.get(name).await? {
            JsonValue::Null => Vec::new(),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| Error::validation(name, format!("expected an id, got {item}")))?
                        .parse()
                })
                .collect::<Result<Vec<EntityId>>>()?,
            other => return Err(Error::validation(name, format!("expected a list, got {other}"))),
        };
        Ok(ProxyList::new(Arc::clone(&self.registry), target, ids))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write an attribute.
    ///
    /// The value is validated and buffered, and the record becomes DIRTY.
    /// With auto-sync on and no deferred scope open, the write is synced
    /// immediately; if that fails the local edits are discarded.
    pub async fn set(&self, name: &str, value: impl Into<JsonValue>) -> Result<()> {
        let value = validate_write(self.kind(), name, value.into())?;
        if self.state() == ProxyState::Error {
            return Err(self.error_state());
        }

        // Snapshot before loading so a discarded scope restores EMPTY records
        self.registry.touch(&self.entry);
        self.ensure_loaded().await?;
        {
            let mut record = self.entry.record.lock();
            if record.state == ProxyState::Error {
                return Err(self.error_state());
            }
            record.write(name, value);
        }

        if self.registry.in_deferred_scope() || !self.autosync() {
            return Ok(());
        }

        if let Err(error) = self.sync().await {
            warn!(
                "Auto-sync of {} {} failed, local changes discarded: {}",
                self.kind(),
                self.id(),
                error
            );
            let mut record = self.entry.record.lock();
            if record.state == ProxyState::Dirty {
                record.reset();
            }
            return Err(error);
        }
        Ok(())
    }

    /// Write several attributes inside a deferred scope, then sync once
    pub async fn update<I, K>(&self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: AsRef<str>,
    {
        let scope = self.registry.deferred_sync();
        for (name, value) in fields {
            self.set(name.as_ref(), value).await?;
        }
        scope.commit().await
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Reconcile with the backend.
    ///
    /// EMPTY and CLEAN records are (re)fetched; DIRTY records send their
    /// changed fields. On failure a DIRTY record keeps its edits. A missing
    /// entity moves the record to ERROR.
    pub async fn sync(&self) -> Result<()> {
        self.sync_inner(false).await
    }

    async fn sync_inner(&self, load_only: bool) -> Result<()> {
        let _gate = self.entry.gate.lock().await;

        let pending = {
            let record = self.entry.record.lock();
            match record.state {
                ProxyState::Error => return Err(self.error_state()),
                ProxyState::Clean | ProxyState::Dirty if load_only => return Ok(()),
                ProxyState::Empty | ProxyState::Clean => None,
                ProxyState::Dirty => Some(
                    record
                        .changed
                        .keys()
                        .filter_map(|name| {
                            let value = record.attributes.get(name)?.clone();
                            Some((name.clone(), value))
                        })
                        .collect::<JsonObject>(),
                ),
            }
        };

        match pending {
            None => self.pull().await,
            Some(sent) => self.push(sent).await,
        }
    }

    async fn pull(&self) -> Result<()> {
        let (kind, id) = (self.kind(), self.id());
        let entity = match self.registry.store().fetch(kind, id).await {
            Ok(entity) => entity,
            Err(error) => return Err(self.fail(error)),
        };
        let attributes = attributes_from_entity(kind, &entity)?;
        self.entry.record.lock().adopt(attributes);
        debug!("Loaded {} {}", kind, id);
        Ok(())
    }

    async fn push(&self, sent: JsonObject) -> Result<()> {
        let (kind, id) = (self.kind(), self.id());
        let changes = entity_from_attributes(kind, &sent, sent.keys().map(String::as_str));
        debug!("Updating {} {} ({} field(s))", kind, id, changes.len());

        let entity = match self.registry.store().update(kind, id, changes).await {
            Ok(entity) => entity,
            Err(error) => return Err(self.fail(error)),
        };
        let attributes = attributes_from_entity(kind, &entity)?;

        let mut record = self.entry.record.lock();
        // Fields rewritten while the update was in flight stay DIRTY
        for (name, value) in &sent {
            if record.attributes.get(name) == Some(value) {
                record.changed.remove(name);
            }
        }
        record.adopt(attributes);
        debug!("Synced {} {} -> {}", kind, id, record.state);
        Ok(())
    }

    /// Move the record to ERROR when the entity turned out to be missing
    fn fail(&self, error: Error) -> Error {
        if error.is_not_found() {
            warn!("{} {} not found, marking proxy as ERROR", self.kind(), self.id());
            self.entry.record.lock().mark_error();
        }
        error
    }

    /// Drop loaded data so the next read re-fetches.
    ///
    /// Fails on a DIRTY record unless `force` is set.
    pub fn invalidate(&self, force: bool) -> Result<()> {
        let mut record = self.entry.record.lock();
        match record.state {
            ProxyState::Empty => Ok(()),
            ProxyState::Clean => {
                record.clear();
                Ok(())
            }
            ProxyState::Dirty if force => {
                record.clear();
                Ok(())
            }
            ProxyState::Dirty => Err(Error::Invalidation {
                kind: self.kind(),
                id: self.id(),
            }),
            ProxyState::Error => Err(self.error_state()),
        }
    }

    /// Discard local edits without any network call
    pub fn reset(&self) -> Result<()> {
        let mut record = self.entry.record.lock();
        match record.state {
            ProxyState::Dirty => {
                record.reset();
                Ok(())
            }
            ProxyState::Empty | ProxyState::Clean => Ok(()),
            ProxyState::Error => Err(self.error_state()),
        }
    }

    /// Delete the entity.
    ///
    /// A soft delete leaves the entity in place, flagged as deleted, and the
    /// proxy EMPTY. A purge removes it and leaves the proxy in ERROR.
    pub async fn delete(&self, purge: bool) -> Result<()> {
        self.ensure_loaded().await?;
        let _gate = self.entry.gate.lock().await;
        let (kind, id) = (self.kind(), self.id());

        let attributes = self.entry.record.lock().attributes.clone();
        if let Err(error) = self.registry.store().delete(kind, id, purge).await {
            return Err(self.fail(error));
        }

        {
            let mut record = self.entry.record.lock();
            if purge {
                record.mark_error();
            } else {
                record.clear();
            }
        }
        info!("Deleted {} {} (purge: {})", kind, id, purge);

        self.registry.invalidate_references(kind, &attributes);
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn field(&self, name: &str) -> Result<&'static FieldSpec> {
        schema_for(self.kind())
            .field(name)
            .ok_or_else(|| Error::UnknownField {
                kind: self.kind(),
                field: name.to_string(),
            })
    }

    fn error_state(&self) -> Error {
        Error::ErrorState {
            kind: self.kind(),
            id: self.id(),
        }
    }

    /// Loaded attributes without I/O
    pub(crate) fn loaded_attributes(&self) -> JsonObject {
        self.entry.record.lock().attributes.clone()
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.id() == other.id()
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {} {}>", self.kind(), self.id(), self.state())
    }
}
