//! In-process entity store

use super::{EntityStore, SearchPage, SearchQuery};
use crate::error::{Error, Result};
use crate::schema::{schema_for, FieldType};
use crate::types::{Entity, EntityId, EntityKind, JsonValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

/// Store operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Fetch,
    Create,
    Update,
    Delete,
    ResolveName,
    Search,
    List,
}

/// Number of calls made per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub resolve_name: usize,
    pub search: usize,
    pub list: usize,
}

impl CallCounts {
    /// Total number of calls
    pub fn total(&self) -> usize {
        self.fetch
            + self.create
            + self.update
            + self.delete
            + self.resolve_name
            + self.search
            + self.list
    }

    fn bump(&mut self, op: StoreOp) {
        let counter = match op {
            StoreOp::Fetch => &mut self.fetch,
            StoreOp::Create => &mut self.create,
            StoreOp::Update => &mut self.update,
            StoreOp::Delete => &mut self.delete,
            StoreOp::ResolveName => &mut self.resolve_name,
            StoreOp::Search => &mut self.search,
            StoreOp::List => &mut self.list,
        };
        *counter += 1;
    }
}

struct Stored {
    id: EntityId,
    entity: Entity,
    deleted: bool,
}

struct InjectedFailure {
    op: StoreOp,
    id: Option<EntityId>,
    error: Error,
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<EntityKind, Vec<Stored>>,
    calls: CallCounts,
    failures: Vec<InjectedFailure>,
    latency: Option<Duration>,
}

impl MemoryState {
    fn find(&self, kind: EntityKind, id: EntityId) -> Option<&Stored> {
        self.collections.get(&kind)?.iter().find(|s| s.id == id)
    }

    fn find_mut(&mut self, kind: EntityKind, id: EntityId) -> Option<&mut Stored> {
        self.collections
            .get_mut(&kind)?
            .iter_mut()
            .find(|s| s.id == id)
    }

    fn take_failure(&mut self, op: StoreOp, id: Option<EntityId>) -> Option<Error> {
        let pos = self
            .failures
            .iter()
            .position(|f| f.op == op && (f.id.is_none() || f.id == id))?;
        Some(self.failures.remove(pos).error)
    }

    /// Keep reference lists of parents in step with their children
    fn link(&mut self, kind: EntityKind, entity: &Entity, id: EntityId, add: bool) {
        for field in schema_for(kind).trigger_sync_fields() {
            let FieldType::Ref(parent_kind) = field.field_type else {
                continue;
            };
            let Some(parent_id) = entity
                .get(field.entity_name)
                .and_then(JsonValue::as_str)
                .and_then(|s| s.parse::<EntityId>().ok())
            else {
                continue;
            };
            let Some(list_field) = schema_for(parent_kind)
                .fields
                .iter()
                .find(|f| f.field_type == FieldType::RefList(kind))
            else {
                continue;
            };
            let Some(parent) = self.find_mut(parent_kind, parent_id) else {
                continue;
            };

            let list = parent
                .entity
                .entry(list_field.entity_name)
                .or_insert_with(|| JsonValue::Array(Vec::new()));
            if let JsonValue::Array(items) = list {
                let id_value = JsonValue::String(id.to_string());
                items.retain(|item| item != &id_value);
                if add {
                    items.push(id_value);
                }
            }
        }
    }
}

/// Entity store kept entirely in memory.
///
/// Soft-deleted entities remain fetchable with `state` set to `deleted` but
/// are excluded from listings and searches. Search terms are `field:value`
/// exact matches on backend field names.
#[derive(Default)]
pub struct MemoryEntityStore {
    state: Mutex<MemoryState>,
}

impl MemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity, assigning an id if it has none
    pub fn insert(&self, kind: EntityKind, mut entity: Entity) -> EntityId {
        let id = kind.entity_id(&entity).unwrap_or_else(|_| {
            let id = EntityId::new();
            entity.insert(kind.id_field().to_string(), JsonValue::String(id.to_string()));
            id
        });

        let mut state = self.state.lock();
        state.link(kind, &entity, id, true);
        let collection = state.collections.entry(kind).or_default();
        collection.retain(|s| s.id != id);
        collection.push(Stored {
            id,
            entity,
            deleted: false,
        });
        id
    }

    /// Current backend representation of an entity, bypassing counters
    pub fn get(&self, kind: EntityKind, id: EntityId) -> Option<Entity> {
        self.state.lock().find(kind, id).map(|s| s.entity.clone())
    }

    /// Change an entity behind the proxies' back
    pub fn modify(&self, kind: EntityKind, id: EntityId, field: &str, value: JsonValue) -> bool {
        match self.state.lock().find_mut(kind, id) {
            Some(stored) => {
                stored.entity.insert(field.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Remove an entity behind the proxies' back
    pub fn remove(&self, kind: EntityKind, id: EntityId) -> bool {
        let mut state = self.state.lock();
        match state.collections.get_mut(&kind) {
            Some(collection) => {
                let before = collection.len();
                collection.retain(|s| s.id != id);
                collection.len() != before
            }
            None => false,
        }
    }

    /// Call counters so far
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    /// Reset the call counters
    pub fn reset_calls(&self) {
        self.state.lock().calls = CallCounts::default();
    }

    /// Fail the next call of `op`
    pub fn fail_next(&self, op: StoreOp, error: Error) {
        self.state.lock().failures.push(InjectedFailure {
            op,
            id: None,
            error,
        });
    }

    /// Fail the next call of `op` that targets `id`
    pub fn fail_next_for(&self, op: StoreOp, id: EntityId, error: Error) {
        self.state.lock().failures.push(InjectedFailure {
            op,
            id: Some(id),
            error,
        });
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = Some(latency);
    }

    /// Count the call, apply latency and any injected failure
    async fn enter(&self, op: StoreOp, id: Option<EntityId>) -> Result<()> {
        let (latency, failure) = {
            let mut state = self.state.lock();
            state.calls.bump(op);
            (state.latency, state.take_failure(op, id))
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn visible(&self, kind: EntityKind) -> Vec<Entity> {
        self.state
            .lock()
            .collections
            .get(&kind)
            .map(|c| {
                c.iter()
                    .filter(|s| !s.deleted)
                    .map(|s| s.entity.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MemoryEntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryEntityStore")
            .field("calls", &state.calls)
            .field("pending_failures", &state.failures.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn fetch(&self, kind: EntityKind, id: EntityId) -> Result<Entity> {
        self.enter(StoreOp::Fetch, Some(id)).await?;
        self.get(kind, id).ok_or_else(|| Error::not_found(kind, id))
    }

    async fn create(&self, kind: EntityKind, entity: Entity) -> Result<Entity> {
        self.enter(StoreOp::Create, None).await?;

        let schema = schema_for(kind);
        if let Some(name_field) = schema.name_field.and_then(|n| schema.field(n)) {
            let name = entity.get(name_field.entity_name);
            let taken = name.is_some()
                && self
                    .visible(kind)
                    .iter()
                    .any(|e| e.get(name_field.entity_name) == name);
            if taken {
                return Err(Error::validation(name_field.name, "That name is already in use"));
            }
        }

        let mut entity = entity;
        entity.remove(kind.id_field());
        if schema.field("state").is_some() {
            entity
                .entry("state")
                .or_insert_with(|| JsonValue::String("active".to_string()));
        }
        let id = self.insert(kind, entity);
        self.get(kind, id).ok_or_else(|| Error::not_found(kind, id))
    }

    async fn update(&self, kind: EntityKind, id: EntityId, changes: Entity) -> Result<Entity> {
        self.enter(StoreOp::Update, Some(id)).await?;

        let mut state = self.state.lock();
        let stored = state
            .find_mut(kind, id)
            .ok_or_else(|| Error::not_found(kind, id))?;
        for (key, value) in changes {
            stored.entity.insert(key, value);
        }
        Ok(stored.entity.clone())
    }

    async fn delete(&self, kind: EntityKind, id: EntityId, purge: bool) -> Result<()> {
        self.enter(StoreOp::Delete, Some(id)).await?;

        let mut state = self.state.lock();
        let entity = state
            .find(kind, id)
            .map(|s| s.entity.clone())
            .ok_or_else(|| Error::not_found(kind, id))?;

        if purge {
            state.link(kind, &entity, id, false);
            if let Some(collection) = state.collections.get_mut(&kind) {
                collection.retain(|s| s.id != id);
            }
        } else if let Some(stored) = state.find_mut(kind, id) {
            stored.deleted = true;
            stored
                .entity
                .insert("state".to_string(), JsonValue::String("deleted".to_string()));
        }
        Ok(())
    }

    async fn resolve_name(&self, kind: EntityKind, name: &str) -> Result<EntityId> {
        self.enter(StoreOp::ResolveName, None).await?;

        let schema = schema_for(kind);
        let field = schema
            .name_field
            .and_then(|n| schema.field(n))
            .ok_or_else(|| Error::not_found(kind, name))?;

        let state = self.state.lock();
        state
            .collections
            .get(&kind)
            .and_then(|c| {
                c.iter().find(|s| {
                    s.entity.get(field.entity_name).and_then(JsonValue::as_str) == Some(name)
                })
            })
            .map(|s| s.id)
            .ok_or_else(|| Error::not_found(kind, name))
    }

    async fn search(&self, kind: EntityKind, query: &SearchQuery) -> Result<SearchPage> {
        self.enter(StoreOp::Search, None).await?;

        let terms: Vec<(&str, &str)> = query
            .query
            .iter()
            .filter_map(|term| term.split_once(':'))
            .collect();

        let mut matches: Vec<Entity> = self
            .visible(kind)
            .into_iter()
            .filter(|entity| {
                terms
                    .iter()
                    .all(|(field, text)| match entity.get(*field) {
                        Some(JsonValue::String(s)) => s.as_str() == *text,
                        Some(other) => other.to_string() == *text,
                        None => false,
                    })
            })
            .collect();

        if let Some(order_by) = &query.order_by {
            matches.sort_by_key(|e| e.get(order_by).map(ToString::to_string));
        }

        let count = matches.len();
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        let results = matches.into_iter().skip(offset).take(limit).collect();

        Ok(SearchPage { count, results })
    }

    async fn list(&self, kind: EntityKind, limit: usize, offset: usize) -> Result<Vec<String>> {
        self.enter(StoreOp::List, None).await?;

        let state = self.state.lock();
        Ok(state
            .collections
            .get(&kind)
            .map(|c| {
                c.iter()
                    .filter(|s| !s.deleted)
                    .skip(offset)
                    .take(limit)
                    .map(|s| s.id.to_string())
                    .collect()
            })
            .unwrap_or_default())
    }
}
