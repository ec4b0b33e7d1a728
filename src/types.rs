//! Common types used throughout the catalog proxy client
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// An entity as exchanged with the backend: a JSON object
pub type Entity = JsonObject;

// ============================================================================
// Entity Identity
// ============================================================================

/// Unique identifier of a remote entity.
///
/// Immutable and never reused. The nil UUID is not a legal entity id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from a UUID, rejecting the nil UUID.
    pub fn from_uuid(uuid: Uuid) -> Result<Self> {
        if uuid.is_nil() {
            return Err(Error::validation("id", "the nil UUID is not a legal entity id"));
        }
        Ok(Self(uuid))
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(s)
            .map_err(|e| Error::validation("id", format!("'{s}' is not a UUID: {e}")))?;
        Self::from_uuid(uuid)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Entity Kind
// ============================================================================

/// The closed set of entity kinds exposed by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Dataset,
    Resource,
    Organization,
    Group,
    User,
    Process,
    Workflow,
    Tool,
    Task,
    Vocabulary,
    Tag,
    Policy,
}

impl EntityKind {
    /// All kinds, in declaration order
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Dataset,
        EntityKind::Resource,
        EntityKind::Organization,
        EntityKind::Group,
        EntityKind::User,
        EntityKind::Process,
        EntityKind::Workflow,
        EntityKind::Tool,
        EntityKind::Task,
        EntityKind::Vocabulary,
        EntityKind::Tag,
        EntityKind::Policy,
    ];

    /// Singular API model name, used for single-entity endpoints
    pub fn model_name(self) -> &'static str {
        match self {
            EntityKind::Dataset => "dataset",
            EntityKind::Resource => "resource",
            EntityKind::Organization => "organization",
            EntityKind::Group => "group",
            EntityKind::User => "user",
            EntityKind::Process => "process",
            EntityKind::Workflow => "workflow",
            EntityKind::Tool => "tool",
            EntityKind::Task => "task",
            EntityKind::Vocabulary => "vocabulary",
            EntityKind::Tag => "tag",
            EntityKind::Policy => "policy",
        }
    }

    /// Plural API collection name, used for list/search/purge endpoints
    pub fn collection_name(self) -> &'static str {
        match self {
            EntityKind::Dataset => "datasets",
            EntityKind::Resource => "resources",
            EntityKind::Organization => "organizations",
            EntityKind::Group => "groups",
            EntityKind::User => "users",
            EntityKind::Process => "processes",
            EntityKind::Workflow => "workflows",
            EntityKind::Tool => "tools",
            EntityKind::Task => "tasks",
            EntityKind::Vocabulary => "vocabularies",
            EntityKind::Tag => "tags",
            EntityKind::Policy => "policies",
        }
    }

    /// Entity field carrying the id of this kind
    pub fn id_field(self) -> &'static str {
        match self {
            EntityKind::Task => "task_exec_id",
            EntityKind::Policy => "policy_uuid",
            _ => "id",
        }
    }

    /// Extract and parse the id of an entity of this kind
    pub fn entity_id(self, entity: &Entity) -> Result<EntityId> {
        let raw = entity
            .get(self.id_field())
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::Entity {
                kind: self,
                message: format!("missing '{}' field", self.id_field()),
            })?;
        raw.parse()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Backoff Strategy
// ============================================================================

/// Backoff strategy for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}
