//! Proxy record and its state machine

use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a proxy record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyState {
    /// No attribute data loaded
    Empty,
    /// Attributes match the last known remote state
    Clean,
    /// Local edits pending
    Dirty,
    /// No longer represents a valid remote entity
    Error,
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProxyState::Empty => "EMPTY",
            ProxyState::Clean => "CLEAN",
            ProxyState::Dirty => "DIRTY",
            ProxyState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Saved record contents, restored on deferred-sync rollback
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Snapshot {
    state: ProxyState,
    attributes: JsonObject,
    changed: JsonObject,
}

/// Local state of one remote entity
#[derive(Debug)]
pub(crate) struct ProxyRecord {
    pub(crate) state: ProxyState,
    /// Current known or local values
    pub(crate) attributes: JsonObject,
    /// Pre-edit values of locally written fields; empty unless DIRTY
    pub(crate) changed: JsonObject,
    /// Per-record override of the registry auto-sync policy
    pub(crate) autosync: Option<bool>,
}

impl ProxyRecord {
    pub(crate) fn new() -> Self {
        Self {
            state: ProxyState::Empty,
            attributes: JsonObject::new(),
            changed: JsonObject::new(),
            autosync: None,
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            attributes: self.attributes.clone(),
            changed: self.changed.clone(),
        }
    }

    /// ERROR is terminal and never rolled back
    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        if self.state == ProxyState::Error {
            return;
        }
        self.state = snapshot.state;
        self.attributes = snapshot.attributes;
        self.changed = snapshot.changed;
    }

    /// Take remote attributes, keeping any local edits on top of them.
    ///
    /// Ends CLEAN when no edits remain, DIRTY otherwise.
    pub(crate) fn adopt(&mut self, mut attributes: JsonObject) {
        for name in self.changed.keys() {
            if let Some(local) = self.attributes.get(name) {
                attributes.insert(name.clone(), local.clone());
            }
        }
        self.attributes = attributes;
        self.state = if self.changed.is_empty() {
            ProxyState::Clean
        } else {
            ProxyState::Dirty
        };
    }

    /// Buffer a local write; the first write of a field keeps its original
    pub(crate) fn write(&mut self, name: &str, value: JsonValue) {
        let previous = self
            .attributes
            .insert(name.to_string(), value)
            .unwrap_or(JsonValue::Null);
        self.changed.entry(name.to_string()).or_insert(previous);
        self.state = ProxyState::Dirty;
    }

    /// Drop local edits, restoring pre-edit values
    pub(crate) fn reset(&mut self) {
        let changed = std::mem::take(&mut self.changed);
        for (name, original) in changed {
            self.attributes.insert(name, original);
        }
        self.state = ProxyState::Clean;
    }

    /// Forget all attribute data
    pub(crate) fn clear(&mut self) {
        self.attributes.clear();
        self.changed.clear();
        self.state = ProxyState::Empty;
    }

    pub(crate) fn mark_error(&mut self) {
        self.changed.clear();
        self.state = ProxyState::Error;
    }
}
