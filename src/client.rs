//! Client facade
//!
//! Wires a [`ClientConfig`], an [`EntityStore`] and a [`Registry`] together
//! and hands out one [`Cursor`] per entity kind.

use crate::config::ClientConfig;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::proxy::{DeferredSync, Proxy, Registry};
use crate::store::{EntityStore, HttpEntityStore};
use crate::types::{EntityId, EntityKind};
use std::sync::Arc;
use tracing::info;

/// Entry point to one catalog deployment
#[derive(Debug, Clone)]
pub struct Client {
    registry: Arc<Registry>,
    config: ClientConfig,
}

impl Client {
    /// Connect to the REST API described by `config`
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = HttpEntityStore::from_config(&config)?;
        info!("Catalog client for {}", config.api_url());
        Self::with_store(Arc::new(store), config)
    }

    /// Use a custom store, e.g. a `MemoryEntityStore` in tests
    pub fn with_store(store: Arc<dyn EntityStore>, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let registry = Registry::with_autosync(store, config.proxy.autosync);
        Ok(Self { registry, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The registry shared by every cursor of this client
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Cursor over the entities of `kind`
    pub fn cursor(&self, kind: EntityKind) -> Cursor {
        Cursor::new(Arc::clone(&self.registry), kind)
            .with_max_fetch(self.config.proxy.max_fetch)
            .with_page_size(self.config.proxy.page_size)
    }

    pub fn datasets(&self) -> Cursor {
        self.cursor(EntityKind::Dataset)
    }

    pub fn resources(&self) -> Cursor {
        self.cursor(EntityKind::Resource)
    }

    pub fn organizations(&self) -> Cursor {
        self.cursor(EntityKind::Organization)
    }

    pub fn groups(&self) -> Cursor {
        self.cursor(EntityKind::Group)
    }

    pub fn users(&self) -> Cursor {
        self.cursor(EntityKind::User)
    }

    pub fn processes(&self) -> Cursor {
        self.cursor(EntityKind::Process)
    }

    pub fn workflows(&self) -> Cursor {
        self.cursor(EntityKind::Workflow)
    }

    pub fn tools(&self) -> Cursor {
        self.cursor(EntityKind::Tool)
    }

    pub fn tasks(&self) -> Cursor {
        self.cursor(EntityKind::Task)
    }

    pub fn vocabularies(&self) -> Cursor {
        self.cursor(EntityKind::Vocabulary)
    }

    pub fn tags(&self) -> Cursor {
        self.cursor(EntityKind::Tag)
    }

    pub fn policies(&self) -> Cursor {
        self.cursor(EntityKind::Policy)
    }

    /// Proxy for (kind, id) without any I/O
    pub fn lookup(&self, kind: EntityKind, id: EntityId) -> Proxy {
        self.registry.lookup(kind, id)
    }

    /// Open a deferred-sync scope on this client's registry
    pub fn deferred_sync(&self) -> DeferredSync {
        self.registry.deferred_sync()
    }
}
