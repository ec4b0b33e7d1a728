//! Per-kind entry point for finding, listing and creating proxies

use crate::error::{Error, Result};
use crate::pagination::{NextPage, OffsetPager, PaginationState};
use crate::proxy::{Proxy, ProxyList, Registry};
use crate::schema::validate_create;
use crate::store::SearchQuery;
use crate::types::{Entity, EntityId, EntityKind, JsonObject, JsonValue};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default cut-off for list and search results
pub const DEFAULT_MAX_FETCH: usize = 1000;

/// Default page size for [`Cursor::fetch_all`]
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Outcome of a search
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Total number of matches on the backend
    pub count: usize,
    /// The returned entities, adopted into the registry
    pub proxies: ProxyList,
}

/// Entry point for the proxies of one kind
#[derive(Debug, Clone)]
pub struct Cursor {
    registry: Arc<Registry>,
    kind: EntityKind,
    max_fetch: usize,
    page_size: usize,
}

impl Cursor {
    pub fn new(registry: Arc<Registry>, kind: EntityKind) -> Self {
        Self {
            registry,
            kind,
            max_fetch: DEFAULT_MAX_FETCH,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the list/search cut-off
    #[must_use]
    pub fn with_max_fetch(mut self, max_fetch: usize) -> Self {
        self.max_fetch = max_fetch.max(1);
        self
    }

    /// Set the page size used by [`fetch_all`](Self::fetch_all)
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn max_fetch(&self) -> usize {
        self.max_fetch
    }

    /// The loaded proxy for an id
    pub async fn get(&self, id: EntityId) -> Result<Proxy> {
        let proxy = self.registry.lookup(self.kind, id);
        proxy.ensure_loaded().await?;
        Ok(proxy)
    }

    /// The loaded proxy for a unique name
    pub async fn get_by_name(&self, name: &str) -> Result<Proxy> {
        let proxy = self.registry.lookup_by_name(self.kind, name).await?;
        proxy.ensure_loaded().await?;
        Ok(proxy)
    }

    /// Like `get`/`get_by_name`, but `None` when the entity does not exist
    pub async fn try_get(&self, name_or_id: &str) -> Result<Option<Proxy>> {
        let found = match name_or_id.parse::<EntityId>() {
            Ok(id) => self.get(id).await,
            Err(_) => self.get_by_name(name_or_id).await,
        };
        match found {
            Ok(proxy) => Ok(Some(proxy)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Whether an entity with this name or id exists
    pub async fn contains(&self, name_or_id: &str) -> Result<bool> {
        Ok(self.try_get(name_or_id).await?.is_some())
    }

    /// One window of the collection listing; `limit` is capped at the
    /// cursor's `max_fetch`
    pub async fn list(&self, limit: Option<usize>, offset: usize) -> Result<ProxyList> {
        let limit = limit.unwrap_or(self.max_fetch).min(self.max_fetch);
        let items = self
            .registry
            .store()
            .list(self.kind, limit, offset)
            .await?;

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let proxy = self.registry.resolve(self.kind, &item).await?;
            ids.push(proxy.id());
        }
        Ok(ProxyList::new(Arc::clone(&self.registry), self.kind, ids))
    }

    /// Run one search; results are adopted into the registry as CLEAN
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let mut query = query.clone();
        query.limit = Some(query.limit.unwrap_or(self.max_fetch).min(self.max_fetch));

        let page = self.registry.store().search(self.kind, &query).await?;
        let ids = self.adopt_all(&page.results)?;
        debug!(
            "Search on {} returned {} of {} match(es)",
            self.kind,
            ids.len(),
            page.count
        );

        Ok(SearchResult {
            count: page.count,
            proxies: ProxyList::new(Arc::clone(&self.registry), self.kind, ids),
        })
    }

    /// Page through every match of a search
    pub async fn fetch_all(&self, query: &SearchQuery, page_size: Option<usize>) -> Result<ProxyList> {
        let mut pager = OffsetPager::new(page_size.unwrap_or(self.page_size));
        if let Some(limit) = query.limit {
            pager = pager.with_max_records(limit);
        }

        let mut state = PaginationState::starting_at(query.offset.unwrap_or(0));
        let mut next = pager.first_page(&mut state);
        let mut ids = Vec::new();

        while let NextPage::Continue { offset, limit } = next {
            let window = query.clone().page(limit, offset);
            let page = self.registry.store().search(self.kind, &window).await?;
            ids.extend(self.adopt_all(&page.results)?);
            next = pager.process_page(page.results.len(), Some(page.count), &mut state);
        }

        debug!("Fetched {} {} record(s) in pages", ids.len(), self.kind);
        Ok(ProxyList::new(Arc::clone(&self.registry), self.kind, ids))
    }

    /// Create an entity from creatable attributes and return its proxy
    pub async fn create(&self, attributes: JsonObject) -> Result<Proxy> {
        let entity = validate_create(self.kind, attributes)?;
        let created = self.registry.store().create(self.kind, entity).await?;

        let proxy = match self.registry.adopt(self.kind, &created) {
            Ok(proxy) => proxy,
            Err(error) => {
                let id = created
                    .get(self.kind.id_field())
                    .and_then(JsonValue::as_str)
                    .unwrap_or("<unknown>");
                warn!(
                    "Created {} {} but could not adopt the response: {}",
                    self.kind, id, error
                );
                return Err(error);
            }
        };
        self.registry
            .invalidate_references(self.kind, &proxy.loaded_attributes());
        info!("Created {} {}", self.kind, proxy.id());
        Ok(proxy)
    }

    /// Adopt search results; records with unsynced edits keep them
    fn adopt_all(&self, entities: &[Entity]) -> Result<Vec<EntityId>> {
        entities
            .iter()
            .map(|entity| match self.registry.adopt(self.kind, entity) {
                Ok(proxy) => Ok(proxy.id()),
                Err(Error::Conflict { id, .. }) => {
                    debug!("Kept local edits of {} {} over search result", self.kind, id);
                    Ok(id)
                }
                Err(error) => Err(error),
            })
            .collect()
    }
}
