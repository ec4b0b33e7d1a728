use super::*;
use crate::error::Error;
use crate::store::{MemoryEntityStore, StoreOp};
use crate::types::{EntityId, EntityKind, JsonObject};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<MemoryEntityStore>, Arc<Registry>) {
    let store = Arc::new(MemoryEntityStore::new());
    let registry = Registry::new(store.clone());
    (store, registry)
}

fn entity(value: serde_json::Value) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn seed_dataset(store: &MemoryEntityStore, name: &str, title: &str) -> EntityId {
    store.insert(
        EntityKind::Dataset,
        entity(json!({"name": name, "title": title, "state": "active"})),
    )
}

fn seed_resource(store: &MemoryEntityStore, dataset: EntityId, name: &str) -> EntityId {
    store.insert(
        EntityKind::Resource,
        entity(json!({
            "package_id": dataset.to_string(),
            "name": name,
            "url": "http://example.org/data.csv",
            "state": "active"
        })),
    )
}

// ============================================================================
// Identity and loading
// ============================================================================

#[test]
fn test_lookup_returns_shared_record() {
    let (_, registry) = setup();
    let id = EntityId::new();

    let a = registry.lookup(EntityKind::Dataset, id);
    let b = registry.lookup(EntityKind::Dataset, id);
    let other_kind = registry.lookup(EntityKind::Group, id);

    assert!(a.same_record(&b));
    assert_eq!(a, b);
    assert!(!a.same_record(&other_kind));
    assert_eq!(a.state(), ProxyState::Empty);
    assert_eq!(registry.len(), 2);
    assert!(registry.existing(EntityKind::Tool, id).is_none());
}

#[tokio::test]
async fn test_first_read_fetches_once() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    assert_eq!(proxy.get("title").await.unwrap(), json!("Rivers"));
    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(proxy.name().await.unwrap().as_deref(), Some("rivers"));
    assert_eq!(proxy.get("notes").await.unwrap(), json!(null));
    assert_eq!(store.calls().fetch, 1);
}

#[tokio::test]
async fn test_concurrent_loads_fetch_once() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    store.set_latency(Duration::from_millis(20));

    let a = registry.lookup(EntityKind::Dataset, id);
    let b = registry.lookup(EntityKind::Dataset, id);
    let (title, name) = tokio::join!(a.get("title"), b.get("name"));

    assert_eq!(title.unwrap(), json!("Rivers"));
    assert_eq!(name.unwrap(), json!("rivers"));
    assert_eq!(store.calls().fetch, 1);
}

#[tokio::test]
async fn test_unknown_field_read() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    assert!(matches!(
        proxy.get("no_such_field").await,
        Err(Error::UnknownField { .. })
    ));
}

#[tokio::test]
async fn test_missing_entity_moves_to_error() {
    let (store, registry) = setup();
    let proxy = registry.lookup(EntityKind::Dataset, EntityId::new());

    assert!(matches!(proxy.get("title").await, Err(Error::NotFound { .. })));
    assert_eq!(proxy.state(), ProxyState::Error);

    assert!(matches!(proxy.get("title").await, Err(Error::ErrorState { .. })));
    assert!(matches!(
        proxy.set("title", "x").await,
        Err(Error::ErrorState { .. })
    ));
    assert!(proxy.sync().await.is_err());
    assert!(proxy.reset().is_err());
    assert_eq!(store.calls().fetch, 1);
}

#[tokio::test]
async fn test_immutable_write_on_error_record() {
    let (_store, registry) = setup();
    let proxy = registry.lookup(EntityKind::Dataset, EntityId::new());
    assert!(proxy.get("title").await.is_err());
    assert_eq!(proxy.state(), ProxyState::Error);

    assert!(matches!(
        proxy.set("id", EntityId::new().to_string()).await,
        Err(Error::Immutable { .. })
    ));
    assert!(matches!(
        proxy.set("metadata_created", "2024-01-01").await,
        Err(Error::Immutable { .. })
    ));
    assert_eq!(proxy.state(), ProxyState::Error);
}

// ============================================================================
// Writes and sync
// ============================================================================

#[tokio::test]
async fn test_write_marks_dirty_without_update() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);
    proxy.ensure_loaded().await.unwrap();

    proxy.set("title", "Streams").await.unwrap();
    proxy.set("title", "Creeks").await.unwrap();

    assert_eq!(proxy.state(), ProxyState::Dirty);
    assert_eq!(proxy.peek("title"), Some(json!("Creeks")));
    assert_eq!(proxy.changed(), entity(json!({"title": "Rivers"})));
    assert_eq!(store.calls().update, 0);
    assert_eq!(store.get(EntityKind::Dataset, id).unwrap()["title"], json!("Rivers"));
}

#[tokio::test]
async fn test_reset_restores_original_values() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    proxy.set("title", "Streams").await.unwrap();
    proxy.set("notes", "flowing").await.unwrap();
    proxy.reset().unwrap();

    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(proxy.get("title").await.unwrap(), json!("Rivers"));
    assert_eq!(proxy.get("notes").await.unwrap(), json!(null));
    assert!(proxy.changed().is_empty());
    assert_eq!(store.calls().total(), 1);
}

#[tokio::test]
async fn test_sync_sends_changed_fields() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    proxy.set("title", "Streams").await.unwrap();
    proxy.sync().await.unwrap();

    assert_eq!(proxy.state(), ProxyState::Clean);
    assert!(proxy.changed().is_empty());
    assert_eq!(store.calls().update, 1);
    assert_eq!(store.get(EntityKind::Dataset, id).unwrap()["title"], json!("Streams"));
}

#[tokio::test]
async fn test_sync_of_clean_record_refetches() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);
    proxy.ensure_loaded().await.unwrap();

    store.modify(EntityKind::Dataset, id, "title", json!("Renamed"));
    proxy.sync().await.unwrap();

    assert_eq!(proxy.get("title").await.unwrap(), json!("Renamed"));
    assert_eq!(store.calls().fetch, 2);
}

#[tokio::test]
async fn test_failed_sync_keeps_edits() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    proxy.set("title", "Streams").await.unwrap();
    store.fail_next(StoreOp::Update, Error::operation("update", "backend down"));

    assert!(matches!(proxy.sync().await, Err(Error::Operation { .. })));
    assert_eq!(proxy.state(), ProxyState::Dirty);
    assert_eq!(proxy.peek("title"), Some(json!("Streams")));

    proxy.sync().await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Clean);
}

#[tokio::test]
async fn test_autosync_write() {
    let store = Arc::new(MemoryEntityStore::new());
    let registry = Registry::with_autosync(store.clone(), true);
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    proxy.set("title", "Streams").await.unwrap();

    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(store.calls().update, 1);
    assert_eq!(store.get(EntityKind::Dataset, id).unwrap()["title"], json!("Streams"));
}

#[tokio::test]
async fn test_failed_autosync_discards_edits() {
    let store = Arc::new(MemoryEntityStore::new());
    let registry = Registry::with_autosync(store.clone(), true);
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);
    proxy.ensure_loaded().await.unwrap();

    store.fail_next(
        StoreOp::Update,
        Error::validation("title", "rejected by backend"),
    );
    assert!(matches!(
        proxy.set("title", "Streams").await,
        Err(Error::Validation { .. })
    ));

    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(proxy.peek("title"), Some(json!("Rivers")));
}

#[tokio::test]
async fn test_per_record_autosync_override() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    assert!(!proxy.autosync());
    proxy.set_autosync(Some(true));
    proxy.set("title", "Streams").await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Clean);

    registry.set_autosync(true);
    proxy.set_autosync(Some(false));
    proxy.set("title", "Creeks").await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Dirty);
    assert_eq!(store.calls().update, 1);
}

#[tokio::test]
async fn test_rejected_writes_change_nothing() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    assert!(matches!(
        proxy.set("metadata_created", "2024-01-01").await,
        Err(Error::Immutable { .. })
    ));
    assert!(matches!(proxy.set("id", "x").await, Err(Error::Immutable { .. })));
    assert!(matches!(
        proxy.set("colour", "blue").await,
        Err(Error::UnknownField { .. })
    ));
    assert_eq!(proxy.state(), ProxyState::Empty);
    assert_eq!(store.calls().total(), 0);

    proxy.ensure_loaded().await.unwrap();
    assert!(matches!(
        proxy.set("private", "yes").await,
        Err(Error::Validation { .. })
    ));
    assert_eq!(proxy.state(), ProxyState::Clean);
}

#[tokio::test]
async fn test_write_during_update_stays_dirty() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);
    proxy.ensure_loaded().await.unwrap();

    proxy.set("title", "Streams").await.unwrap();
    store.set_latency(Duration::from_millis(100));

    let (synced, written) = tokio::join!(proxy.sync(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        proxy.set("title", "Creeks").await
    });
    synced.unwrap();
    written.unwrap();

    assert_eq!(proxy.state(), ProxyState::Dirty);
    assert_eq!(proxy.peek("title"), Some(json!("Creeks")));
    assert_eq!(store.get(EntityKind::Dataset, id).unwrap()["title"], json!("Streams"));

    proxy.sync().await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(store.get(EntityKind::Dataset, id).unwrap()["title"], json!("Creeks"));
}

#[tokio::test]
async fn test_update_syncs_once() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    proxy
        .update([("title", json!("Streams")), ("notes", json!("All the streams"))])
        .await
        .unwrap();

    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(store.calls().update, 1);
    let stored = store.get(EntityKind::Dataset, id).unwrap();
    assert_eq!(stored["title"], json!("Streams"));
    assert_eq!(stored["notes"], json!("All the streams"));
}

#[tokio::test]
async fn test_renamed_field_is_sent_under_backend_name() {
    let (store, registry) = setup();
    let org = store.insert(
        EntityKind::Organization,
        entity(json!({"name": "water-board", "type": "organization"})),
    );
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    proxy.set("organization", org.to_string()).await.unwrap();
    proxy.sync().await.unwrap();

    let stored = store.get(EntityKind::Dataset, id).unwrap();
    assert_eq!(stored["owner_org"], json!(org.to_string()));
    assert!(!stored.contains_key("organization"));
}

// ============================================================================
// Invalidation and adoption
// ============================================================================

#[tokio::test]
async fn test_invalidate() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);
    proxy.ensure_loaded().await.unwrap();

    proxy.invalidate(false).unwrap();
    assert_eq!(proxy.state(), ProxyState::Empty);
    proxy.get("title").await.unwrap();
    assert_eq!(store.calls().fetch, 2);

    proxy.set("title", "Streams").await.unwrap();
    assert!(matches!(
        proxy.invalidate(false),
        Err(Error::Invalidation { .. })
    ));
    assert_eq!(proxy.state(), ProxyState::Dirty);

    proxy.invalidate(true).unwrap();
    assert_eq!(proxy.state(), ProxyState::Empty);
    assert_eq!(proxy.get("title").await.unwrap(), json!("Rivers"));
}

#[tokio::test]
async fn test_adopt_without_fetch() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let remote = store.get(EntityKind::Dataset, id).unwrap();

    let proxy = registry.adopt(EntityKind::Dataset, &remote).unwrap();
    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(proxy.get("title").await.unwrap(), json!("Rivers"));
    assert_eq!(store.calls().total(), 0);
}

#[tokio::test]
async fn test_adopt_refuses_to_overwrite_edits() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "rivers", "Rivers");
    let proxy = registry.lookup(EntityKind::Dataset, id);
    proxy.set("title", "Streams").await.unwrap();

    let remote = store.get(EntityKind::Dataset, id).unwrap();
    assert!(matches!(
        registry.adopt(EntityKind::Dataset, &remote),
        Err(Error::Conflict { .. })
    ));
    assert_eq!(proxy.peek("title"), Some(json!("Streams")));
}

// ============================================================================
// References and deletion
// ============================================================================

#[tokio::test]
async fn test_reference_navigation() {
    let (store, registry) = setup();
    let dataset = seed_dataset(&store, "rivers", "Rivers");
    let first = seed_resource(&store, dataset, "first");
    let second = seed_resource(&store, dataset, "second");

    let resource = registry.lookup(EntityKind::Resource, first);
    let parent = resource.get_ref("dataset").await.unwrap().unwrap();
    assert!(parent.same_record(&registry.lookup(EntityKind::Dataset, dataset)));
    assert_eq!(parent.state(), ProxyState::Empty);

    let resources = parent.get_refs("resources").await.unwrap();
    assert_eq!(resources.kind(), EntityKind::Resource);
    assert_eq!(resources.ids(), &[first, second]);

    assert!(matches!(
        parent.get_ref("title").await,
        Err(Error::Validation { .. })
    ));
    assert!(parent.get_refs("title").await.is_err());
}

#[tokio::test]
async fn test_soft_delete_invalidates_parent() {
    let (store, registry) = setup();
    let dataset = seed_dataset(&store, "rivers", "Rivers");
    let resource_id = seed_resource(&store, dataset, "first");

    let parent = registry.lookup(EntityKind::Dataset, dataset);
    parent.ensure_loaded().await.unwrap();
    let resource = registry.lookup(EntityKind::Resource, resource_id);

    resource.delete(false).await.unwrap();

    assert_eq!(resource.state(), ProxyState::Empty);
    assert_eq!(parent.state(), ProxyState::Empty);
    assert_eq!(resource.get("state").await.unwrap(), json!("deleted"));
}

#[tokio::test]
async fn test_purge_moves_to_error() {
    let (store, registry) = setup();
    let dataset = seed_dataset(&store, "rivers", "Rivers");
    let resource_id = seed_resource(&store, dataset, "first");

    let parent = registry.lookup(EntityKind::Dataset, dataset);
    parent.ensure_loaded().await.unwrap();
    let resource = registry.lookup(EntityKind::Resource, resource_id);

    resource.delete(true).await.unwrap();

    assert_eq!(resource.state(), ProxyState::Error);
    assert!(store.get(EntityKind::Resource, resource_id).is_none());
    assert_eq!(parent.state(), ProxyState::Empty);
    assert!(parent.get_refs("resources").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_keeps_dirty_parent() {
    let (store, registry) = setup();
    let dataset = seed_dataset(&store, "rivers", "Rivers");
    let resource_id = seed_resource(&store, dataset, "first");

    let parent = registry.lookup(EntityKind::Dataset, dataset);
    parent.set("title", "Streams").await.unwrap();

    registry
        .lookup(EntityKind::Resource, resource_id)
        .delete(false)
        .await
        .unwrap();
    assert_eq!(parent.state(), ProxyState::Dirty);
}

// ============================================================================
// Deferred sync
// ============================================================================

#[tokio::test]
async fn test_deferred_commit_syncs_touched_records() {
    let store = Arc::new(MemoryEntityStore::new());
    let registry = Registry::with_autosync(store.clone(), true);
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    let b = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "beta", "Beta"));

    let scope = registry.deferred_sync();
    assert!(registry.in_deferred_scope());
    a.set("title", "A").await.unwrap();
    b.set("title", "B").await.unwrap();
    assert_eq!(store.calls().update, 0);
    assert_eq!(a.state(), ProxyState::Dirty);

    scope.commit().await.unwrap();

    assert!(!registry.in_deferred_scope());
    assert_eq!(store.calls().update, 2);
    assert_eq!(a.state(), ProxyState::Clean);
    assert_eq!(b.state(), ProxyState::Clean);
}

#[tokio::test]
async fn test_deferred_drop_restores_records() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    let b = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "beta", "Beta"));
    a.ensure_loaded().await.unwrap();

    {
        let _scope = registry.deferred_sync();
        a.set("title", "A").await.unwrap();
        b.set("title", "B").await.unwrap();
    }

    assert!(!registry.in_deferred_scope());
    assert_eq!(a.state(), ProxyState::Clean);
    assert_eq!(a.peek("title"), Some(json!("Alpha")));
    assert_eq!(b.state(), ProxyState::Empty);
    assert_eq!(b.peek("title"), None);
    assert_eq!(store.calls().update, 0);
}

#[tokio::test]
async fn test_dropped_scope_returns_unloaded_record_to_empty() {
    let (store, registry) = setup();
    let proxy = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    assert_eq!(proxy.state(), ProxyState::Empty);

    {
        let _scope = registry.deferred_sync();
        proxy.set("title", "A").await.unwrap();
        assert_eq!(proxy.state(), ProxyState::Dirty);
    }

    assert_eq!(proxy.state(), ProxyState::Empty);
    assert!(proxy.entry.record.lock().attributes.is_empty());
    assert!(proxy.changed().is_empty());
    assert_eq!(store.calls().fetch, 1);

    assert_eq!(proxy.get("title").await.unwrap(), json!("Alpha"));
    assert_eq!(store.calls().fetch, 2);
}

#[tokio::test]
async fn test_failed_commit_returns_unloaded_record_to_empty() {
    let (store, registry) = setup();
    let proxy = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));

    let scope = registry.deferred_sync();
    proxy.set("title", "A").await.unwrap();
    store.fail_next_for(StoreOp::Update, proxy.id(), Error::operation("update", "boom"));

    assert!(matches!(
        scope.commit().await,
        Err(Error::Transaction { .. })
    ));
    assert_eq!(proxy.state(), ProxyState::Empty);
    assert!(proxy.entry.record.lock().attributes.is_empty());
    assert!(proxy.changed().is_empty());
}

#[tokio::test]
async fn test_scope_drop_keeps_missing_entity_in_error() {
    let (_store, registry) = setup();
    let proxy = registry.lookup(EntityKind::Dataset, EntityId::new());

    {
        let _scope = registry.deferred_sync();
        assert!(matches!(
            proxy.set("title", "A").await,
            Err(Error::NotFound { .. })
        ));
    }

    assert_eq!(proxy.state(), ProxyState::Error);
}

#[tokio::test]
async fn test_stale_guard_leaves_later_scope_alone() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    a.ensure_loaded().await.unwrap();

    let outer = registry.deferred_sync();
    let inner = registry.deferred_sync();
    outer.rollback();
    assert!(!registry.in_deferred_scope());

    let first = registry.deferred_sync();
    let second = registry.deferred_sync();
    assert_eq!(second.depth(), inner.depth());
    a.set("title", "A").await.unwrap();

    drop(inner);
    assert_eq!(a.state(), ProxyState::Dirty);
    assert_eq!(a.peek("title"), Some(json!("A")));

    second.commit().await.unwrap();
    first.commit().await.unwrap();
    assert_eq!(a.state(), ProxyState::Clean);
    assert_eq!(store.calls().update, 1);
}

#[tokio::test]
async fn test_rollback_restores_earlier_edits() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    a.set("title", "Before scope").await.unwrap();

    let scope = registry.deferred_sync();
    a.set("title", "Inside scope").await.unwrap();
    a.set("notes", "also inside").await.unwrap();
    scope.rollback();

    assert_eq!(a.state(), ProxyState::Dirty);
    assert_eq!(a.peek("title"), Some(json!("Before scope")));
    assert_eq!(a.peek("notes"), None);
    assert_eq!(a.changed(), entity(json!({"title": "Alpha"})));
}

#[tokio::test]
async fn test_nested_scopes_sync_at_outermost_commit() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    let b = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "beta", "Beta"));

    let outer = registry.deferred_sync();
    a.set("title", "A").await.unwrap();

    let inner = registry.deferred_sync();
    assert_eq!(inner.depth(), 2);
    b.set("title", "B").await.unwrap();
    inner.commit().await.unwrap();

    assert_eq!(store.calls().update, 0);
    assert!(registry.in_deferred_scope());

    outer.commit().await.unwrap();
    assert_eq!(store.calls().update, 2);
    assert_eq!(b.state(), ProxyState::Clean);
}

#[tokio::test]
async fn test_dropped_inner_scope_keeps_outer_edits() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    let b = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "beta", "Beta"));

    let outer = registry.deferred_sync();
    a.set("title", "A").await.unwrap();
    {
        let _inner = registry.deferred_sync();
        b.set("title", "B").await.unwrap();
        a.set("notes", "inner note").await.unwrap();
    }

    assert_eq!(a.peek("title"), Some(json!("A")));
    assert_eq!(a.peek("notes"), None);
    assert_eq!(b.state(), ProxyState::Empty);

    outer.commit().await.unwrap();
    assert_eq!(store.calls().update, 1);
    assert_eq!(store.get(EntityKind::Dataset, a.id()).unwrap()["title"], json!("A"));
}

#[tokio::test]
async fn test_failed_commit_reports_and_restores() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    let b = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "beta", "Beta"));
    let c = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "gamma", "Gamma"));

    let scope = registry.deferred_sync();
    a.set("title", "A").await.unwrap();
    b.set("title", "B").await.unwrap();
    c.set("title", "C").await.unwrap();
    store.fail_next_for(StoreOp::Update, b.id(), Error::operation("update", "boom"));

    let Err(Error::Transaction { failures, synced }) = scope.commit().await else {
        panic!("expected a transaction error");
    };

    assert_eq!(synced, vec![a.id()]);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, b.id());
    assert!(matches!(*failures[0].error, Error::Operation { .. }));

    assert_eq!(a.state(), ProxyState::Clean);
    assert_eq!(a.peek("title"), Some(json!("A")));
    assert_eq!(b.state(), ProxyState::Empty);
    assert_eq!(b.peek("title"), None);
    assert_eq!(c.state(), ProxyState::Empty);
    assert_eq!(c.peek("title"), None);
    assert_eq!(store.calls().update, 2);
}

#[tokio::test]
async fn test_commit_with_missing_entity_leaves_error() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    a.ensure_loaded().await.unwrap();

    let scope = registry.deferred_sync();
    a.set("title", "A").await.unwrap();
    store.remove(EntityKind::Dataset, a.id());

    assert!(matches!(
        scope.commit().await,
        Err(Error::Transaction { .. })
    ));
    assert_eq!(a.state(), ProxyState::Error);
}

// ============================================================================
// Lists and stats
// ============================================================================

#[tokio::test]
async fn test_proxy_list_access() {
    let (store, registry) = setup();
    let ids: Vec<EntityId> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|name| seed_dataset(&store, name, &name.to_uppercase()))
        .collect();
    let list = ProxyList::new(Arc::clone(&registry), EntityKind::Dataset, ids.clone());

    assert_eq!(list.len(), 3);
    assert_eq!(list.get(1).unwrap().id(), ids[1]);
    assert!(list.get(3).is_none());
    assert_eq!(store.calls().total(), 0);

    let fetched = list.fetch(2).await.unwrap();
    assert_eq!(fetched.state(), ProxyState::Clean);
    assert!(matches!(list.fetch(7).await, Err(Error::Validation { .. })));

    assert_eq!(list.slice(1..).ids(), &ids[1..]);
    assert_eq!(list.slice(..=0).ids(), &ids[..1]);
    assert!(list.slice(5..9).is_empty());
    assert_eq!(list.iter().count(), 3);
}

#[tokio::test]
async fn test_proxy_list_to_record_batch() {
    let (store, registry) = setup();
    let a = seed_dataset(&store, "alpha", "Alpha");
    let b = seed_dataset(&store, "beta", "Beta");
    let list = ProxyList::new(Arc::clone(&registry), EntityKind::Dataset, vec![a, b]);

    registry
        .lookup(EntityKind::Dataset, b)
        .set("title", "Local Beta")
        .await
        .unwrap();

    let batch = list.to_record_batch(&["name", "title"]).await.unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 2);

    let rows = crate::output::batch_to_records(&batch).unwrap();
    assert_eq!(rows[0]["name"], json!("alpha"));
    assert_eq!(rows[1]["title"], json!("Local Beta"));
    assert_eq!(store.calls().fetch, 2);
}

#[tokio::test]
async fn test_record_batch_fails_on_error_record() {
    let (store, registry) = setup();
    let a = seed_dataset(&store, "alpha", "Alpha");
    let list = ProxyList::new(
        Arc::clone(&registry),
        EntityKind::Dataset,
        vec![a, EntityId::new()],
    );

    assert!(list.to_record_batch(&[]).await.is_err());
}

#[tokio::test]
async fn test_registry_stats() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));
    let b = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "beta", "Beta"));
    let _missing = registry.lookup(EntityKind::Tool, EntityId::new());

    a.ensure_loaded().await.unwrap();
    b.set("title", "B").await.unwrap();

    let stats = registry.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_kind[&EntityKind::Dataset], 2);
    assert_eq!(stats.by_kind[&EntityKind::Tool], 1);
    assert_eq!(stats.by_state[&ProxyState::Clean], 1);
    assert_eq!(stats.by_state[&ProxyState::Dirty], 1);
    assert_eq!(stats.by_state[&ProxyState::Empty], 1);
}

#[test]
fn test_state_display_and_serde() {
    assert_eq!(ProxyState::Dirty.to_string(), "DIRTY");
    assert_eq!(serde_json::to_value(ProxyState::Error).unwrap(), json!("ERROR"));
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn test_write_then_reset_scenario() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "scenario", "t");
    let proxy = registry.lookup(EntityKind::Dataset, id);

    assert_eq!(proxy.get("title").await.unwrap(), json!("t"));
    assert_eq!(proxy.state(), ProxyState::Clean);

    proxy.set("title", "u").await.unwrap();
    assert_eq!(proxy.get("title").await.unwrap(), json!("u"));
    assert_eq!(proxy.changed(), entity(json!({"title": "t"})));
    assert_eq!(proxy.state(), ProxyState::Dirty);

    proxy.reset().unwrap();
    assert_eq!(proxy.get("title").await.unwrap(), json!("t"));
    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(store.calls().total(), 1);
}

#[tokio::test]
async fn test_nested_scopes_touching_same_record() {
    let (store, registry) = setup();
    let a = registry.lookup(EntityKind::Dataset, seed_dataset(&store, "alpha", "Alpha"));

    let outer = registry.deferred_sync();
    a.set("title", "outer").await.unwrap();
    let inner = registry.deferred_sync();
    a.set("notes", "inner").await.unwrap();
    inner.commit().await.unwrap();
    assert_eq!(store.calls().update, 0);

    outer.commit().await.unwrap();
    assert_eq!(store.calls().update, 1);
    let stored = store.get(EntityKind::Dataset, a.id()).unwrap();
    assert_eq!(stored["title"], json!("outer"));
    assert_eq!(stored["notes"], json!("inner"));
}

#[tokio::test]
async fn test_deleted_entity_lookup_scenario() {
    let (store, registry) = setup();
    let id = seed_dataset(&store, "gone", "Gone");
    store.remove(EntityKind::Dataset, id);

    let proxy = registry.lookup(EntityKind::Dataset, id);
    assert_eq!(proxy.state(), ProxyState::Empty);
    assert!(proxy.get("title").await.is_err());
    assert_eq!(proxy.state(), ProxyState::Error);
    assert!(proxy.set("title", "back").await.is_err());
    assert!(proxy.update([("title", json!("back"))]).await.is_err());
    assert_eq!(store.calls().update, 0);
}
