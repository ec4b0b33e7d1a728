//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: Client → cursors and proxies → REST calls

use catalog_proxy::output::batch_to_records;
use catalog_proxy::{Client, ClientConfig, EntityId, EntityKind, Error, ProxyState, SearchQuery};
use serde_json::{json, Value};
use std::sync::Once;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn client_for(server: &MockServer) -> Client {
    init_tracing();
    let config = ClientConfig::builder(server.uri())
        .token("secret")
        .max_retries(0)
        .no_rate_limit()
        .build()
        .unwrap();
    Client::new(config).unwrap()
}

fn success(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": result}))
}

fn dataset(id: EntityId, name: &str, title: &str) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "title": title,
        "state": "active",
        "metadata_created": "2024-03-01T10:15:00.123456",
        "resources": []
    })
}

// ============================================================================
// Loading and syncing
// ============================================================================

#[tokio::test]
async fn test_load_edit_sync() {
    let server = MockServer::start().await;
    let id = EntityId::new();

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/dataset/{id}")))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(success(dataset(id, "rivers", "Rivers")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("/api/v2/dataset/{id}")))
        .and(body_json(json!({"title": "Rivers of Europe"})))
        .respond_with(success(dataset(id, "rivers", "Rivers of Europe")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let proxy = client.datasets().get(id).await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Clean);

    proxy.set("title", "Rivers of Europe").await.unwrap();
    assert_eq!(proxy.state(), ProxyState::Dirty);
    proxy.sync().await.unwrap();

    assert_eq!(proxy.state(), ProxyState::Clean);
    assert_eq!(
        proxy.get("title").await.unwrap(),
        json!("Rivers of Europe")
    );
}

#[tokio::test]
async fn test_get_by_name() {
    let server = MockServer::start().await;
    let id = EntityId::new();

    Mock::given(method("GET"))
        .and(path("/api/v2/dataset/rivers"))
        .respond_with(success(dataset(id, "rivers", "Rivers")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/dataset/{id}")))
        .respond_with(success(dataset(id, "rivers", "Rivers")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let proxy = client.datasets().get_by_name("rivers").await.unwrap();
    assert_eq!(proxy.id(), id);
    assert_eq!(proxy.name().await.unwrap().as_deref(), Some("rivers"));
}

#[tokio::test]
async fn test_missing_entity() {
    let server = MockServer::start().await;
    let id = EntityId::new();

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/tool/{id}")))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"success": false, "error": {"message": "Not found"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let proxy = client.lookup(EntityKind::Tool, id);

    assert!(matches!(proxy.get("name").await, Err(Error::NotFound { .. })));
    assert_eq!(proxy.state(), ProxyState::Error);
    assert!(matches!(
        proxy.set("title", "Cleaner").await,
        Err(Error::ErrorState { .. })
    ));
    assert!(client.tools().try_get(&id.to_string()).await.is_err());
}

#[tokio::test]
async fn test_backend_validation_keeps_edits() {
    let server = MockServer::start().await;
    let id = EntityId::new();

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/dataset/{id}")))
        .respond_with(success(dataset(id, "rivers", "Rivers")))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("/api/v2/dataset/{id}")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false,
            "error": {"__type": "Validation Error", "name": ["That URL is already in use."]}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let proxy = client.datasets().get(id).await.unwrap();
    proxy.set("name", "lakes").await.unwrap();

    let err = proxy.sync().await.unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "name"));
    assert_eq!(proxy.state(), ProxyState::Dirty);
    assert_eq!(proxy.peek("name"), Some(json!("lakes")));
}

// ============================================================================
// Deferred sync
// ============================================================================

#[tokio::test]
async fn test_deferred_sync_batches_updates() {
    let server = MockServer::start().await;
    let a = EntityId::new();
    let b = EntityId::new();

    for (id, name) in [(a, "alpha"), (b, "beta")] {
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/dataset/{id}")))
            .respond_with(success(dataset(id, name, name)))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("/api/v2/dataset/{id}")))
            .and(body_json(json!({"notes": "batched"})))
            .respond_with(success(dataset(id, name, name)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    let first = client.lookup(EntityKind::Dataset, a);
    let second = client.lookup(EntityKind::Dataset, b);

    let scope = client.deferred_sync();
    first.set("notes", "batched").await.unwrap();
    second.set("notes", "batched").await.unwrap();
    scope.commit().await.unwrap();

    assert_eq!(first.state(), ProxyState::Clean);
    assert_eq!(second.state(), ProxyState::Clean);
}

// ============================================================================
// Listing, searching, output
// ============================================================================

#[tokio::test]
async fn test_list_resolves_names() {
    let server = MockServer::start().await;
    let id = EntityId::new();

    Mock::given(method("GET"))
        .and(path("/api/v2/groups"))
        .and(query_param("limit", "1000"))
        .and(query_param("offset", "0"))
        .respond_with(success(json!(["hydro"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/group/hydro"))
        .respond_with(success(json!({"id": id.to_string(), "name": "hydro", "type": "group"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let groups = client.groups().list(None, 0).await.unwrap();
    assert_eq!(groups.ids(), &[id]);
}

#[tokio::test]
async fn test_search_to_record_batch() {
    let server = MockServer::start().await;
    let a = EntityId::new();
    let b = EntityId::new();

    Mock::given(method("POST"))
        .and(path("/api/v2/search/datasets"))
        .and(body_json(json!({"query": ["state:active"], "limit": 1000})))
        .respond_with(success(json!({
            "count": 2,
            "results": [dataset(a, "alpha", "Alpha"), dataset(b, "beta", "Beta")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .datasets()
        .search(&SearchQuery::new().term("state", "active"))
        .await
        .unwrap();
    assert_eq!(result.count, 2);

    let batch = result
        .proxies
        .to_record_batch(&["name", "title"])
        .await
        .unwrap();
    assert_eq!(batch.num_rows(), 2);

    let rows = batch_to_records(&batch).unwrap();
    assert_eq!(rows[1]["title"], json!("Beta"));
}

#[tokio::test]
async fn test_create_and_purge() {
    let server = MockServer::start().await;
    let id = EntityId::new();

    Mock::given(method("POST"))
        .and(path("/api/v2/organization"))
        .and(body_json(json!({"name": "water-board", "title": "Water Board"})))
        .respond_with(success(json!({
            "id": id.to_string(),
            "name": "water-board",
            "title": "Water Board",
            "type": "organization",
            "is_organization": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/api/v2/organizations/{id}")))
        .and(query_param("purge", "true"))
        .respond_with(success(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let attributes = json!({"name": "water-board", "title": "Water Board"});
    let org = client
        .organizations()
        .create(attributes.as_object().cloned().unwrap())
        .await
        .unwrap();
    assert_eq!(org.id(), id);
    assert_eq!(org.state(), ProxyState::Clean);

    org.delete(true).await.unwrap();
    assert_eq!(org.state(), ProxyState::Error);
}

#[tokio::test]
async fn test_create_with_unadoptable_response() {
    let server = MockServer::start().await;
    let id = EntityId::new();

    Mock::given(method("POST"))
        .and(path("/api/v2/organization"))
        .respond_with(success(json!({
            "id": id.to_string(),
            "name": "water-board",
            "title": "Water Board",
            "is_organization": "yes"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let attributes = json!({"name": "water-board", "title": "Water Board"});
    let result = client
        .organizations()
        .create(attributes.as_object().cloned().unwrap())
        .await;

    assert!(matches!(result, Err(Error::Validation { .. })));
    assert!(client
        .registry()
        .existing(EntityKind::Organization, id)
        .is_none());
}
