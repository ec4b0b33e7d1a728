//! Entity store over the catalog REST API

use super::{EntityStore, SearchPage, SearchQuery};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{ApiFailure, HttpClient, RequestConfig};
use crate::types::{Entity, EntityId, EntityKind, JsonValue};
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

/// Entity store backed by the `v2` REST endpoints under `<base_url>/api/`
#[derive(Debug)]
pub struct HttpEntityStore {
    client: HttpClient,
}

impl HttpEntityStore {
    /// Wrap an HTTP client whose base URL points at the API root
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build the store from a client config
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(HttpClient::with_config(
            config.http_client_config(),
        )?))
    }

    async fn call(
        &self,
        kind: EntityKind,
        target: &str,
        method: Method,
        endpoint: &str,
        request: RequestConfig,
    ) -> Result<JsonValue> {
        let operation = format!("{method} {endpoint}");
        debug!("{}", operation);

        match self.client.api_call(method, endpoint, request).await? {
            Ok(result) => Ok(result),
            Err(failure) => Err(failure_to_error(kind, target, &operation, &failure)),
        }
    }

    async fn call_entity(
        &self,
        kind: EntityKind,
        target: &str,
        method: Method,
        endpoint: &str,
        request: RequestConfig,
    ) -> Result<Entity> {
        match self.call(kind, target, method.clone(), endpoint, request).await? {
            JsonValue::Object(entity) => Ok(entity),
            other => Err(Error::UnexpectedResponse {
                operation: format!("{method} {endpoint}"),
                body: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl EntityStore for HttpEntityStore {
    async fn fetch(&self, kind: EntityKind, id: EntityId) -> Result<Entity> {
        let endpoint = format!("v2/{}/{}", kind.model_name(), id);
        self.call_entity(kind, &id.to_string(), Method::GET, &endpoint, RequestConfig::new())
            .await
    }

    async fn create(&self, kind: EntityKind, entity: Entity) -> Result<Entity> {
        let endpoint = format!("v2/{}", kind.model_name());
        let request = RequestConfig::new().json(JsonValue::Object(entity));
        self.call_entity(kind, "(new)", Method::POST, &endpoint, request)
            .await
    }

    async fn update(&self, kind: EntityKind, id: EntityId, changes: Entity) -> Result<Entity> {
        let endpoint = format!("v2/{}/{}", kind.model_name(), id);
        let request = RequestConfig::new().json(JsonValue::Object(changes));
        self.call_entity(kind, &id.to_string(), Method::PATCH, &endpoint, request)
            .await
    }

    async fn delete(&self, kind: EntityKind, id: EntityId, purge: bool) -> Result<()> {
        let (endpoint, request) = if purge {
            (
                format!("v2/{}/{}", kind.collection_name(), id),
                RequestConfig::new().query("purge", true),
            )
        } else {
            (
                format!("v2/{}/{}", kind.model_name(), id),
                RequestConfig::new(),
            )
        };
        self.call(kind, &id.to_string(), Method::DELETE, &endpoint, request)
            .await?;
        Ok(())
    }

    async fn resolve_name(&self, kind: EntityKind, name: &str) -> Result<EntityId> {
        let endpoint = format!("v2/{}/{}", kind.model_name(), name);
        let entity = self
            .call_entity(kind, name, Method::GET, &endpoint, RequestConfig::new())
            .await?;
        kind.entity_id(&entity)
    }

    async fn search(&self, kind: EntityKind, query: &SearchQuery) -> Result<SearchPage> {
        let endpoint = format!("v2/search/{}", kind.collection_name());
        let request = RequestConfig::new().json(serde_json::to_value(query)?);
        let result = self
            .call(kind, "(search)", Method::POST, &endpoint, request)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn list(&self, kind: EntityKind, limit: usize, offset: usize) -> Result<Vec<String>> {
        let endpoint = format!("v2/{}", kind.collection_name());
        let request = RequestConfig::new()
            .query("limit", limit)
            .query("offset", offset);
        let result = self
            .call(kind, "(list)", Method::GET, &endpoint, request)
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// Map an API-reported failure onto the crate error taxonomy
fn failure_to_error(kind: EntityKind, target: &str, operation: &str, failure: &ApiFailure) -> Error {
    match failure.status {
        404 => Error::not_found(kind, target),
        400 | 409 | 422 => Error::validation(failure_field(&failure.error), failure.message()),
        _ => Error::operation(operation, failure.message()),
    }
}

/// The offending field of a validation error payload, if it names one
fn failure_field(error: &JsonValue) -> String {
    error
        .as_object()
        .and_then(|map| {
            map.keys()
                .find(|key| !key.starts_with("__") && key.as_str() != "message")
                .cloned()
        })
        .unwrap_or_else(|| "entity".to_string())
}
