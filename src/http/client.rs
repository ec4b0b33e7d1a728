//! HTTP client with retry and rate limiting
//!
//! Provides the transport used by the HTTP entity store:
//! - Automatic retries with configurable backoff
//! - Rate limiting to prevent API throttling
//! - Decoding of the catalog's `{"success": ..., "result": ...}` envelope

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("catalog-proxy/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request body (JSON)
    pub body: Option<Value>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A call the API answered with `"success": false` (or a bare error status)
#[derive(Debug, Clone)]
pub struct ApiFailure {
    /// HTTP status of the response
    pub status: u16,
    /// The `error` member of the envelope, or the raw body
    pub error: Value,
}

impl ApiFailure {
    /// Human-readable message extracted from the error payload
    pub fn message(&self) -> String {
        match &self.error {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| self.error.to_string(), ToString::to_string),
            other => other.to_string(),
        }
    }
}

/// Outcome of a single round trip
enum Attempt {
    Done(Result<Response>),
    Retry { delay: Duration, error: Error },
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Send a request, retrying throttled, failing and timed-out attempts.
    ///
    /// Client errors (4xx other than 429) are returned as responses so the
    /// caller can decode the error envelope.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: &RequestConfig,
    ) -> Result<Response> {
        let full_url = self.build_url(url);
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let (delay, error) = match self.attempt(attempt, &method, &full_url, config).await {
                Attempt::Done(result) => return result,
                Attempt::Retry { delay, error } if attempt < max_retries => (delay, error),
                Attempt::Retry { error, .. } => return Err(error),
            };
            warn!(
                "{} {} failed ({}), attempt {}/{}, retrying in {:?}",
                method,
                full_url,
                error,
                attempt + 1,
                max_retries + 1,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        Err(Error::MaxRetriesExceeded { max_retries })
    }

    /// One round trip, classified as final or retryable
    async fn attempt(
        &self,
        attempt: u32,
        method: &Method,
        url: &str,
        config: &RequestConfig,
    ) -> Attempt {
        let mut req = self.client.request(method.clone(), url);
        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !config.query.is_empty() {
            req = req.query(&config.query);
        }
        if let Some(ref body) = config.body {
            req = req.json(body);
        }

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry {
                    delay: self.calculate_backoff(attempt),
                    error: Error::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    },
                }
            }
            Err(e) if e.is_connect() => {
                return Attempt::Retry {
                    delay: self.calculate_backoff(attempt),
                    error: Error::Http(e),
                }
            }
            Err(e) => return Attempt::Done(Err(Error::Http(e))),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = extract_retry_after(&response);
            return Attempt::Retry {
                delay: Duration::from_secs(retry_after),
                error: Error::RateLimited {
                    retry_after_seconds: retry_after,
                },
            };
        }

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            let error = Error::http_status(status.as_u16(), body);
            if is_retryable_status(status) {
                return Attempt::Retry {
                    delay: self.calculate_backoff(attempt),
                    error,
                };
            }
            return Attempt::Done(Err(error));
        }

        debug!("{} {} -> {}", method, url, status.as_u16());
        Attempt::Done(Ok(response))
    }

    /// Call an API endpoint and unwrap the response envelope.
    ///
    /// The outer `Result` carries transport errors; the inner one carries
    /// failures reported by the API itself.
    pub async fn api_call(
        &self,
        method: Method,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<std::result::Result<Value, ApiFailure>> {
        let operation = format!("{method} {endpoint}");
        let response = self.request(method, endpoint, &config).await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        decode_envelope(&operation, status, &text)
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff * factor
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Decode a catalog response body.
pub(crate) fn decode_envelope(
    operation: &str,
    status: u16,
    text: &str,
) -> Result<std::result::Result<Value, ApiFailure>> {
    let body: Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(_) if status >= 400 => {
            return Ok(Err(ApiFailure {
                status,
                error: Value::String(text.to_string()),
            }))
        }
        Err(_) => {
            return Err(Error::UnexpectedResponse {
                operation: operation.to_string(),
                body: text.to_string(),
            })
        }
    };

    match body.get("success").and_then(Value::as_bool) {
        Some(true) if status < 400 => Ok(Ok(body.get("result").cloned().unwrap_or(Value::Null))),
        Some(_) => Ok(Err(ApiFailure {
            status,
            error: body.get("error").cloned().unwrap_or(Value::Null),
        })),
        None if status >= 400 => Ok(Err(ApiFailure {
            status,
            error: body,
        })),
        None => Err(Error::UnexpectedResponse {
            operation: operation.to_string(),
            body: text.to_string(),
        }),
    }
}

/// Check if an HTTP status is retryable
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        429 | 500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524
    )
}

/// Extract retry-after header value
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
