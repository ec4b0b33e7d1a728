//! Client configuration
//!
//! `ClientConfig` gathers everything needed to talk to a catalog
//! deployment. It deserializes with defaults for every optional field, so it
//! can be embedded in an application's own configuration.

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

// ============================================================================
// Top-Level Client Config
// ============================================================================

/// Configuration for a catalog client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the deployment (the API lives under `<base_url>/api/`)
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Proxy behavior
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl ClientConfig {
    /// Create a config for the given base URL with defaults elsewhere
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            http: HttpConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }

    /// Create a new config builder
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(base_url),
        }
    }

    /// Check the config for values that cannot work
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.proxy.max_fetch == 0 {
            return Err(Error::config("proxy.max_fetch must be positive"));
        }
        if self.proxy.page_size == 0 {
            return Err(Error::config("proxy.page_size must be positive"));
        }
        Ok(())
    }

    /// The API root URL (`<base_url>/api/`)
    pub fn api_url(&self) -> String {
        format!("{}/api/", self.base_url.trim_end_matches('/'))
    }

    /// Build the HTTP client configuration from this config
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.api_url())
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .max_retries(self.http.max_retries)
            .backoff(
                self.http.retry_backoff.backoff_type,
                Duration::from_millis(self.http.retry_backoff.initial_ms),
                Duration::from_millis(self.http.retry_backoff.max_ms),
            );

        builder = match &self.http.rate_limit {
            Some(limit) => builder.rate_limit(RateLimiterConfig::new(
                limit.requests_per_second,
                limit.burst,
            )),
            None => builder.no_rate_limit(),
        };

        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        builder.build()
    }
}

/// Builder for client config
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Set the request timeout in seconds
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.http.timeout_seconds = seconds;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.http.max_retries = retries;
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.http.rate_limit = None;
        self
    }

    /// Enable or disable auto-sync of proxy writes
    pub fn autosync(mut self, enabled: bool) -> Self {
        self.config.proxy.autosync = enabled;
        self
    }

    /// Set the list/search cut-off
    pub fn max_fetch(mut self, max_fetch: usize) -> Self {
        self.config.proxy.max_fetch = max_fetch;
        self
    }

    /// Build the config, validating it
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Rate limiting configuration (`None` disables it)
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffConfig::default(),
            rate_limit: default_rate_limit(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit() -> Option<RateLimitConfig> {
    Some(RateLimitConfig::default())
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    10_000
}

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    /// Burst size
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
            burst: default_burst(),
        }
    }
}

fn default_rps() -> u32 {
    20
}

fn default_burst() -> u32 {
    20
}

// ============================================================================
// Proxy Config
// ============================================================================

/// Proxy behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Sync every write immediately (outside deferred scopes)
    #[serde(default)]
    pub autosync: bool,

    /// Upper bound on entities returned by one list/search call
    #[serde(default = "default_max_fetch")]
    pub max_fetch: usize,

    /// Page size used when fetching all search results
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            autosync: false,
            max_fetch: default_max_fetch(),
            page_size: default_page_size(),
        }
    }
}

fn default_max_fetch() -> usize {
    1000
}

fn default_page_size() -> usize {
    100
}
