//! Error types for the catalog proxy client
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use crate::types::{EntityId, EntityKind};
use thiserror::Error;

/// A single failed sync inside a deferred-sync commit
#[derive(Debug)]
pub struct SyncFailure {
    /// Kind of the record whose sync failed
    pub kind: EntityKind,
    /// Id of the record whose sync failed
    pub id: EntityId,
    /// The underlying error
    pub error: Box<Error>,
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.id, self.error)
    }
}

/// The main error type for the catalog proxy client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Proxy Errors
    // ============================================================================
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Field '{field}' of {kind} cannot be modified")]
    Immutable { kind: EntityKind, field: String },

    #[error("{kind} {id} is in ERROR state")]
    ErrorState { kind: EntityKind, id: EntityId },

    #[error("Cannot invalidate {kind} {id}: it has unsynced changes")]
    Invalidation { kind: EntityKind, id: EntityId },

    #[error("Conflict on {kind} {id}: {message}")]
    Conflict {
        kind: EntityKind,
        id: EntityId,
        message: String,
    },

    #[error("Deferred sync failed for {} record(s), updates reset", failures.len())]
    Transaction {
        failures: Vec<SyncFailure>,
        synced: Vec<EntityId>,
    },

    #[error("Unknown field '{field}' for {kind}")]
    UnknownField { kind: EntityKind, field: String },

    #[error("Malformed {kind} entity: {message}")]
    Entity { kind: EntityKind, message: String },

    // ============================================================================
    // Backend Errors
    // ============================================================================
    #[error("{operation} failed: {message}")]
    Operation { operation: String, message: String },

    #[error("Unexpected response from {operation}: {body}")]
    UnexpectedResponse { operation: String, body: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Invalid tag specification: {0}")]
    TagSpec(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a not-found error
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an immutability error
    pub fn immutable(kind: EntityKind, field: impl Into<String>) -> Self {
        Self::Immutable {
            kind,
            field: field.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an operation error
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Check if this error means the remote entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the catalog proxy client
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
