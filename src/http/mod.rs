//! HTTP client module
//!
//! Provides the HTTP client used to reach the catalog API, with retry,
//! rate limiting, and backoff strategies.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Envelope Decoding**: `{"success", "result" | "error"}` responses

mod client;
mod rate_limit;

pub use client::{ApiFailure, HttpClient, HttpClientConfig, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
