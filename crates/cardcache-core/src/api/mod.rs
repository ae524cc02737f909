//! Outbound HTTP for the card cache.
//!
//! This module provides the `ApiClient` transport used for both card
//! queries and image downloads, the `ApiError` taxonomy, and the shared
//! retry policy applied to every outbound call.

pub mod client;
pub mod error;
pub mod retry;

pub use client::{ApiClient, ImageFetcher, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
pub use retry::{sleep_or_cancel, with_retry, IsRetryable, RetryPolicy};
