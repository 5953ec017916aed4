//! Error handling and request statistics.
//!
//! This module provides:
//! - The [`RequestError`] returned by every logical request
//! - Error categorization into [`ErrorType`] buckets
//! - Thread-safe counters for errors and informational events

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{categorize_request_error, update_error_stats};
pub use stats::RequestStats;
pub use types::{BoxError, ErrorType, InfoType, InitializationError, RequestError};
