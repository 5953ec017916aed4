//! Application configuration and constants.
//!
//! This module provides:
//! - Request defaults (redirect budget, ports, header names)
//! - Process-wide request configuration
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{LogFormat, LogLevel, Opt, RequestConfiguration};
