//! Initialization of shared resources.
//!
//! This module provides functions to initialize:
//! - The logger (plain or JSON output)
//! - HTTP clients backing transport agents

mod client;
mod logger;

pub use client::init_agent_client;
pub use logger::init_logger_with;
