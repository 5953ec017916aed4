//! request_service library: cancellable, proxy-aware HTTP/HTTPS requests
//!
//! One call to [`RequestService::request`] is one *logical request*: options are
//! merged with process-wide defaults and a proxy agent, redirects are followed
//! up to a budget (3 by default), gzip bodies are decoded, and the result is a
//! [`RequestContext`] offering the body as a stream, as text, or as JSON.
//!
//! # Example
//!
//! ```no_run
//! use request_service::{RequestConfiguration, RequestOptions, RequestService};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = RequestService::new(RequestConfiguration {
//!     proxy_url: Some("http://proxy.internal:3128".to_string()),
//!     ..Default::default()
//! });
//!
//! let token = CancellationToken::new();
//! let options = RequestOptions::new("https://example.com/api/items")
//!     .header("Accept", "application/json");
//!
//! let context = service.request(&options, &token).await?;
//! let items: serde_json::Value = context.as_json()?;
//! println!("{} -> {}", context.status(), items);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod config;
mod error_handling;
pub mod initialization;
pub mod proxy;
mod request;

// Re-export public API
pub use config::{LogFormat, LogLevel, RequestConfiguration};
pub use error_handling::{
    categorize_request_error, BoxError, ErrorType, InfoType, InitializationError, RequestError,
    RequestStats,
};
pub use proxy::{EnvProxyResolver, ProxyAgent, ProxyAgentResolver, ProxySettings};
pub use request::{
    resolve_options, BodyStream, Headers, PlainTransport, RawRequest, RawRequestFactory,
    RawResponse, RequestContext, RequestOptions, RequestService, ResponseInfo, SecureTransport,
    Transport, TransportProvider,
};
