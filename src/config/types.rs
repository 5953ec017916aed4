//! Configuration types and CLI options.
//!
//! This module defines the process-wide request defaults, the logging enums and
//! the command-line options of the `request_service` binary.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::{DEFAULT_FOLLOW_REDIRECTS, DEFAULT_METHOD, DEFAULT_STRICT_SSL};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Process-wide request defaults.
///
/// Owned by the [`RequestService`](crate::RequestService) and snapshotted once
/// per logical request, so replacing it while a request is in flight does not
/// affect that request.
///
/// # Examples
///
/// ```
/// use request_service::RequestConfiguration;
///
/// let config = RequestConfiguration {
///     proxy_url: Some("http://proxy.internal:3128".to_string()),
///     ..Default::default()
/// };
/// assert!(config.strict_ssl);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfiguration {
    /// Proxy used for every request unless the caller supplies its own agent
    pub proxy_url: Option<String>,

    /// Verify TLS certificates when a request leaves `strict_ssl` unset
    pub strict_ssl: bool,

    /// Static value injected as a `Proxy-Authorization` header
    pub proxy_authorization: Option<String>,
}

impl Default for RequestConfiguration {
    fn default() -> Self {
        Self {
            proxy_url: None,
            strict_ssl: DEFAULT_STRICT_SSL,
            proxy_authorization: None,
        }
    }
}

/// Command-line options for the `request_service` binary.
///
/// # Examples
///
/// ```bash
/// # Simple GET
/// request_service https://example.com
///
/// # POST JSON through a proxy and pretty-print the response
/// request_service https://api.example.com/items -X POST \
///     -H 'Content-Type: application/json' --data '{"x":1}' \
///     --proxy http://proxy.internal:3128 --json
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "request_service",
    about = "Issues one HTTP(S) request, following redirects and decoding gzip bodies."
)]
pub struct Opt {
    /// Target URL
    #[arg(value_parser)]
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = DEFAULT_METHOD)]
    pub method: String,

    /// Request header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Basic-auth user name
    #[arg(long)]
    pub user: Option<String>,

    /// Basic-auth password
    #[arg(long)]
    pub password: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, value_parser = parse_millis)]
    pub timeout_ms: Option<Duration>,

    /// Maximum number of redirects to follow
    #[arg(long, default_value_t = DEFAULT_FOLLOW_REDIRECTS)]
    pub follow_redirects: u32,

    /// Proxy URL (defaults to HTTP(S)_PROXY from the environment)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Value sent as the Proxy-Authorization header
    #[arg(long)]
    pub proxy_authorization: Option<String>,

    /// Verify TLS certificates
    #[arg(long, default_value_t = DEFAULT_STRICT_SSL, action = clap::ArgAction::Set)]
    pub strict_ssl: bool,

    /// Parse the body as JSON and pretty-print it
    #[arg(long)]
    pub json: bool,

    /// Print the status line and response headers before the body
    #[arg(short, long)]
    pub include: bool,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Opt {
    /// Process-wide defaults derived from the command line.
    pub fn configuration(&self) -> RequestConfiguration {
        RequestConfiguration {
            proxy_url: self.proxy.clone(),
            strict_ssl: self.strict_ssl,
            proxy_authorization: self.proxy_authorization.clone(),
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header `{raw}` must look like `Name: value`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header `{raw}` has an empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_millis(raw: &str) -> Result<Duration, String> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| format!("invalid timeout `{raw}`: {e}"))
}
