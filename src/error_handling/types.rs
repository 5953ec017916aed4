//! Error type definitions.
//!
//! This module defines the request error, the initialization error and the
//! error/info categories tracked by [`RequestStats`](super::RequestStats).

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Boxed error produced by a transport implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Error returned by a logical request.
///
/// Every failure terminates the whole logical request, including any redirect
/// hops it spawned. Nothing is retried.
#[derive(Error, Debug)]
pub enum RequestError {
    /// The target URL (or a redirect `Location`) could not be parsed.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The target URL parsed but has no host or a scheme other than http/https.
    #[error("Unsupported request URL: {0}")]
    UnsupportedUrl(String),

    /// Connection, stream or timeout failure reported by the transport.
    ///
    /// The underlying error is kept unchanged and reachable through `source()`.
    #[error("{0}")]
    Transport(#[source] BoxError),

    /// The response body could not be decompressed.
    #[error("Failed to decode response body: {0}")]
    Decode(#[source] std::io::Error),

    /// The response body is not valid JSON (only raised by `as_json`).
    #[error("Failed to parse response body as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The cancellation token fired before the request settled.
    #[error("Request cancelled")]
    Cancelled,

    /// An HTTP client for a transport agent could not be built.
    #[error("HTTP client initialization error: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl RequestError {
    /// Wraps any transport-level error.
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        RequestError::Transport(error.into())
    }

    /// Returns `true` if the request was aborted through its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }

    /// Returns `true` if the transport reported that the configured timeout expired.
    pub fn is_timeout(&self) -> bool {
        match self {
            RequestError::Transport(inner) => inner
                .downcast_ref::<reqwest::Error>()
                .map(reqwest::Error::is_timeout)
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(error: reqwest::Error) -> Self {
        RequestError::Transport(Box::new(error))
    }
}

/// Types of errors that can end a logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    // URL errors
    /// Target or `Location` did not parse
    InvalidUrlError,
    /// Scheme other than http/https, or no host
    UnsupportedUrlError,
    // Transport errors
    /// The request could not be built (bad method or header)
    HttpRequestBuilderError,
    /// The per-attempt timeout expired
    HttpRequestTimeoutError,
    /// Connection refused, reset or unreachable
    HttpRequestConnectError,
    /// Failure while sending the request
    HttpRequestRequestError,
    /// Failure while reading the response body
    HttpRequestBodyError,
    /// Any other transport failure
    HttpRequestOtherError,
    // Body errors
    /// Corrupt or truncated gzip body
    DecodeError,
    /// Body was not the JSON the caller asked for
    JsonParseError,
    // Lifecycle
    /// The cancellation token fired
    Cancelled,
    /// An agent's HTTP client could not be built
    ClientBuildError,
}

/// Informational events observed while serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    /// A redirect response was followed
    HttpRedirect,
    /// A redirect response was returned as-is because the budget was spent
    RedirectBudgetExhausted,
    /// A redirect status arrived without a `Location` header
    RedirectWithoutLocation,
    /// A gzip-encoded body was decompressed
    GzipDecoded,
}
