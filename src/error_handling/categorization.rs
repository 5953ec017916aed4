//! Error categorization.
//!
//! Maps [`RequestError`]s onto the [`ErrorType`] buckets counted by
//! [`RequestStats`](super::RequestStats).

use super::stats::RequestStats;
use super::types::{ErrorType, RequestError};

/// Categorizes a `reqwest::Error` into an `ErrorType`.
///
/// Redirects are never followed by reqwest itself and status codes never turn
/// into errors here, so only the transport-level predicates matter.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> ErrorType {
    if error.is_builder() {
        ErrorType::HttpRequestBuilderError
    } else if error.is_timeout() {
        ErrorType::HttpRequestTimeoutError
    } else if error.is_connect() {
        ErrorType::HttpRequestConnectError
    } else if error.is_request() {
        ErrorType::HttpRequestRequestError
    } else if error.is_body() || error.is_decode() {
        ErrorType::HttpRequestBodyError
    } else {
        ErrorType::HttpRequestOtherError
    }
}

/// Categorizes a `RequestError` into an `ErrorType`.
///
/// Transport errors coming from injected transports are inspected for a
/// `reqwest::Error` or `std::io::Error` anywhere in their source chain.
pub fn categorize_request_error(error: &RequestError) -> ErrorType {
    match error {
        RequestError::InvalidUrl(_) => ErrorType::InvalidUrlError,
        RequestError::UnsupportedUrl(_) => ErrorType::UnsupportedUrlError,
        RequestError::Decode(_) => ErrorType::DecodeError,
        RequestError::Json(_) => ErrorType::JsonParseError,
        RequestError::Cancelled => ErrorType::Cancelled,
        RequestError::ClientBuild(_) => ErrorType::ClientBuildError,
        RequestError::Transport(inner) => {
            let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(&**inner);
            while let Some(err) = cause {
                if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>() {
                    return categorize_reqwest_error(reqwest_err);
                }
                if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
                    return categorize_io_error(io_err);
                }
                cause = err.source();
            }
            ErrorType::HttpRequestOtherError
        }
    }
}

fn categorize_io_error(error: &std::io::Error) -> ErrorType {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::TimedOut => ErrorType::HttpRequestTimeoutError,
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            ErrorType::HttpRequestConnectError
        }
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe => ErrorType::HttpRequestBodyError,
        _ => ErrorType::HttpRequestOtherError,
    }
}

/// Records a failed logical request in `stats`.
pub fn update_error_stats(stats: &RequestStats, error: &RequestError) {
    let error_type = categorize_request_error(error);
    stats.increment_error(error_type);
}
