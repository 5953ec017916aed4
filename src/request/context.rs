//! The terminal, fully-materialized result of a logical request.

use std::io::Cursor;

use bytes::Bytes;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::error_handling::RequestError;
use crate::request::options::Headers;

/// Response metadata, copied verbatim from the terminal response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    /// HTTP status code
    pub status_code: u16,
    /// Lower-case header names; repeated headers joined with `", "`
    pub headers: Headers,
}

/// Outcome of a successful logical request.
///
/// All views share one fully-drained, already-decompressed body; none of them
/// touches the network again, so each may be called any number of times.
///
/// # Examples
///
/// ```no_run
/// use request_service::{RequestConfiguration, RequestOptions, RequestService};
///
/// # async fn example() -> Result<(), request_service::RequestError> {
/// let service = RequestService::new(RequestConfiguration::default());
/// let context = service.send(&RequestOptions::new("https://example.com/data.json")).await?;
///
/// println!("{} {}", context.status(), context.as_text());
/// let value: serde_json::Value = context.as_json()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    url: Url,
    res: ResponseInfo,
    body: Bytes,
    text: String,
}

impl RequestContext {
    pub(crate) fn new(url: Url, status_code: u16, headers: Headers, body: Bytes) -> Self {
        let text = String::from_utf8_lossy(&body).into_owned();
        RequestContext {
            url,
            res: ResponseInfo {
                status_code,
                headers,
            },
            body,
            text,
        }
    }

    /// Status code and headers of the terminal response.
    pub fn res(&self) -> &ResponseInfo {
        &self.res
    }

    /// HTTP status code of the terminal response.
    pub fn status(&self) -> u16 {
        self.res.status_code
    }

    /// Response headers, as received.
    pub fn headers(&self) -> &Headers {
        &self.res.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.res
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// URL of the attempt that produced this response (after redirects).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// A fresh reader over the decoded body.
    ///
    /// `Cursor<Bytes>` implements both `std::io::Read` and `tokio::io::AsyncRead`.
    pub fn as_stream(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }

    /// The decoded body.
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8 text; invalid sequences are replaced with U+FFFD.
    pub fn as_text(&self) -> &str {
        &self.text
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// `RequestError::Json` if the body is not valid JSON for `T`. Nothing is
    /// parsed until this is called.
    pub fn as_json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
