//! Transport selection and the built-in HTTP/HTTPS transports.
//!
//! A [`Transport`] performs one raw round trip: it sends a [`RawRequest`] and
//! resolves once response headers arrive, handing back the body as a stream of
//! chunks. Redirects, proxies and decompression are not its concern.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::Url;

use crate::error_handling::RequestError;
use crate::proxy::ProxyAgent;
use crate::request::options::{Headers, RequestOptions};

/// Response body as delivered by the network, chunk by chunk.
pub type BodyStream = BoxStream<'static, Result<Bytes, RequestError>>;

/// Connection parameters for one attempt.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// `http` or `https`
    pub scheme: String,
    /// Host name or IP literal
    pub hostname: String,
    /// Explicit or scheme-default port
    pub port: u16,
    /// Path plus query string
    pub path: String,
    /// HTTP method
    pub method: String,
    /// Request headers, as resolved
    pub headers: Headers,
    /// Connection pool to use; the transport's direct agent when unset
    pub agent: Option<Arc<ProxyAgent>>,
    /// Verify the server certificate
    pub reject_unauthorized: bool,
    /// `user:password` for basic auth
    pub auth: Option<String>,
    /// Request body
    pub body: Option<Bytes>,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
}

impl RawRequest {
    /// Absolute URL addressed by these parameters.
    pub fn url(&self) -> Result<Url, RequestError> {
        let url = Url::parse(&format!(
            "{}://{}:{}{}",
            self.scheme, self.hostname, self.port, self.path
        ))?;
        Ok(url)
    }

    /// Splits `auth` at the first colon.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.auth.as_deref().and_then(|auth| auth.split_once(':'))
    }
}

/// Response head plus the still-unread body.
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Lower-case names; repeated headers joined with `", "`
    pub headers: Headers,
    /// Body chunks in arrival order
    pub body: BodyStream,
}

impl RawResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Performs one raw request.
///
/// Dropping the returned future, or the body stream of its response, aborts
/// the underlying connection.
pub trait Transport: Send + Sync {
    /// Sends `request`, resolving once the response head has arrived.
    fn send(&self, request: RawRequest) -> BoxFuture<'static, Result<RawResponse, RequestError>>;
}

/// Transport for plain `http` targets.
#[derive(Debug, Clone)]
pub struct PlainTransport {
    direct: Arc<ProxyAgent>,
}

/// Transport for secure `https` targets; honours `reject_unauthorized`.
#[derive(Debug, Clone)]
pub struct SecureTransport {
    direct: Arc<ProxyAgent>,
}

impl PlainTransport {
    /// `direct` serves requests that carry no agent of their own.
    pub fn new(direct: Arc<ProxyAgent>) -> Self {
        PlainTransport { direct }
    }
}

impl SecureTransport {
    /// `direct` serves requests that carry no agent of their own.
    pub fn new(direct: Arc<ProxyAgent>) -> Self {
        SecureTransport { direct }
    }
}

impl Transport for PlainTransport {
    fn send(&self, request: RawRequest) -> BoxFuture<'static, Result<RawResponse, RequestError>> {
        let agent = request.agent.clone().unwrap_or_else(|| Arc::clone(&self.direct));
        Box::pin(async move {
            if request.scheme != "http" {
                return Err(RequestError::UnsupportedUrl(format!(
                    "plain transport cannot serve scheme '{}'",
                    request.scheme
                )));
            }
            // Certificate checks only concern TLS targets
            send_with_agent(&agent, request, true).await
        })
    }
}

impl Transport for SecureTransport {
    fn send(&self, request: RawRequest) -> BoxFuture<'static, Result<RawResponse, RequestError>> {
        let agent = request.agent.clone().unwrap_or_else(|| Arc::clone(&self.direct));
        Box::pin(async move {
            if request.scheme != "https" {
                return Err(RequestError::UnsupportedUrl(format!(
                    "secure transport cannot serve scheme '{}'",
                    request.scheme
                )));
            }
            let verify_tls = request.reject_unauthorized;
            send_with_agent(&agent, request, verify_tls).await
        })
    }
}

async fn send_with_agent(
    agent: &ProxyAgent,
    request: RawRequest,
    verify_tls: bool,
) -> Result<RawResponse, RequestError> {
    let client = agent.client(verify_tls)?;
    let url = request.url()?;
    let method =
        reqwest::Method::from_bytes(request.method.as_bytes()).map_err(RequestError::transport)?;

    let mut builder = client.request(method, url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some((user, password)) = request.credentials() {
        builder = builder.basic_auth(user, Some(password));
    }
    if let Some(timeout) = request.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers = collect_headers(response.headers());

    let body = stream::try_unfold(response, |mut response| async move {
        let chunk = response.chunk().await?;
        Ok::<_, reqwest::Error>(chunk.map(|chunk| (chunk, response)))
    })
    .map_err(RequestError::from)
    .boxed();

    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

/// Flattens a `HeaderMap`, joining repeated headers with `", "`.
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}

/// Strategy for picking the transport of an attempt.
///
/// A caller factory on the options takes precedence unconditionally; otherwise
/// `https` targets get the secure transport and `http` targets the plain one.
#[derive(Clone)]
pub struct TransportProvider {
    plain: Arc<dyn Transport>,
    secure: Arc<dyn Transport>,
}

impl TransportProvider {
    /// Built-in transports sharing one direct agent.
    pub fn new() -> Self {
        let direct = Arc::new(ProxyAgent::direct());
        TransportProvider {
            plain: Arc::new(PlainTransport::new(Arc::clone(&direct))),
            secure: Arc::new(SecureTransport::new(direct)),
        }
    }

    /// Custom plain and secure transports.
    pub fn with_transports(plain: Arc<dyn Transport>, secure: Arc<dyn Transport>) -> Self {
        TransportProvider { plain, secure }
    }

    /// Returns the transport for `options`.
    ///
    /// # Errors
    ///
    /// `InvalidUrl` if the target does not parse, `UnsupportedUrl` if it is
    /// neither `http` nor `https` or names no host. Neither is checked when a
    /// caller factory is set.
    pub fn select(&self, options: &RequestOptions) -> Result<Arc<dyn Transport>, RequestError> {
        if let Some(factory) = &options.raw_request {
            return Ok(factory(options));
        }

        let endpoint = Url::parse(&options.url)?;
        let transport = match endpoint.scheme() {
            "https" => &self.secure,
            "http" => &self.plain,
            other => {
                return Err(RequestError::UnsupportedUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, options.url
                )))
            }
        };
        if endpoint.host_str().map_or(true, str::is_empty) {
            return Err(RequestError::UnsupportedUrl(format!(
                "no host in {}",
                options.url
            )));
        }
        Ok(Arc::clone(transport))
    }
}

impl Default for TransportProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransportProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportProvider").finish_non_exhaustive()
    }
}
