//! Request options and option resolution.
//!
//! [`RequestOptions`] describes one logical request. [`resolve_options`] merges
//! it with the process-wide [`RequestConfiguration`] and a proxy agent before
//! the first attempt.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RequestConfiguration, DEFAULT_FOLLOW_REDIRECTS, HEADER_PROXY_AUTHORIZATION};
use crate::proxy::{ProxyAgent, ProxyAgentResolver, ProxySettings};
use crate::request::transport::Transport;

/// Header name to value. Names keep the case the caller gave them.
pub type Headers = HashMap<String, String>;

/// Caller-supplied factory returning the transport for one attempt.
///
/// When set, it replaces scheme-based transport selection entirely.
pub type RawRequestFactory = Arc<dyn Fn(&RequestOptions) -> Arc<dyn Transport> + Send + Sync>;

/// Describes one logical request.
///
/// Treated as an immutable value: resolution and every redirect hop produce a
/// new `RequestOptions`, the caller's value is never modified.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use request_service::RequestOptions;
///
/// let options = RequestOptions::new("https://example.com/api")
///     .method("POST")
///     .header("Content-Type", "application/json")
///     .data(r#"{"x":1}"#)
///     .timeout(Duration::from_secs(5))
///     .follow_redirects(1);
/// assert_eq!(options.redirect_budget(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// HTTP method; `GET` when unset
    pub method: Option<String>,
    /// Target URL
    pub url: String,
    /// Basic-auth user; only used together with `password`
    pub user: Option<String>,
    /// Basic-auth password; only used together with `user`
    pub password: Option<String>,
    /// Request headers
    pub headers: Headers,
    /// Connection timeout; unset means no timeout
    pub timeout: Option<Duration>,
    /// Request body
    pub data: Option<String>,
    /// Remaining redirect budget; 3 when unset
    pub follow_redirects: Option<u32>,
    /// Per-request `Proxy-Authorization` value, overriding the process-wide one
    pub proxy_authorization: Option<String>,
    /// Transport agent; resolved from the proxy settings when unset
    pub agent: Option<Arc<ProxyAgent>>,
    /// Verify TLS certificates; the process-wide default when unset
    pub strict_ssl: Option<bool>,
    /// Transport override, see [`RawRequestFactory`]
    pub raw_request: Option<RawRequestFactory>,
}

impl RequestOptions {
    /// Options for a `GET` of `url` with every other field unset.
    pub fn new(url: impl Into<String>) -> Self {
        RequestOptions {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the HTTP method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Adds a request header, replacing an earlier one with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets basic-auth credentials. Both must be non-empty to be sent.
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the request body, sent again on every redirect hop.
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the redirect budget; `0` returns the first response as-is.
    pub fn follow_redirects(mut self, follow_redirects: u32) -> Self {
        self.follow_redirects = Some(follow_redirects);
        self
    }

    /// Sets a `Proxy-Authorization` value for this request only.
    pub fn proxy_authorization(mut self, value: impl Into<String>) -> Self {
        self.proxy_authorization = Some(value.into());
        self
    }

    /// Uses `agent` instead of asking the proxy resolver.
    pub fn agent(mut self, agent: Arc<ProxyAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Overrides the process-wide certificate-verification default.
    pub fn strict_ssl(mut self, strict_ssl: bool) -> Self {
        self.strict_ssl = Some(strict_ssl);
        self
    }

    /// Installs a transport factory that bypasses scheme-based selection.
    pub fn raw_request<F>(mut self, factory: F) -> Self
    where
        F: Fn(&RequestOptions) -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        self.raw_request = Some(Arc::new(factory));
        self
    }

    /// Remaining redirect budget, with the default applied.
    pub fn redirect_budget(&self) -> u32 {
        self.follow_redirects.unwrap_or(DEFAULT_FOLLOW_REDIRECTS)
    }

    /// Options for the next hop: same fields, new target, one redirect fewer.
    pub(crate) fn redirected(&self, url: String) -> Self {
        RequestOptions {
            url,
            follow_redirects: Some(self.redirect_budget().saturating_sub(1)),
            ..self.clone()
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("data", &self.data.as_ref().map(String::len))
            .field("follow_redirects", &self.follow_redirects)
            .field("agent", &self.agent)
            .field("strict_ssl", &self.strict_ssl)
            .field("raw_request", &self.raw_request.is_some())
            .finish()
    }
}

/// Produces options ready for transport.
///
/// Rules, in order:
/// 1. Without a caller agent, ask `resolver` for one using the target URL, the
///    environment and the configured proxy URL / strict-SSL default.
/// 2. Without a caller `strict_ssl`, use the configured default.
/// 3. With a `Proxy-Authorization` value (the per-request override, else the
///    configured one), merge it into the headers, keeping every other header.
///
/// Pure data transformation: the returned value is new, `options` is untouched.
pub fn resolve_options(
    options: &RequestOptions,
    config: &RequestConfiguration,
    resolver: &dyn ProxyAgentResolver,
    env: &HashMap<String, String>,
) -> RequestOptions {
    let mut resolved = options.clone();

    if resolved.agent.is_none() {
        let settings = ProxySettings {
            proxy_url: config.proxy_url.clone(),
            strict_ssl: config.strict_ssl,
        };
        resolved.agent = resolver.resolve(&options.url, env, &settings);
    }

    resolved.strict_ssl = Some(options.strict_ssl.unwrap_or(config.strict_ssl));

    let authorization = options
        .proxy_authorization
        .as_ref()
        .or(config.proxy_authorization.as_ref());
    if let Some(authorization) = authorization {
        resolved
            .headers
            .retain(|name, _| !name.eq_ignore_ascii_case(HEADER_PROXY_AUTHORIZATION));
        resolved.headers.insert(
            HEADER_PROXY_AUTHORIZATION.to_string(),
            authorization.clone(),
        );
    }

    resolved
}
