//! Proxy agents and their resolution.
//!
//! A [`ProxyAgent`] owns the connection pools used to reach targets, either
//! directly or through one proxy. A [`ProxyAgentResolver`] picks the agent for a
//! target URL; [`EnvProxyResolver`] is the default, driven by the configured
//! proxy URL and the usual `HTTP(S)_PROXY` / `NO_PROXY` environment variables.
//! `NO_PROXY` exclusions travel with the agent and are applied by its client
//! on every connection.
//!
//! Agents are shared. The request service never closes one; their lifetime
//! belongs to whoever holds the resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use reqwest::Url;

use crate::config::{ENV_HTTPS_PROXY, ENV_HTTP_PROXY, ENV_NO_PROXY};
use crate::error_handling::RequestError;
use crate::initialization::init_agent_client;

/// Proxy-related inputs handed to a [`ProxyAgentResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    /// Explicit proxy URL; takes precedence over the environment
    pub proxy_url: Option<String>,
    /// Process-wide strict-SSL default
    pub strict_ssl: bool,
}

/// Connection-pooling resource used by the built-in transports.
///
/// Holds one `reqwest::Client` per TLS-verification mode, built lazily.
pub struct ProxyAgent {
    proxy: Option<Url>,
    no_proxy: Option<String>,
    clients: Mutex<HashMap<bool, reqwest::Client>>,
}

impl ProxyAgent {
    /// An agent that connects to targets directly.
    pub fn direct() -> Self {
        Self::build(None, None)
    }

    /// An agent that routes requests through `proxy`, except for hosts
    /// matched by the `no_proxy` list (`NO_PROXY` syntax).
    pub fn with_proxy(proxy: Url, no_proxy: Option<String>) -> Self {
        Self::build(Some(proxy), no_proxy)
    }

    fn build(proxy: Option<Url>, no_proxy: Option<String>) -> Self {
        ProxyAgent {
            proxy,
            no_proxy,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The proxy this agent routes through, if any.
    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    /// Hosts that bypass the proxy, as a `NO_PROXY` list.
    pub fn no_proxy(&self) -> Option<&str> {
        self.no_proxy.as_deref()
    }

    /// Returns the pooled client for the given verification mode.
    pub fn client(&self, verify_tls: bool) -> Result<reqwest::Client, RequestError> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&verify_tls) {
            return Ok(client.clone());
        }

        let client = init_agent_client(self.proxy.as_ref(), self.no_proxy.as_deref(), verify_tls)
            .map_err(RequestError::ClientBuild)?;
        clients.insert(verify_tls, client.clone());
        Ok(client)
    }
}

impl fmt::Debug for ProxyAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print proxy credentials
        let proxy = self.proxy.as_ref().map(|url| {
            let mut redacted = url.clone();
            let _ = redacted.set_password(None);
            let _ = redacted.set_username("");
            redacted.to_string()
        });
        f.debug_struct("ProxyAgent")
            .field("proxy", &proxy)
            .field("no_proxy", &self.no_proxy)
            .finish()
    }
}

/// Chooses the transport agent for a target.
///
/// Returning `None` lets the transport use its own direct agent.
pub trait ProxyAgentResolver: Send + Sync {
    /// Returns the agent for `url`, or `None` to connect directly.
    ///
    /// `env` is a snapshot of the process environment taken for this request.
    fn resolve(
        &self,
        url: &str,
        env: &HashMap<String, String>,
        settings: &ProxySettings,
    ) -> Option<Arc<ProxyAgent>>;
}

/// Default resolver: explicit proxy URL, then the proxy environment variables.
///
/// - `https` targets read `HTTPS_PROXY`/`https_proxy`, falling back to
///   `HTTP_PROXY`/`http_proxy`; `http` targets read `HTTP_PROXY`/`http_proxy`
/// - `NO_PROXY`/`no_proxy` is handed to the agent, whose client connects
///   directly to matching hosts (names, subdomains, IPs, CIDR ranges, `*`)
/// - Only `http` and `https` proxies are supported; anything else goes direct
///
/// Agents are cached per proxy URL and exclusion list, and reused across
/// requests.
#[derive(Debug, Default)]
pub struct EnvProxyResolver {
    agents: Mutex<HashMap<(String, Option<String>), Arc<ProxyAgent>>>,
}

impl EnvProxyResolver {
    /// A resolver with an empty agent cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn agent_for(&self, proxy: Url, no_proxy: Option<String>) -> Arc<ProxyAgent> {
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            agents
                .entry((proxy.to_string(), no_proxy.clone()))
                .or_insert_with(|| Arc::new(ProxyAgent::with_proxy(proxy, no_proxy))),
        )
    }
}

impl ProxyAgentResolver for EnvProxyResolver {
    fn resolve(
        &self,
        url: &str,
        env: &HashMap<String, String>,
        settings: &ProxySettings,
    ) -> Option<Arc<ProxyAgent>> {
        let target = Url::parse(url).ok()?;
        let host = target.host_str()?;

        let raw = settings
            .proxy_url
            .clone()
            .filter(|proxy| !proxy.trim().is_empty())
            .or_else(|| system_proxy_uri(&target, env))?;

        let proxy = match Url::parse(&raw) {
            Ok(proxy) if matches!(proxy.scheme(), "http" | "https") => proxy,
            Ok(proxy) => {
                warn!(
                    "Ignoring proxy with unsupported scheme '{}' for {}",
                    proxy.scheme(),
                    host
                );
                return None;
            }
            Err(e) => {
                warn!("Ignoring malformed proxy URL for {}: {}", host, e);
                return None;
            }
        };

        let no_proxy = lookup_env(env, ENV_NO_PROXY);
        debug!(
            "Routing {} through proxy {} (NO_PROXY: {})",
            host,
            proxy.host_str().unwrap_or(""),
            no_proxy.as_deref().unwrap_or("none")
        );
        Some(self.agent_for(proxy, no_proxy))
    }
}

/// First non-blank value among `names`.
fn lookup_env(env: &HashMap<String, String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env.get(*name))
        .find(|value| !value.trim().is_empty())
        .cloned()
}

/// Proxy URL from the environment for the target's scheme.
fn system_proxy_uri(target: &Url, env: &HashMap<String, String>) -> Option<String> {
    match target.scheme() {
        "https" => lookup_env(env, ENV_HTTPS_PROXY).or_else(|| lookup_env(env, ENV_HTTP_PROXY)),
        "http" => lookup_env(env, ENV_HTTP_PROXY),
        _ => None,
    }
}
