//! HTTP client initialization.
//!
//! Builds the `reqwest::Client`s owned by transport agents.

use std::time::Duration;

use reqwest::{ClientBuilder, NoProxy, Proxy, Url};

/// How long an idle pooled connection is kept before it is closed.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Initializes an HTTP client for one agent.
///
/// Creates a `reqwest::Client` configured with:
/// - Redirects disabled (the redirect engine follows them itself)
/// - Environment proxy detection disabled (the proxy resolver is authoritative)
/// - The given proxy, if any (credentials in the proxy URL become proxy basic auth)
/// - `no_proxy` exclusions for that proxy, in `NO_PROXY` syntax: host names
///   match themselves and their subdomains, IP addresses and CIDR ranges
///   match addresses, `*` matches everything
/// - Certificate verification disabled when `verify_tls` is `false`
///
/// Response bodies are never decompressed by the client.
///
/// # Errors
///
/// Returns a `reqwest::Error` if the proxy URL is rejected or the TLS backend
/// cannot be initialized.
pub fn init_agent_client(
    proxy: Option<&Url>,
    no_proxy: Option<&str>,
    verify_tls: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    // no_proxy() must come before proxy(): it clears every configured proxy
    let mut builder = ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .pool_idle_timeout(POOL_IDLE_TIMEOUT);

    if let Some(proxy) = proxy {
        let exclusions = no_proxy.and_then(NoProxy::from_string);
        builder = builder.proxy(Proxy::all(proxy.as_str())?.no_proxy(exclusions));
    }

    if !verify_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build()
}
