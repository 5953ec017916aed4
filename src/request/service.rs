//! The caller-facing request service.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::config::RequestConfiguration;
use crate::error_handling::{update_error_stats, RequestError, RequestStats};
use crate::proxy::{EnvProxyResolver, ProxyAgentResolver};
use crate::request::context::RequestContext;
use crate::request::options::{resolve_options, RequestOptions};
use crate::request::redirects::execute;
use crate::request::transport::TransportProvider;

/// Issues logical requests: option resolution, redirects, decoding and
/// cancellation.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
///
/// # Examples
///
/// ```no_run
/// use request_service::{RequestConfiguration, RequestOptions, RequestService};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), request_service::RequestError> {
/// let service = RequestService::new(RequestConfiguration::default());
/// let token = CancellationToken::new();
///
/// let options = RequestOptions::new("http://example.com/a").follow_redirects(1);
/// let context = service.request(&options, &token).await?;
/// assert_eq!(context.status(), 200);
/// # Ok(())
/// # }
/// ```
pub struct RequestService {
    config: RwLock<Arc<RequestConfiguration>>,
    resolver: Arc<dyn ProxyAgentResolver>,
    transports: TransportProvider,
    stats: RequestStats,
}

impl RequestService {
    /// A service using [`EnvProxyResolver`] and the built-in transports.
    pub fn new(config: RequestConfiguration) -> Self {
        Self::with_resolver(config, Arc::new(EnvProxyResolver::new()))
    }

    /// A service using a custom proxy-agent resolver.
    pub fn with_resolver(config: RequestConfiguration, resolver: Arc<dyn ProxyAgentResolver>) -> Self {
        RequestService {
            config: RwLock::new(Arc::new(config)),
            resolver,
            transports: TransportProvider::new(),
            stats: RequestStats::new(),
        }
    }

    /// Replaces the plain/secure transport strategy.
    pub fn with_transports(mut self, transports: TransportProvider) -> Self {
        self.transports = transports;
        self
    }

    /// Replaces the process-wide defaults. Requests already in flight keep the
    /// configuration they started with.
    pub fn configure(&self, config: RequestConfiguration) {
        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(config);
    }

    /// The current process-wide defaults.
    pub fn configuration(&self) -> Arc<RequestConfiguration> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Counters of failures and redirect/decoding events across all requests.
    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }

    /// Performs one logical request.
    ///
    /// The caller's `options` are never modified. Raising `token` at any point
    /// aborts the in-flight connection and settles the request with
    /// [`RequestError::Cancelled`]; the same token covers every redirect hop.
    ///
    /// # Errors
    ///
    /// Every failure, in any hop, ends the whole logical request: malformed
    /// URLs, transport errors (including timeouts), gzip decode errors and
    /// cancellation.
    pub async fn request(
        &self,
        options: &RequestOptions,
        token: &CancellationToken,
    ) -> Result<RequestContext, RequestError> {
        if token.is_cancelled() {
            debug!("Request to {} cancelled before dispatch", options.url);
            update_error_stats(&self.stats, &RequestError::Cancelled);
            return Err(RequestError::Cancelled);
        }

        let config = self.configuration();
        let env: HashMap<String, String> = std::env::vars().collect();
        let resolved = resolve_options(options, &config, self.resolver.as_ref(), &env);

        let result = execute(&self.transports, &self.stats, resolved, token).await;
        if let Err(e) = &result {
            if e.is_cancelled() {
                debug!("Request to {} cancelled", options.url);
            } else {
                debug!("Request to {} failed: {}", options.url, e);
            }
            update_error_stats(&self.stats, e);
        }
        result
    }

    /// Performs one logical request that can never be cancelled.
    pub async fn send(&self, options: &RequestOptions) -> Result<RequestContext, RequestError> {
        self.request(options, &CancellationToken::new()).await
    }
}

impl Default for RequestService {
    fn default() -> Self {
        Self::new(RequestConfiguration::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ErrorType;

    #[test]
    fn test_configure_replaces_snapshot() {
        let service = RequestService::default();
        let before = service.configuration();
        assert!(before.proxy_url.is_none());

        service.configure(RequestConfiguration {
            proxy_url: Some("http://proxy:3128".to_string()),
            strict_ssl: false,
            proxy_authorization: None,
        });

        // Earlier snapshots are unaffected
        assert!(before.proxy_url.is_none());
        let after = service.configuration();
        assert_eq!(after.proxy_url.as_deref(), Some("http://proxy:3128"));
        assert!(!after.strict_ssl);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token() {
        let service = RequestService::default();
        let token = CancellationToken::new();
        token.cancel();

        let err = service
            .request(&RequestOptions::new("http://127.0.0.1:9/"), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(service.stats().get_error_count(ErrorType::Cancelled), 1);
    }

    #[tokio::test]
    async fn test_malformed_url_is_fatal() {
        let service = RequestService::default();
        let err = service
            .send(&RequestOptions::new("http//missing-colon"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidUrl(_)));
        assert_eq!(
            service.stats().get_error_count(ErrorType::InvalidUrlError),
            1
        );
    }
}
