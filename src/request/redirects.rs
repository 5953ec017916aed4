//! Redirect following.
//!
//! Runs the attempts of one logical request: send, inspect the status, and
//! either re-issue against the `Location` target with one redirect fewer or
//! decode the response as terminal.

use std::future::Future;

use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT, DEFAULT_METHOD, HEADER_LOCATION};
use crate::error_handling::{InfoType, RequestError, RequestStats};
use crate::request::context::RequestContext;
use crate::request::decode::{decode_response, is_gzip};
use crate::request::options::RequestOptions;
use crate::request::transport::{RawRequest, RawResponse, TransportProvider};

/// Parses the attempt's target.
///
/// Scheme and host are checked by transport selection, so an injected
/// transport sees whatever URL the caller gave.
pub(crate) fn parse_endpoint(url: &str) -> Result<Url, RequestError> {
    Ok(Url::parse(url)?)
}

/// Derives the connection parameters of one attempt.
///
/// The port defaults by scheme (443 for `https`, 80 otherwise), the method to
/// `GET`, and certificate verification follows `strict_ssl`. Basic auth is
/// only sent when both user and password are present.
pub(crate) fn connection_parameters(options: &RequestOptions, endpoint: &Url) -> RawRequest {
    let secure = endpoint.scheme() == "https";
    let port = endpoint.port().unwrap_or(if secure {
        DEFAULT_HTTPS_PORT
    } else {
        DEFAULT_HTTP_PORT
    });

    let mut path = endpoint.path().to_string();
    if let Some(query) = endpoint.query() {
        path.push('?');
        path.push_str(query);
    }

    let auth = match (&options.user, &options.password) {
        (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
            Some(format!("{}:{}", user, password))
        }
        _ => None,
    };

    RawRequest {
        scheme: endpoint.scheme().to_string(),
        hostname: endpoint.host_str().unwrap_or_default().to_string(),
        port,
        path,
        method: options
            .method
            .clone()
            .unwrap_or_else(|| DEFAULT_METHOD.to_string()),
        headers: options.headers.clone(),
        agent: options.agent.clone(),
        reject_unauthorized: options.strict_ssl.unwrap_or(false),
        auth,
        body: options.data.clone().map(Bytes::from),
        timeout: options.timeout,
    }
}

/// Resolves the next hop, or `None` when `response` is terminal.
///
/// A response is a redirect when its status is in `[300, 400)`, it carries a
/// `Location` header and the remaining budget is above zero. Relative
/// locations resolve against the attempt's own URL.
pub(crate) fn redirect_target(
    response: &RawResponse,
    endpoint: &Url,
    budget: u32,
    stats: &RequestStats,
) -> Result<Option<Url>, RequestError> {
    if !(300..400).contains(&response.status) {
        return Ok(None);
    }

    let Some(location) = response.header(HEADER_LOCATION) else {
        warn!(
            "Redirect status {} for {} but no Location header",
            response.status, endpoint
        );
        stats.increment_info(InfoType::RedirectWithoutLocation);
        return Ok(None);
    };

    if budget == 0 {
        warn!(
            "Redirect budget exhausted at {}, returning {} response as-is",
            endpoint, response.status
        );
        stats.increment_info(InfoType::RedirectBudgetExhausted);
        return Ok(None);
    }

    Ok(Some(endpoint.join(location)?))
}

/// Awaits `future` unless `token` fires first.
///
/// Losing the race drops `future`, which aborts its connection.
async fn cancellable<T, F>(token: &CancellationToken, future: F) -> Result<T, RequestError>
where
    F: Future<Output = Result<T, RequestError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RequestError::Cancelled),
        result = future => result,
    }
}

/// Executes a logical request from already-resolved options.
///
/// Attempts run strictly one after another; at most one connection is open
/// at a time. `token` is observed for the whole life of every attempt,
/// including body draining.
pub(crate) async fn execute(
    transports: &TransportProvider,
    stats: &RequestStats,
    options: RequestOptions,
    token: &CancellationToken,
) -> Result<RequestContext, RequestError> {
    let mut options = options;

    loop {
        let endpoint = parse_endpoint(&options.url)?;
        let transport = transports.select(&options)?;
        let request = connection_parameters(&options, &endpoint);
        let budget = options.redirect_budget();

        debug!(
            "{} {} (redirect budget {})",
            request.method, endpoint, budget
        );

        let response = cancellable(token, transport.send(request)).await?;

        match redirect_target(&response, &endpoint, budget, stats)? {
            Some(next) => {
                info!("Following {} redirect {} -> {}", response.status, endpoint, next);
                stats.increment_info(InfoType::HttpRedirect);
                // Release this attempt's connection before the next one opens
                drop(response);
                options = options.redirected(next.to_string());
            }
            None => {
                let gzip = is_gzip(&response);
                let context = cancellable(token, decode_response(endpoint, response)).await?;
                if gzip {
                    stats.increment_info(InfoType::GzipDecoded);
                }
                return Ok(context);
            }
        }
    }
}
