//! Integration tests for RequestService
//!
//! These tests run real logical requests against wiremock servers and verify:
//! - Redirect following and budget exhaustion
//! - Gzip decoding and the text/JSON/stream views
//! - Cancellation, timeouts and connection failures
//! - Proxy routing and Proxy-Authorization injection

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use request_service::{
    EnvProxyResolver, ErrorType, InfoType, ProxyAgent, ProxyAgentResolver, ProxySettings,
    RawRequest, RawResponse, RequestConfiguration, RequestError, RequestOptions, RequestService,
    Transport,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Helper function to gzip a payload
fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("Failed to write gzip payload");
    encoder.finish().expect("Failed to finish gzip payload")
}

/// Resolver that never routes through a proxy, whatever the environment says
struct NeverProxy;

impl ProxyAgentResolver for NeverProxy {
    fn resolve(
        &self,
        _url: &str,
        _env: &HashMap<String, String>,
        _settings: &ProxySettings,
    ) -> Option<Arc<ProxyAgent>> {
        None
    }
}

/// Helper function to create a service that ignores the environment's proxies
fn direct_service() -> RequestService {
    RequestService::with_resolver(RequestConfiguration::default(), Arc::new(NeverProxy))
}

/// Helper function to reserve a local port with nothing listening on it
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("Failed to get address").port()
}

#[derive(Debug, Deserialize, PartialEq)]
struct Payload {
    x: i32,
}

#[tokio::test]
async fn test_plain_get_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Served-By", "wiremock")
                .set_body_string("hello world"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = direct_service();
    let context = service
        .send(&RequestOptions::new(format!("{}/hello", server.uri())))
        .await
        .expect("request should succeed");

    assert_eq!(context.status(), 200);
    assert_eq!(context.as_text(), "hello world");
    assert_eq!(context.header("x-served-by"), Some("wiremock"));
    assert_eq!(context.url().path(), "/hello");
}

#[tokio::test]
async fn test_single_redirect_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/b", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let service = direct_service();
    let options = RequestOptions::new(format!("{}/a", server.uri())).follow_redirects(1);
    let context = service.send(&options).await.expect("request should succeed");

    assert_eq!(context.status(), 200);
    assert_eq!(context.as_text(), "ok");
    assert_eq!(context.url().path(), "/b");

    // The caller's options are untouched by the hop
    assert_eq!(options.url, format!("{}/a", server.uri()));
    assert_eq!(options.follow_redirects, Some(1));
    assert_eq!(service.stats().get_info_count(InfoType::HttpRedirect), 1);
}

#[tokio::test]
async fn test_redirect_status_codes_followed() {
    let server = MockServer::start().await;
    for (from, status, to) in [
        ("/r301", 301u16, "/r307"),
        ("/r307", 307, "/r308"),
        ("/r308", 308, "/done"),
    ] {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(status).insert_header("Location", to))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/done"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&server)
        .await;

    let context = direct_service()
        .send(&RequestOptions::new(format!("{}/r301", server.uri())))
        .await
        .expect("request should succeed");

    assert_eq!(context.status(), 200);
    assert_eq!(context.as_text(), "done");
}

#[tokio::test]
async fn test_default_budget_returns_fourth_redirect_verbatim() {
    let server = MockServer::start().await;
    for hop in 0..4 {
        Mock::given(method("GET"))
            .and(path(format!("/hop{}", hop)))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("/hop{}", hop + 1).as_str())
                    .set_body_string(format!("redirect {}", hop)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/hop4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let service = direct_service();
    let context = service
        .send(&RequestOptions::new(format!("{}/hop0", server.uri())))
        .await
        .expect("budget exhaustion is not an error");

    assert_eq!(context.status(), 302);
    assert_eq!(context.header("location"), Some("/hop4"));
    assert_eq!(context.as_text(), "redirect 3");
    assert_eq!(service.stats().get_info_count(InfoType::HttpRedirect), 3);
    assert_eq!(
        service
            .stats()
            .get_info_count(InfoType::RedirectBudgetExhausted),
        1
    );
}

#[tokio::test]
async fn test_zero_budget_never_follows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/b"))
        .expect(1)
        .mount(&server)
        .await;

    let context = direct_service()
        .send(&RequestOptions::new(format!("{}/a", server.uri())).follow_redirects(0))
        .await
        .expect("request should succeed");

    assert_eq!(context.status(), 301);
}

#[tokio::test]
async fn test_redirect_without_location_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(302).set_body_string("moved somewhere"))
        .expect(1)
        .mount(&server)
        .await;

    let context = direct_service()
        .send(&RequestOptions::new(format!("{}/moved", server.uri())))
        .await
        .expect("request should succeed");

    assert_eq!(context.status(), 302);
    assert_eq!(context.as_text(), "moved somewhere");
}

#[tokio::test]
async fn test_relative_location_resolved_against_current_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dir/start"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "next?page=2"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dir/next"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page two"))
        .expect(1)
        .mount(&server)
        .await;

    let context = direct_service()
        .send(&RequestOptions::new(format!("{}/dir/start", server.uri())))
        .await
        .expect("request should succeed");

    assert_eq!(context.as_text(), "page two");
    assert_eq!(context.url().query(), Some("page=2"));
}

#[tokio::test]
async fn test_gzip_body_decoded() {
    let plaintext = "{\"message\":\"compressed hello\"}".repeat(50);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_bytes(gzip(plaintext.as_bytes())),
        )
        .mount(&server)
        .await;

    let service = direct_service();
    let context = service
        .send(&RequestOptions::new(format!("{}/gz", server.uri())))
        .await
        .expect("request should succeed");

    assert_eq!(context.as_text(), plaintext);
    assert_eq!(context.header("content-encoding"), Some("gzip"));
    assert_eq!(service.stats().get_info_count(InfoType::GzipDecoded), 1);
}

#[tokio::test]
async fn test_corrupt_gzip_rejects_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_string("plain text pretending to be gzip"),
        )
        .mount(&server)
        .await;

    let service = direct_service();
    let err = service
        .send(&RequestOptions::new(server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Decode(_)));
    assert_eq!(service.stats().get_error_count(ErrorType::DecodeError), 1);
}

#[tokio::test]
async fn test_json_echo() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(body_string("{\"x\":1}"))
        .respond_with(|req: &Request| ResponseTemplate::new(200).set_body_bytes(req.body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let options = RequestOptions::new(format!("{}/echo", server.uri()))
        .method("POST")
        .header("Content-Type", "application/json")
        .data("{\"x\":1}");
    let context = direct_service()
        .send(&options)
        .await
        .expect("request should succeed");

    assert_eq!(context.as_json::<Payload>().unwrap(), Payload { x: 1 });
    // Repeated views give the same answer without touching the network again
    assert_eq!(context.as_json::<Payload>().unwrap(), Payload { x: 1 });
    assert_eq!(context.as_text(), context.as_text());
}

#[tokio::test]
async fn test_body_and_headers_survive_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(307).insert_header("Location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/new"))
        .and(header("x-request-id", "abc-123"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let options = RequestOptions::new(format!("{}/old", server.uri()))
        .method("PUT")
        .header("X-Request-Id", "abc-123")
        .data("payload");
    let context = direct_service()
        .send(&options)
        .await
        .expect("request should succeed");

    assert_eq!(context.status(), 201);
}

#[tokio::test]
async fn test_basic_auth_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Basic YWxpY2U6czNjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .expect(1)
        .mount(&server)
        .await;

    let context = direct_service()
        .send(&RequestOptions::new(server.uri()).basic_auth("alice", "s3cret"))
        .await
        .expect("request should succeed");

    assert_eq!(context.as_text(), "welcome");
}

#[tokio::test]
async fn test_proxy_authorization_injected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("proxy-authorization", "Basic cHJveHk6cHc="))
        .and(header("accept", "text/plain"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let service = RequestService::with_resolver(
        RequestConfiguration {
            proxy_authorization: Some("Basic cHJveHk6cHc=".to_string()),
            ..Default::default()
        },
        Arc::new(NeverProxy),
    );
    let options = RequestOptions::new(server.uri()).header("Accept", "text/plain");
    let context = service.send(&options).await.expect("request should succeed");

    assert_eq!(context.status(), 200);
    assert!(!options.headers.contains_key("Proxy-Authorization"));
}

/// Helper function to resolve the agent for `target` from a fixed environment
fn proxy_agent(proxy_url: &str, target: &str, env: &[(&str, &str)]) -> Arc<ProxyAgent> {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let settings = ProxySettings {
        proxy_url: Some(proxy_url.to_string()),
        strict_ssl: true,
    };
    EnvProxyResolver::new()
        .resolve(target, &env, &settings)
        .expect("a proxy is configured")
}

#[tokio::test]
async fn test_requests_routed_through_configured_proxy() {
    // The mock server plays the proxy: it receives the absolute-form request
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(1)
        .mount(&proxy)
        .await;

    let target = "http://upstream.invalid/ping";
    let options = RequestOptions::new(target).agent(proxy_agent(&proxy.uri(), target, &[]));
    let context = direct_service()
        .send(&options)
        .await
        .expect("request should go through the proxy");

    assert_eq!(context.as_text(), "via proxy");
}

#[tokio::test]
async fn test_no_proxy_cidr_connects_directly() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(0)
        .mount(&proxy)
        .await;
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_string("direct"))
        .expect(1)
        .mount(&upstream)
        .await;

    let target = format!("{}/direct", upstream.uri());
    let agent = proxy_agent(&proxy.uri(), &target, &[("NO_PROXY", "10.0.0.0/8,127.0.0.0/8")]);
    let context = direct_service()
        .send(&RequestOptions::new(target).agent(agent))
        .await
        .expect("request should bypass the proxy");

    assert_eq!(context.as_text(), "direct");
}

#[tokio::test]
async fn test_cancellation_before_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let service = direct_service();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let result = service
        .request(&RequestOptions::new(server.uri()), &token)
        .await;

    assert!(matches!(result, Err(RequestError::Cancelled)));
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "cancellation should abort the request promptly, took {:?}",
        start.elapsed()
    );
    assert_eq!(service.stats().get_error_count(ErrorType::Cancelled), 1);
}

#[tokio::test]
async fn test_cancellation_covers_redirect_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/slow"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let service = direct_service();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let result = service
        .request(&RequestOptions::new(format!("{}/start", server.uri())), &token)
        .await;

    assert!(matches!(result, Err(RequestError::Cancelled)));
    assert_eq!(service.stats().get_info_count(InfoType::HttpRedirect), 1);
}

#[tokio::test]
async fn test_timeout_surfaces_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let service = direct_service();
    let err = service
        .send(&RequestOptions::new(server.uri()).timeout(Duration::from_millis(200)))
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Transport(_)));
    assert!(err.is_timeout());
    assert_eq!(
        service
            .stats()
            .get_error_count(ErrorType::HttpRequestTimeoutError),
        1
    );
}

#[tokio::test]
async fn test_connection_refused_surfaces_unchanged() {
    let service = direct_service();
    let err = service
        .send(&RequestOptions::new(format!("http://127.0.0.1:{}/", closed_port())))
        .await
        .unwrap_err();

    let RequestError::Transport(inner) = &err else {
        panic!("expected a transport error, got {:?}", err);
    };
    let reqwest_err = inner
        .downcast_ref::<reqwest::Error>()
        .expect("the underlying reqwest error is kept");
    assert!(reqwest_err.is_connect());
    assert_eq!(
        service
            .stats()
            .get_error_count(ErrorType::HttpRequestConnectError),
        1
    );
}

#[tokio::test]
async fn test_configuration_changes_apply_to_later_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("proxy-authorization", "Basic later"))
        .respond_with(ResponseTemplate::new(200).set_body_string("authorized"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(407))
        .mount(&server)
        .await;

    let service = Arc::new(direct_service());
    let options = RequestOptions::new(server.uri());

    let first = service.send(&options).await.expect("request should succeed");
    assert_eq!(first.status(), 407);

    service.configure(RequestConfiguration {
        proxy_authorization: Some("Basic later".to_string()),
        ..Default::default()
    });
    let second = service.send(&options).await.expect("request should succeed");
    assert_eq!(second.status(), 200);
    assert_eq!(second.as_text(), "authorized");
}

/// Transport that records every attempt and answers from a script
#[derive(Default)]
struct ScriptedTransport {
    seen: Mutex<Vec<RawRequest>>,
}

impl Transport for ScriptedTransport {
    fn send(&self, request: RawRequest) -> BoxFuture<'static, Result<RawResponse, RequestError>> {
        let (status, headers, chunks): (u16, Vec<(&str, &str)>, Vec<&'static [u8]>) =
            match request.path.as_str() {
                "/first" => (302, vec![("location", "/second")], vec![]),
                _ => (200, vec![("content-type", "text/plain")], vec![&b"scripted "[..], &b"reply"[..]]),
            };
        self.seen.lock().unwrap().push(request);

        let response = RawResponse {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Box::pin(stream::iter(
                chunks
                    .into_iter()
                    .map(|c| Ok::<_, RequestError>(Bytes::from_static(c))),
            )),
        };
        Box::pin(async move { Ok(response) })
    }
}

#[tokio::test]
async fn test_injected_transport_used_for_every_hop() {
    let transport = Arc::new(ScriptedTransport::default());
    let factory_transport = Arc::clone(&transport);

    let options = RequestOptions::new("https://scripted.invalid/first")
        .basic_auth("user", "pa:ss")
        .strict_ssl(true)
        .raw_request(move |_| Arc::clone(&factory_transport) as Arc<dyn Transport>);
    let context = direct_service()
        .send(&options)
        .await
        .expect("request should succeed");

    assert_eq!(context.status(), 200);
    assert_eq!(context.as_text(), "scripted reply");

    let seen = transport.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].path, "/first");
    assert_eq!(seen[1].path, "/second");
    for request in seen.iter() {
        assert_eq!(request.scheme, "https");
        assert_eq!(request.hostname, "scripted.invalid");
        assert_eq!(request.port, 443);
        assert_eq!(request.method, "GET");
        assert!(request.reject_unauthorized);
        assert_eq!(request.credentials(), Some(("user", "pa:ss")));
    }
}

/// Sets its flag when dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Transport whose body yields one chunk and then never finishes
struct StalledBodyTransport {
    body_dropped: Arc<AtomicBool>,
}

impl Transport for StalledBodyTransport {
    fn send(&self, _request: RawRequest) -> BoxFuture<'static, Result<RawResponse, RequestError>> {
        let flag = DropFlag(Arc::clone(&self.body_dropped));
        let body = stream::iter(vec![Ok::<_, RequestError>(Bytes::from_static(b"partial"))])
            .chain(stream::pending())
            .map(move |chunk| {
                let _flag = &flag;
                chunk
            })
            .boxed();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());

        Box::pin(async move {
            Ok(RawResponse {
                status: 200,
                headers,
                body,
            })
        })
    }
}

#[tokio::test]
async fn test_cancellation_while_draining_body() {
    let body_dropped = Arc::new(AtomicBool::new(false));
    let transport: Arc<dyn Transport> = Arc::new(StalledBodyTransport {
        body_dropped: Arc::clone(&body_dropped),
    });

    let service = direct_service();
    let options = RequestOptions::new("http://stalled.invalid/body")
        .raw_request(move |_| Arc::clone(&transport));

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), service.request(&options, &token))
        .await
        .expect("cancellation should settle a stalled body");

    // The partial body is discarded: no context is produced
    assert!(matches!(result, Err(RequestError::Cancelled)));
    assert!(body_dropped.load(Ordering::SeqCst));
    assert_eq!(service.stats().get_error_count(ErrorType::Cancelled), 1);
    assert_eq!(service.stats().get_info_count(InfoType::GzipDecoded), 0);
}
