//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and talks to it through
//! a fresh `RequestClient`, so cookie state never leaks between tests.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};

use mock_server::{Echo, User, WhoAmI, BINARY_PAYLOAD};
use reqkit_core::{Context, Error, Json, RequestClient, Sink, TransportKind};
use reqwest::StatusCode;
use tokio::io::AsyncWrite;

/// Start the mock server on `127.0.0.1:0` and return its `/api/` base URL.
async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { mock_server::run(listener).await });
    format!("http://{addr}/api/")
}

async fn client() -> RequestClient {
    RequestClient::new(None, &start_server().await).unwrap()
}

fn ctx() -> Context {
    Context::background().with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn decodes_json_into_target() {
    let c = client().await;
    let req = c.new_request("GET", "user", false, None, None).unwrap();
    let mut user = User::default();
    let resp = c.execute(Some(&ctx()), req, Some(&mut Json(&mut user))).await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(user, User { id: 1, name: "Ada".to_string() });
}

#[tokio::test]
async fn sends_body_headers_and_user_agent() {
    let c = client().await.with_user_agent("reqkit-it/1.0");
    let headers: HashMap<String, String> =
        [("X-Custom".to_string(), "42".to_string())].into_iter().collect();
    let req = c
        .new_request("POST", "echo", true, Some(&headers), Some(br#"{"name":"ada"}"#))
        .unwrap();
    let mut echo = Echo::default();
    c.execute(Some(&ctx()), req, Some(&mut Json(&mut echo))).await.unwrap();

    assert_eq!(echo.method, "POST");
    assert_eq!(echo.path, "/api/echo");
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    assert_eq!(echo.user_agent.as_deref(), Some("reqkit-it/1.0"));
    assert_eq!(echo.custom.as_deref(), Some("42"));
    assert_eq!(echo.body, r#"{"name":"ada"}"#);
}

#[tokio::test]
async fn empty_body_leaves_target_untouched() {
    let c = client().await;
    for path in ["empty", "no-content"] {
        let req = c.new_request("GET", path, false, None, None).unwrap();
        let mut user = User { id: 7, name: "unchanged".to_string() };
        let resp = c.execute(Some(&ctx()), req, Some(&mut Json(&mut user))).await.unwrap();
        assert!(resp.status.is_success(), "{path}: status");
        assert_eq!(user, User { id: 7, name: "unchanged".to_string() }, "{path}: target");
    }
}

#[tokio::test]
async fn malformed_json_is_decode_error() {
    let c = client().await;
    let req = c.new_request("GET", "malformed", false, None, None).unwrap();
    let mut user = User::default();
    let err = c.execute(Some(&ctx()), req, Some(&mut Json(&mut user))).await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }), "got {err:?}");
    assert_eq!(err.response().unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn type_mismatch_is_decode_error() {
    let c = client().await;
    let req = c.new_request("GET", "user", false, None, None).unwrap();
    let mut wrong: Vec<String> = Vec::new();
    let err = c.execute(Some(&ctx()), req, Some(&mut Json(&mut wrong))).await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn sink_receives_exact_bytes() {
    let c = client().await;
    let req = c.new_request("GET", "bytes", false, None, None).unwrap();
    let mut buf: Vec<u8> = Vec::new();
    let resp = c.execute(Some(&ctx()), req, Some(&mut Sink(&mut buf))).await.unwrap();
    assert_eq!(resp.header("content-type"), Some("application/octet-stream"));
    assert_eq!(buf, BINARY_PAYLOAD);
}

#[tokio::test]
async fn sink_gets_json_body_verbatim() {
    let c = client().await;
    let req = c.new_request("GET", "malformed", false, None, None).unwrap();
    let mut buf: Vec<u8> = Vec::new();
    c.execute(Some(&ctx()), req, Some(&mut Sink(&mut buf))).await.unwrap();
    assert_eq!(buf, br#"{"id": 1, "name": "#);
}

/// Writer whose every write fails.
struct FullDisk;

impl AsyncWrite for FullDisk {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::other("disk full")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn sink_write_failure_is_body_read_error() {
    let c = client().await;
    let req = c.new_request("GET", "bytes", false, None, None).unwrap();
    let mut disk = FullDisk;
    let err = c.execute(Some(&ctx()), req, Some(&mut Sink(&mut disk))).await.unwrap_err();
    match &err {
        Error::BodyRead { source, .. } => assert_eq!(source.to_string(), "disk full"),
        other => panic!("expected BodyRead, got {other:?}"),
    }
    assert_eq!(err.response().unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn no_target_drains_body() {
    let c = client().await;
    let req = c.new_request("GET", "bytes", false, None, None).unwrap();
    let resp = c.execute(Some(&ctx()), req, None).await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn error_status_is_not_an_error() {
    let c = client().await;
    let req = c.new_request("GET", "nope", false, None, None).unwrap();
    let mut user = User::default();
    let resp = c.execute(Some(&ctx()), req, Some(&mut Json(&mut user))).await.unwrap();
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_context_is_rejected() {
    let c = client().await;
    let req = c.new_request("GET", "user", false, None, None).unwrap();
    let err = c.execute(None, req, None).await.unwrap_err();
    assert!(matches!(err, Error::MissingContext));
}

#[tokio::test]
async fn cookies_are_replayed() {
    let c = client().await;

    let req = c.new_request("GET", "whoami", false, None, None).unwrap();
    let mut before = WhoAmI::default();
    c.execute(Some(&ctx()), req, Some(&mut Json(&mut before))).await.unwrap();
    assert!(before.session.is_none());

    let req = c.new_request("GET", "login", false, None, None).unwrap();
    c.execute(Some(&ctx()), req, None).await.unwrap();

    let req = c.new_request("GET", "whoami", false, None, None).unwrap();
    let mut after = WhoAmI::default();
    c.execute(Some(&ctx()), req, Some(&mut Json(&mut after))).await.unwrap();
    let session = after.session.expect("session cookie replayed");

    let jar_header = c.cookies(&c.base_url().join("whoami").unwrap()).unwrap();
    assert_eq!(jar_header, format!("session={session}"));
}

#[tokio::test]
async fn clients_do_not_share_cookies() {
    let base = start_server().await;
    let a = RequestClient::new(None, &base).unwrap();
    let b = RequestClient::new(None, &base).unwrap();

    let req = a.new_request("GET", "login", false, None, None).unwrap();
    a.execute(Some(&ctx()), req, None).await.unwrap();

    let req = b.new_request("GET", "whoami", false, None, None).unwrap();
    let mut who = WhoAmI::default();
    b.execute(Some(&ctx()), req, Some(&mut Json(&mut who))).await.unwrap();
    assert!(who.session.is_none());
}

#[tokio::test]
async fn cancel_aborts_in_flight_request() {
    let c = client().await;
    let req = c.new_request("GET", "slow", false, None, None).unwrap();
    let (ctx, handle) = Context::background().with_cancel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });

    let started = Instant::now();
    let mut user = User::default();
    let err = c.execute(Some(&ctx), req, Some(&mut Json(&mut user))).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5), "cancel did not abort");
    assert_eq!(err.transport_kind(), Some(TransportKind::Canceled));
    assert!(err.is_cancellation());
}

#[tokio::test]
async fn deadline_aborts_in_flight_request() {
    let c = client().await;
    let req = c.new_request("GET", "slow", false, None, None).unwrap();
    let ctx = Context::background().with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let err = c.execute(Some(&ctx), req, None).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5), "deadline did not abort");
    assert_eq!(err.transport_kind(), Some(TransportKind::DeadlineExceeded));
}

#[tokio::test]
async fn deadline_mid_body_keeps_response_metadata() {
    let c = client().await;
    let req = c.new_request("GET", "stall", false, None, None).unwrap();
    let ctx = Context::background().with_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let mut value = serde_json::Value::Null;
    let err = c.execute(Some(&ctx), req, Some(&mut Json(&mut value))).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5), "deadline did not abort body read");
    assert_eq!(err.transport_kind(), Some(TransportKind::DeadlineExceeded));
    let resp = err.response().expect("headers arrived before the deadline");
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert_eq!(value, serde_json::Value::Null);
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let c = RequestClient::new(None, &format!("http://{addr}/")).unwrap();
    let req = c.new_request("GET", "x", false, None, None).unwrap();
    let err = c.execute(Some(&ctx()), req, None).await.unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportKind::Connect));
    assert!(err.response().is_none());
}

#[tokio::test]
async fn preconfigured_transport_timeout_applies() {
    let base = start_server().await;
    let builder = reqwest::Client::builder().timeout(Duration::from_millis(100));
    let c = RequestClient::new(Some(builder), &base).unwrap();
    let req = c.new_request("GET", "slow", false, None, None).unwrap();
    let err = c.execute(Some(&Context::background()), req, None).await.unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportKind::Timeout));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_client() {
    let c = client().await;
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let c = c.clone();
            tokio::spawn(async move {
                let req = c.new_request("GET", "user", false, None, None).unwrap();
                let mut user = User::default();
                c.execute(Some(&ctx()), req, Some(&mut Json(&mut user))).await.unwrap();
                user
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().name, "Ada");
    }
}
