use std::convert::Infallible;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Fixed payload served by `/api/bytes`; includes bytes that are not UTF-8.
pub const BINARY_PAYLOAD: &[u8] = &[0x00, 0x01, 0x02, 0xfe, 0xff, b'o', b'k', b'\n'];

/// How long `/api/slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(10);

/// First body chunk of `/api/stall`; the rest arrives after `SLOW_DELAY`.
pub const STALL_PREFIX: &[u8] = br#"{"a""#;

pub const SESSION_COOKIE: &str = "session";

/// What the server saw of a request to `/api/echo`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub custom: Option<String>,
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoAmI {
    pub session: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/api/echo", get(echo).post(echo).put(echo))
        .route("/api/user", get(user))
        .route("/api/empty", get(empty))
        .route("/api/no-content", get(no_content))
        .route("/api/malformed", get(malformed))
        .route("/api/bytes", get(binary))
        .route("/api/login", get(login))
        .route("/api/whoami", get(whoami))
        .route("/api/slow", get(slow))
        .route("/api/stall", get(stall))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        content_type: header_str(&headers, "content-type"),
        user_agent: header_str(&headers, "user-agent"),
        custom: header_str(&headers, "x-custom"),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn user() -> Json<User> {
    Json(User {
        id: 1,
        name: "Ada".to_string(),
    })
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn malformed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], r#"{"id": 1, "name": "#)
}

async fn binary() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], BINARY_PAYLOAD)
}

async fn login() -> impl IntoResponse {
    let cookie = format!("{SESSION_COOKIE}={}; Path=/api; HttpOnly", Uuid::new_v4());
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

async fn whoami(headers: HeaderMap) -> Json<WhoAmI> {
    let session = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string());
    Json(WhoAmI { session })
}

async fn slow() -> Json<User> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(User::default())
}

/// Sends headers and a partial JSON body, then stalls mid-body.
async fn stall() -> impl IntoResponse {
    let head = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(STALL_PREFIX)) });
    let tail = stream::once(async {
        tokio::time::sleep(SLOW_DELAY).await;
        Ok::<_, Infallible>(Bytes::from_static(b":1}"))
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(head.chain(tail)),
    )
}
