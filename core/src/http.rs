//! HTTP request and response values.
//!
//! # Design
//! `Request` is plain data: `RequestClient::new_request` builds it without
//! touching the network, and `RequestClient::execute` turns it into a wire
//! request. `Response` carries only metadata because the body is always
//! consumed (decoded, streamed or drained) before `execute` returns, so the
//! connection goes back to the pool on every exit path.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

/// An HTTP request resolved against a client's base URL.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    /// Look up a header value. Names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn into_reqwest(self) -> reqwest::Request {
        let mut req = reqwest::Request::new(self.method, self.url);
        *req.headers_mut() = self.headers;
        if let Some(body) = self.body {
            *req.body_mut() = Some(body.into());
        }
        req
    }
}

/// Metadata of a completed exchange.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Final URL after redirects.
    pub url: Url,
}

impl Response {
    pub(crate) fn from_reqwest(resp: &reqwest::Response) -> Self {
        Self {
            status: resp.status(),
            headers: resp.headers().clone(),
            url: resp.url().clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
