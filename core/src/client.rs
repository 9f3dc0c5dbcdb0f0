//! Request building and execution against a fixed base URL.
//!
//! # Design
//! `RequestClient` owns one `reqwest::Client` and the cookie jar bound to it.
//! Building a request (`new_request`) is pure: it resolves the path against
//! the base URL and assembles headers. Executing (`execute`) is the only
//! network step, and it always consumes the response body before returning,
//! whether the body is decoded, streamed into a sink or discarded.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::context::Context;
use crate::error::Error;
use crate::http::{Request, Response};
use crate::target::Target;

/// HTTP client bound to a base URL, with its own cookie jar.
///
/// Cloning is cheap; clones share the connection pool and the jar.
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    user_agent: String,
}

impl RequestClient {
    /// Create a client for `base_url`.
    ///
    /// `transport` lets the caller preconfigure timeouts, proxies or TLS;
    /// `None` uses reqwest defaults. Either way a fresh cookie jar replaces
    /// whatever cookie policy the builder carried.
    ///
    /// Fails with `InvalidUrl` if `base_url` does not parse. A base URL whose
    /// path lacks a trailing slash is accepted here and rejected by
    /// `new_request`.
    pub fn new(transport: Option<reqwest::ClientBuilder>, base_url: &str) -> Result<Self, Error> {
        let parsed = Url::parse(base_url).map_err(|source| Error::InvalidUrl {
            input: base_url.to_string(),
            source,
        })?;
        let jar = Arc::new(Jar::default());
        let http = transport
            .unwrap_or_else(reqwest::Client::builder)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| Error::from_reqwest(e, None))?;
        Ok(Self {
            http,
            jar,
            base_url: parsed,
            user_agent: String::new(),
        })
    }

    /// Send `user_agent` as the `User-Agent` header on every request. An
    /// empty string disables the header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> Option<&str> {
        (!self.user_agent.is_empty()).then_some(self.user_agent.as_str())
    }

    /// The `Cookie` header value the jar would attach to a request for `url`.
    pub fn cookies(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    /// Build a request for `path`, resolved against the base URL.
    ///
    /// Headers are applied in order: `Content-Type: application/json` when
    /// `json` is set, then every entry of `headers` (overwriting), then the
    /// client's user agent. `body` is sent verbatim. An empty `method`
    /// means GET.
    pub fn new_request(
        &self,
        method: &str,
        path: &str,
        json: bool,
        headers: Option<&HashMap<String, String>>,
        body: Option<&[u8]>,
    ) -> Result<Request, Error> {
        if !self.base_url.path().ends_with('/') {
            return Err(Error::InvalidConfiguration(format!(
                "base URL must have a trailing slash, but {:?} does not",
                self.base_url.as_str()
            )));
        }

        let url = self.base_url.join(path).map_err(|source| Error::InvalidUrl {
            input: path.to_string(),
            source,
        })?;

        let method = if method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(method.as_bytes())
                .map_err(|e| Error::RequestConstruction(format!("invalid method {method:?}: {e}")))?
        };

        let mut header_map = HeaderMap::new();
        if json {
            header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in headers.into_iter().flatten() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::RequestConstruction(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::RequestConstruction(format!("invalid value for header {name}: {e}")))?;
            header_map.insert(name, value);
        }
        if let Some(user_agent) = self.user_agent() {
            let value = HeaderValue::from_str(user_agent)
                .map_err(|e| Error::RequestConstruction(format!("invalid user agent: {e}")))?;
            header_map.insert(USER_AGENT, value);
        }

        Ok(Request {
            method,
            url,
            headers: header_map,
            body: body.map(Bytes::copy_from_slice),
        })
    }

    /// Send `request` under `ctx` and hand the body to `target`.
    ///
    /// A target with a byte sink receives the body verbatim; any other
    /// target is decoded from JSON, where an empty body is not an error.
    /// Without a target the body is drained and discarded.
    ///
    /// The exchange, body handling included, is abandoned as soon as `ctx`
    /// ends. Failures after the response headers arrived carry the response
    /// metadata (see `Error::response`).
    #[instrument(name = "execute", skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn execute(
        &self,
        ctx: Option<&Context>,
        request: Request,
        target: Option<&mut dyn Target>,
    ) -> Result<Response, Error> {
        let ctx = ctx.ok_or(Error::MissingContext)?;
        if let Some(err) = ctx.err() {
            return Err(Error::from_context(err, None));
        }

        debug!("sending request");
        let resp = tokio::select! {
            biased;
            err = ctx.done() => return Err(Error::from_context(err, None)),
            result = self.http.execute(request.into_reqwest()) => {
                result.map_err(|e| Error::from_reqwest(e, None))?
            }
        };

        let response = Response::from_reqwest(&resp);
        debug!(status = %response.status, "response received");

        let outcome = tokio::select! {
            biased;
            err = ctx.done() => Err(Error::from_context(err, Some(&response))),
            result = consume_body(resp, target, &response) => result,
        };
        outcome.map(|()| response)
    }
}

/// Read the whole body into `target`. The body is owned here, so the
/// connection is released when this returns or is dropped.
async fn consume_body(
    mut resp: reqwest::Response,
    target: Option<&mut dyn Target>,
    meta: &Response,
) -> Result<(), Error> {
    let body_err = |source: std::io::Error| Error::BodyRead {
        response: Box::new(meta.clone()),
        source,
    };

    let Some(target) = target else {
        trace!("draining body");
        while resp.chunk().await.map_err(|e| body_err(std::io::Error::other(e)))?.is_some() {}
        return Ok(());
    };

    match target.sink() {
        Some(sink) => {
            trace!("streaming body into sink");
            while let Some(chunk) = resp.chunk().await.map_err(|e| body_err(std::io::Error::other(e)))? {
                sink.write_all(&chunk).await.map_err(body_err)?;
            }
            sink.flush().await.map_err(body_err)?;
        }
        None => {
            trace!("decoding JSON body");
            let body = resp.bytes().await.map_err(|e| body_err(std::io::Error::other(e)))?;
            target.decode(&body).map_err(|source| Error::Decode {
                response: Box::new(meta.clone()),
                source,
            })?;
        }
    }
    Ok(())
}
