//! Error types for the request client.
//!
//! # Design
//! Every failure is returned to the caller; nothing is retried or logged
//! here. Failures that happen after response headers arrived keep the
//! response metadata so callers can still inspect status and headers.

use std::io;

use crate::context::ContextError;
use crate::http::Response;

/// Classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The caller's context was cancelled.
    Canceled,
    /// The caller's context deadline passed.
    DeadlineExceeded,
    /// A timeout configured on the underlying client fired.
    Timeout,
    /// DNS, connection refused, TLS handshake.
    Connect,
    Other,
}

impl From<ContextError> for TransportKind {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => TransportKind::Canceled,
            ContextError::DeadlineExceeded => TransportKind::DeadlineExceeded,
        }
    }
}

/// Errors returned by `RequestClient`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The base URL cannot anchor relative paths.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid URL {input:?}: {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },

    /// Bad method token, header name or header value.
    #[error("request construction failed: {0}")]
    RequestConstruction(String),

    #[error("context must be provided")]
    MissingContext,

    #[error("transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportKind,
        message: String,
        response: Option<Box<Response>>,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Reading the body or writing it to the caller's sink failed.
    #[error("reading response body failed: {source}")]
    BodyRead {
        response: Box<Response>,
        #[source]
        source: io::Error,
    },

    #[error("decoding JSON response failed: {source}")]
    Decode {
        response: Box<Response>,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn from_reqwest(err: reqwest::Error, response: Option<&Response>) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };
        Error::Transport {
            kind,
            message: err.to_string(),
            response: response.cloned().map(Box::new),
            source: Some(err),
        }
    }

    pub(crate) fn from_context(err: ContextError, response: Option<&Response>) -> Self {
        Error::Transport {
            kind: err.into(),
            message: err.to_string(),
            response: response.cloned().map(Box::new),
            source: None,
        }
    }

    /// The transport classification, if this is a transport failure.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Error::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True when the call ended because its context was cancelled or expired.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.transport_kind(),
            Some(TransportKind::Canceled | TransportKind::DeadlineExceeded)
        )
    }

    /// Response metadata available alongside the failure.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Transport { response, .. } => response.as_deref(),
            Error::BodyRead { response, .. } | Error::Decode { response, .. } => Some(response),
            _ => None,
        }
    }
}
