//! Small async HTTP request helper bound to a base URL.
//!
//! # Overview
//! `RequestClient` builds requests against a fixed base URL and executes
//! them with a shared, cookie-jar-enabled `reqwest` client. Responses are
//! either decoded from JSON into a caller-supplied value or streamed
//! verbatim into a caller-supplied writer.
//!
//! # Design
//! - Building (`new_request`) and executing (`execute`) are separate steps;
//!   only `execute` does I/O.
//! - Every execution is bound to an explicit `Context` carrying cancellation
//!   and a deadline.
//! - The decode-or-stream choice is made by asking the `Target` for a byte
//!   sink at call time.
//! - No retries and no internal logging of failures: every error is returned.
//!
//! ```no_run
//! use reqkit_core::{Context, Json, RequestClient};
//!
//! # async fn demo() -> Result<(), reqkit_core::Error> {
//! let client = RequestClient::new(None, "https://api.example.com/v1/")?
//!     .with_user_agent("demo/0.1");
//! let req = client.new_request("GET", "users/1", false, None, None)?;
//! let mut user = serde_json::Value::Null;
//! let ctx = Context::background().with_timeout(std::time::Duration::from_secs(5));
//! let resp = client.execute(Some(&ctx), req, Some(&mut Json(&mut user))).await?;
//! println!("{} {}", resp.status, user);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod http;
pub mod target;

pub use client::RequestClient;
pub use context::{CancelHandle, Context, ContextError};
pub use error::{Error, TransportKind};
pub use http::{Request, Response};
pub use target::{Json, Sink, Target};
