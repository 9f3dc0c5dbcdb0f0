//! Destinations for a response body.
//!
//! `execute` asks a `Target` for its byte-sink capability first. Targets
//! that have one receive the body verbatim; all others get the body
//! decoded as JSON.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::AsyncWrite;

pub trait Target: Send {
    /// Raw byte destination, if this target wants the body unparsed.
    fn sink(&mut self) -> Option<&mut (dyn AsyncWrite + Unpin + Send)> {
        None
    }

    /// Populate the target from a JSON body. Only called when `sink`
    /// returns `None`; the default discards the body.
    ///
    /// An empty (or whitespace-only) body is not an error and leaves the
    /// target untouched.
    fn decode(&mut self, _body: &[u8]) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

/// Decodes the first JSON value of the body into `T`. Whatever follows that
/// value is never read.
#[derive(Debug)]
pub struct Json<'a, T>(pub &'a mut T);

impl<T: DeserializeOwned + Send> Target for Json<'_, T> {
    fn decode(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        if body.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
            return Ok(());
        }
        // No `end()` call: trailing bytes are left unread.
        let mut de = serde_json::Deserializer::from_slice(body);
        *self.0 = T::deserialize(&mut de)?;
        Ok(())
    }
}

/// Copies the body verbatim into `W`.
#[derive(Debug)]
pub struct Sink<'a, W>(pub &'a mut W);

impl<W: AsyncWrite + Unpin + Send> Target for Sink<'_, W> {
    fn sink(&mut self) -> Option<&mut (dyn AsyncWrite + Unpin + Send)> {
        Some(&mut *self.0)
    }
}
