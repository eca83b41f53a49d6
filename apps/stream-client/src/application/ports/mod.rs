//! Transport Port
//!
//! The seam between the consumer runtime and whatever carries the stream.
//! Production wires in the SSE transport; tests inject in-memory fakes that
//! replay scripted [`TransportMessage`] sequences.

use async_trait::async_trait;
use futures::stream::BoxStream;
use url::Url;

use crate::domain::consumer::TransportMessage;

/// Boxed stream of tagged transport messages for one connection attempt.
pub type TransportStream = BoxStream<'static, TransportMessage>;

/// Errors raised while opening a transport.
///
/// Failures after the transport is open are delivered in-band as
/// [`TransportMessage::Error`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server answered with a non-success HTTP status.
    #[error("unexpected HTTP status {status}")]
    HttpStatus {
        /// The status code returned by the server.
        status: u16,
    },
}

/// A transport that can open one streaming connection to a request target.
///
/// Implementations own connection setup and framing; everything downstream
/// of [`TransportMessage`] belongs to the consumer core.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a connection to `target` and return the message stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection cannot be established
    /// or the server refuses the stream.
    async fn open(&self, target: &Url) -> Result<TransportStream, TransportError>;
}
