//! HTTP SSE Transport
//!
//! [`StreamTransport`] implementation over `reqwest`. Opens the analysis
//! stream with `Accept: text/event-stream`, consumes the response body as
//! a byte stream, and reduces it to tagged [`TransportMessage`]s through
//! the incremental [`SseDecoder`].

use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use url::Url;

use crate::application::ports::{StreamTransport, TransportError, TransportStream};
use crate::domain::consumer::TransportMessage;
use crate::infrastructure::sse::decoder::SseDecoder;

/// Default timeout for establishing the HTTP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// SSE transport backed by a shared `reqwest` client.
///
/// The client carries no overall request timeout: the stream is expected
/// to stay open for as long as the analysis runs.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    /// Create a transport with the default connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the underlying HTTP
    /// client cannot be constructed (for example, no TLS backend).
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a transport with a custom connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the underlying HTTP
    /// client cannot be constructed.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn open(&self, target: &Url) -> Result<TransportStream, TransportError> {
        tracing::debug!(url = %target, "Opening SSE stream");

        let response = self
            .client
            .get(target.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
            });
        }

        Ok(message_stream(response.bytes_stream()))
    }
}

/// Reduce a response byte stream to tagged transport messages.
///
/// Emits one [`TransportMessage::Frame`] per dispatched SSE event, an
/// [`TransportMessage::Error`] on a mid-stream read failure, and a final
/// [`TransportMessage::Closed`] when the body ends normally.
fn message_stream(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> TransportStream {
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut byte_stream = std::pin::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in decoder.feed(&bytes) {
                        yield TransportMessage::Frame(frame.data);
                    }
                }
                Err(e) => {
                    yield TransportMessage::Error(format!("stream read error: {e}"));
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            yield TransportMessage::Frame(frame.data);
        }
        yield TransportMessage::Closed;
    })
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn chunks(parts: &[&str]) -> Vec<Result<bytes::Bytes, reqwest::Error>> {
        parts
            .iter()
            .map(|p| Ok(bytes::Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    #[tokio::test]
    async fn body_chunks_become_frames_then_closed() {
        let body = chunks(&["data: {\"a\":1}\n", "\ndata: {\"a\":2}\n\n"]);
        let messages: Vec<_> = message_stream(stream::iter(body)).collect().await;

        assert_eq!(
            messages,
            vec![
                TransportMessage::Frame("{\"a\":1}".to_string()),
                TransportMessage::Frame("{\"a\":2}".to_string()),
                TransportMessage::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn unterminated_trailing_frame_is_flushed() {
        let body = chunks(&["data: {\"last\":true}"]);
        let messages: Vec<_> = message_stream(stream::iter(body)).collect().await;

        assert_eq!(
            messages,
            vec![
                TransportMessage::Frame("{\"last\":true}".to_string()),
                TransportMessage::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn keep_alive_only_body_yields_closed() {
        let body = chunks(&[": ping\n\n: ping\n\n"]);
        let messages: Vec<_> = message_stream(stream::iter(body)).collect().await;

        assert_eq!(messages, vec![TransportMessage::Closed]);
    }

    #[test]
    fn transport_construction() {
        assert!(SseTransport::new().is_ok());
        assert!(SseTransport::with_connect_timeout(Duration::from_secs(1)).is_ok());
    }
}
