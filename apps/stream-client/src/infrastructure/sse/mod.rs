//! Server-Sent-Event Transport
//!
//! Wire-level handling for the analysis stream:
//!
//! - [`decoder`]: incremental SSE frame decoder, fed with raw byte chunks
//! - [`transport`]: `reqwest`-based [`StreamTransport`] implementation
//!
//! [`StreamTransport`]: crate::application::ports::StreamTransport

pub mod decoder;
pub mod transport;

pub use decoder::{SseDecoder, SseFrame};
pub use transport::SseTransport;
