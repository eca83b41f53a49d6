//! Consumer Runtime
//!
//! The subscription lifecycle lives here:
//!
//! - [`client`]: the [`StreamConsumer`] driving start/stop/restart
//! - [`reconnect`]: exponential-backoff reconnection policy

pub mod client;
pub mod reconnect;

pub use client::{ConsumerSnapshot, StreamConsumer, StreamConsumerConfig, StreamUpdate};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
