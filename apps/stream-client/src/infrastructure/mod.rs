//! Infrastructure layer.
//!
//! Adapters and external integrations: the SSE wire decoder and HTTP
//! transport, the consumer runtime, configuration, telemetry, and metrics.

pub mod config;
pub mod metrics;
pub mod sse;
pub mod stream;
pub mod telemetry;
