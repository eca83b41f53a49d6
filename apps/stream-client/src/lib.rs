#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! EruditeFX Stream Client - Resilient Analysis-Stream Consumer
//!
//! Consumes the server-sent-event stream of the EruditeFX analysis API:
//! one subscription at a time, an append-only log of decoded JSON events,
//! and explicit connection-state tracking. Malformed frames are dropped
//! with a diagnostic; transport failures end the attempt and, when
//! configured, trigger reconnection with exponential backoff.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure consumer logic, no I/O
//!   - `consumer`: connection state machine, event log, diagnostics
//!   - `subscription`: subscription parameters and request-target encoding
//!
//! - **Application**: Port definitions
//!   - `ports`: the [`StreamTransport`] seam between runtime and wire
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `sse`: SSE wire decoder and `reqwest` transport
//!   - `stream`: the [`StreamConsumer`] runtime and reconnect policy
//!   - `config`: environment-variable configuration
//!   - `telemetry`: tracing setup
//!   - `metrics`: Prometheus counters
//!
//! # Data Flow
//!
//! ```text
//! HTTP SSE body ──► SseDecoder ──► TransportMessage ──► ConsumerCore
//!                                                          │
//!                                            event log, state, diagnostics
//!                                                          │
//!                                                  broadcast updates
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure consumer types with no external I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::consumer::{
    Applied, ConnectionState, ConsumerCore, Diagnostic, DiagnosticKind, EventLog,
    TransportMessage,
};
pub use domain::subscription::{Provider, SetupType, SubscriptionParameters};

// Application ports
pub use application::ports::{StreamTransport, TransportError, TransportStream};

// Consumer runtime
pub use infrastructure::stream::{
    ConsumerSnapshot, ReconnectConfig, ReconnectPolicy, StreamConsumer, StreamConsumerConfig,
    StreamUpdate,
};

// SSE transport
pub use infrastructure::sse::{SseDecoder, SseFrame, SseTransport};

// Configuration
pub use infrastructure::config::{ClientConfig, ConfigError};

// Metrics
pub use infrastructure::metrics::{get_metrics_handle, init_metrics};

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
