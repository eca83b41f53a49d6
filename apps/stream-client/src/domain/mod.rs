//! Domain layer.
//!
//! Core types for the analysis-stream consumer with no I/O dependencies:
//! subscription parameters and the pure connection state machine.

pub mod consumer;
pub mod subscription;
