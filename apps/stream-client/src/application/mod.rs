//! Application layer.
//!
//! Port definitions that decouple the consumer runtime from any concrete
//! transport, so the state machine can be driven by fakes in tests.

pub mod ports;
