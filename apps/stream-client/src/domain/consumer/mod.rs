//! Consumer State Machine
//!
//! Pure, transport-free core of the stream consumer. The transport layer
//! reduces whatever it reads to tagged [`TransportMessage`]s; this module
//! folds them into connection state, an append-only event log, and a
//! diagnostics trail. No I/O happens here, which keeps the full state
//! machine testable with an injected message sequence.
//!
//! # State machine
//!
//! ```text
//! Idle -> Connecting -> Open <-> Erroring -> Closed
//! ```
//!
//! `Connecting -> Erroring` occurs when the transport fails before the
//! first frame. `Closed` is terminal for one subscription; a fresh
//! subscription starts over from `Connecting`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Maximum number of raw-frame characters preserved in a diagnostic.
const DIAGNOSTIC_EXCERPT_LEN: usize = 120;

// =============================================================================
// Types
// =============================================================================

/// Lifecycle state of one streaming subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No subscription has been started.
    #[default]
    Idle,
    /// Transport is being opened.
    Connecting,
    /// Frames are flowing.
    Open,
    /// The transport failed; the current attempt is dead.
    Erroring,
    /// The subscription ended (server close or caller stop).
    Closed,
}

impl ConnectionState {
    /// Get the state name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Erroring => "erroring",
            Self::Closed => "closed",
        }
    }

    /// Check whether this state ends the subscription.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Tagged message emitted by a transport.
///
/// This is the only interface between the transport layer and the state
/// machine, so tests can drive the consumer from an in-memory sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    /// One frame's data payload, expected to be UTF-8 JSON.
    Frame(String),
    /// Connection-level failure with a human-readable reason.
    Error(String),
    /// The stream ended normally.
    Closed,
}

/// Classification of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// A single frame failed to decode; the subscription continued.
    Decode,
    /// The transport failed; the connection attempt died.
    Transport,
}

/// A non-escalated notice surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// Error detail, including a frame excerpt for decode failures.
    pub detail: String,
    /// When the diagnostic was recorded.
    pub at: DateTime<Utc>,
}

impl Diagnostic {
    /// Record a per-frame decode failure.
    #[must_use]
    pub fn decode(detail: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Decode,
            detail: detail.into(),
            at: Utc::now(),
        }
    }

    /// Record a connection-level transport failure.
    #[must_use]
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Transport,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

/// Append-only sequence of decoded events for one subscription.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Value>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append a decoded event, preserving arrival order.
    pub fn push(&mut self, event: Value) {
        self.events.push(event);
    }

    /// Number of events in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Borrow the events in arrival order.
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.events
    }

    /// Clone the events into an owned snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.events.clone()
    }

    /// Drop all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// =============================================================================
// Transition Outcomes
// =============================================================================

/// Result of folding one [`TransportMessage`] into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A frame decoded and was appended to the log.
    Event {
        /// The decoded payload.
        value: Value,
        /// Whether this frame moved the state to [`ConnectionState::Open`].
        newly_open: bool,
    },
    /// A frame failed to decode and was dropped; not fatal.
    DecodeFailure(Diagnostic),
    /// The transport failed; the current attempt is over.
    TransportFailure(Diagnostic),
    /// The server ended the stream normally.
    StreamEnded,
    /// The message arrived after the subscription closed and was dropped.
    Ignored,
}

// =============================================================================
// Consumer Core
// =============================================================================

/// State-owning core of the stream consumer.
///
/// Owns the event log, the diagnostics trail, and the connection state for
/// exactly one subscription at a time. Callers only ever see cloned
/// snapshots; the owning consumer serializes all mutation.
#[derive(Debug, Default)]
pub struct ConsumerCore {
    state: ConnectionState,
    log: EventLog,
    diagnostics: Vec<Diagnostic>,
}

impl ConsumerCore {
    /// Create a core in the [`ConnectionState::Idle`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Snapshot of the event log in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.log.snapshot()
    }

    /// Number of events accumulated so far.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.log.len()
    }

    /// Snapshot of recorded diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.clone()
    }

    /// Begin a fresh subscription: clear the log and diagnostics and move
    /// to [`ConnectionState::Connecting`].
    ///
    /// The log is emptied here, before any frame of the new subscription
    /// can arrive.
    pub fn begin_subscription(&mut self) {
        self.log.clear();
        self.diagnostics.clear();
        self.state = ConnectionState::Connecting;
    }

    /// Mark a reconnection attempt after a transport failure.
    pub fn mark_connecting(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Close the subscription from the caller side. Idempotent.
    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Record a failure to open the transport.
    ///
    /// Equivalent to applying [`TransportMessage::Error`]; returns the
    /// recorded diagnostic.
    pub fn record_transport_failure(&mut self, detail: impl Into<String>) -> Diagnostic {
        let diagnostic = Diagnostic::transport(detail);
        self.diagnostics.push(diagnostic.clone());
        self.state = ConnectionState::Erroring;
        diagnostic
    }

    /// Fold one transport message into the core.
    pub fn apply(&mut self, message: TransportMessage) -> Applied {
        if self.state == ConnectionState::Closed {
            return Applied::Ignored;
        }

        match message {
            TransportMessage::Frame(raw) => self.apply_frame(&raw),
            TransportMessage::Error(reason) => {
                Applied::TransportFailure(self.record_transport_failure(reason))
            }
            TransportMessage::Closed => {
                self.state = ConnectionState::Closed;
                Applied::StreamEnded
            }
        }
    }

    /// Decode one frame; append on success, record a diagnostic on failure.
    fn apply_frame(&mut self, raw: &str) -> Applied {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                let newly_open = self.state != ConnectionState::Open;
                self.state = ConnectionState::Open;
                self.log.push(value.clone());
                Applied::Event { value, newly_open }
            }
            Err(e) => {
                let diagnostic =
                    Diagnostic::decode(format!("frame decode failed: {e}: {}", excerpt(raw)));
                self.diagnostics.push(diagnostic.clone());
                Applied::DecodeFailure(diagnostic)
            }
        }
    }
}

/// Truncate a raw frame for inclusion in a diagnostic.
fn excerpt(raw: &str) -> String {
    if raw.chars().count() <= DIAGNOSTIC_EXCERPT_LEN {
        raw.to_string()
    } else {
        let cut: String = raw.chars().take(DIAGNOSTIC_EXCERPT_LEN).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn open_core() -> ConsumerCore {
        let mut core = ConsumerCore::new();
        core.begin_subscription();
        core
    }

    #[test]
    fn starts_idle() {
        let core = ConsumerCore::new();
        assert_eq!(core.state(), ConnectionState::Idle);
        assert!(core.events().is_empty());
        assert!(core.diagnostics().is_empty());
    }

    #[test]
    fn begin_subscription_moves_to_connecting() {
        let mut core = ConsumerCore::new();
        core.begin_subscription();
        assert_eq!(core.state(), ConnectionState::Connecting);
    }

    #[test]
    fn first_frame_opens_the_connection() {
        let mut core = open_core();
        let applied = core.apply(TransportMessage::Frame(r#"{"a":1}"#.to_string()));

        assert_eq!(core.state(), ConnectionState::Open);
        assert!(matches!(applied, Applied::Event { newly_open: true, .. }));
    }

    #[test]
    fn subsequent_frames_are_not_newly_open() {
        let mut core = open_core();
        core.apply(TransportMessage::Frame(r#"{"a":1}"#.to_string()));
        let applied = core.apply(TransportMessage::Frame(r#"{"a":2}"#.to_string()));

        assert!(matches!(applied, Applied::Event { newly_open: false, .. }));
    }

    #[test]
    fn frames_append_in_arrival_order() {
        let mut core = open_core();
        for i in 0..5 {
            core.apply(TransportMessage::Frame(format!(r#"{{"seq":{i}}}"#)));
        }

        let events = core.events();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event["seq"], json!(i));
        }
    }

    #[test]
    fn malformed_frame_is_dropped_not_fatal() {
        let mut core = open_core();
        core.apply(TransportMessage::Frame(r#"{"a":1}"#.to_string()));
        let applied = core.apply(TransportMessage::Frame("not-json".to_string()));
        core.apply(TransportMessage::Frame(r#"{"a":2}"#.to_string()));

        assert!(matches!(applied, Applied::DecodeFailure(_)));
        assert_eq!(core.state(), ConnectionState::Open);
        assert_eq!(core.events(), vec![json!({"a": 1}), json!({"a": 2})]);

        let diagnostics = core.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Decode);
        assert!(diagnostics[0].detail.contains("not-json"));
    }

    #[test]
    fn transport_error_before_first_frame() {
        let mut core = open_core();
        let applied = core.apply(TransportMessage::Error("connection refused".to_string()));

        assert_eq!(core.state(), ConnectionState::Erroring);
        assert!(matches!(applied, Applied::TransportFailure(_)));
        assert_eq!(core.diagnostics()[0].kind, DiagnosticKind::Transport);
    }

    #[test]
    fn transport_error_freezes_the_log() {
        let mut core = open_core();
        core.apply(TransportMessage::Frame(r#"{"a":1}"#.to_string()));
        core.apply(TransportMessage::Error("reset by peer".to_string()));

        assert_eq!(core.state(), ConnectionState::Erroring);
        assert_eq!(core.events(), vec![json!({"a": 1})]);
    }

    #[test]
    fn reconnected_frame_reopens_after_error() {
        let mut core = open_core();
        core.apply(TransportMessage::Error("reset by peer".to_string()));
        core.mark_connecting();
        let applied = core.apply(TransportMessage::Frame(r#"{"a":1}"#.to_string()));

        assert_eq!(core.state(), ConnectionState::Open);
        assert!(matches!(applied, Applied::Event { newly_open: true, .. }));
    }

    #[test]
    fn closed_is_terminal_for_messages() {
        let mut core = open_core();
        core.apply(TransportMessage::Closed);
        assert_eq!(core.state(), ConnectionState::Closed);

        let applied = core.apply(TransportMessage::Frame(r#"{"late":true}"#.to_string()));
        assert_eq!(applied, Applied::Ignored);
        assert!(core.events().is_empty());
    }

    #[test]
    fn mark_closed_is_idempotent() {
        let mut core = open_core();
        core.apply(TransportMessage::Frame(r#"{"a":1}"#.to_string()));
        core.mark_closed();
        let events = core.events();
        let diagnostics = core.diagnostics();

        core.mark_closed();
        assert_eq!(core.state(), ConnectionState::Closed);
        assert_eq!(core.events(), events);
        assert_eq!(core.diagnostics(), diagnostics);
    }

    #[test]
    fn mark_connecting_does_not_resurrect_closed() {
        let mut core = open_core();
        core.mark_closed();
        core.mark_connecting();
        assert_eq!(core.state(), ConnectionState::Closed);
    }

    #[test]
    fn begin_subscription_resets_log_and_diagnostics() {
        let mut core = open_core();
        core.apply(TransportMessage::Frame(r#"{"a":1}"#.to_string()));
        core.apply(TransportMessage::Frame("junk".to_string()));

        core.begin_subscription();
        assert!(core.events().is_empty());
        assert!(core.diagnostics().is_empty());
        assert_eq!(core.state(), ConnectionState::Connecting);
    }

    #[test]
    fn mixed_valid_and_garbage_frames() {
        let mut core = open_core();
        for raw in [r#"{"a":1}"#, "not-json", r#"{"a":2}"#] {
            core.apply(TransportMessage::Frame(raw.to_string()));
        }

        assert_eq!(core.events(), vec![json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(core.state(), ConnectionState::Open);
        assert_eq!(core.diagnostics().len(), 1);
    }

    #[test]
    fn diagnostic_excerpt_is_truncated() {
        let mut core = open_core();
        let long = "x".repeat(500);
        core.apply(TransportMessage::Frame(long));

        let detail = &core.diagnostics()[0].detail;
        assert!(detail.len() < 300);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn connection_state_names() {
        assert_eq!(ConnectionState::Idle.as_str(), "idle");
        assert_eq!(ConnectionState::Erroring.as_str(), "erroring");
        assert!(ConnectionState::Closed.is_terminal());
        assert!(!ConnectionState::Open.is_terminal());
    }

    /// A frame that is either valid JSON carrying a marker, or garbage.
    #[derive(Debug, Clone)]
    enum TestFrame {
        Valid(u64),
        Garbage,
    }

    fn frame_strategy() -> impl Strategy<Value = TestFrame> {
        prop_oneof![
            any::<u64>().prop_map(TestFrame::Valid),
            Just(TestFrame::Garbage),
        ]
    }

    proptest! {
        /// Valid frames appear in the log in arrival order; garbage frames
        /// are absent and do not perturb any other frame's position.
        #[test]
        fn log_preserves_valid_frames_in_order(frames in prop::collection::vec(frame_strategy(), 0..64)) {
            let mut core = open_core();

            let mut expected = Vec::new();
            let mut garbage = 0usize;
            for frame in &frames {
                match frame {
                    TestFrame::Valid(n) => {
                        core.apply(TransportMessage::Frame(format!(r#"{{"n":{n}}}"#)));
                        expected.push(json!({"n": n}));
                    }
                    TestFrame::Garbage => {
                        core.apply(TransportMessage::Frame("{broken".to_string()));
                        garbage += 1;
                    }
                }
            }

            prop_assert_eq!(core.events(), expected);
            prop_assert_eq!(core.diagnostics().len(), garbage);
        }
    }
}
