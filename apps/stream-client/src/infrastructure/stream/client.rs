//! Stream Consumer Runtime
//!
//! Drives one streaming subscription at a time: builds the request target
//! from the active [`SubscriptionParameters`], opens the transport, folds
//! transport messages into the [`ConsumerCore`], and broadcasts updates to
//! observers. Reconnection follows the configured [`ReconnectConfig`];
//! the default performs none.
//!
//! The consumer serializes all state mutation behind a [`parking_lot`]
//! lock and tags every subscription with a generation counter, so a task
//! from a replaced subscription can never write into the fresh log.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::application::ports::StreamTransport;
use crate::domain::consumer::{
    Applied, ConnectionState, ConsumerCore, Diagnostic, TransportMessage,
};
use crate::domain::subscription::SubscriptionParameters;
use crate::infrastructure::stream::reconnect::{ReconnectConfig, ReconnectPolicy};

/// Default capacity of the broadcast update channel.
const DEFAULT_UPDATE_CAPACITY: usize = 1024;

// =============================================================================
// Updates and Snapshots
// =============================================================================

/// Updates broadcast to observers of the consumer.
#[derive(Debug, Clone)]
pub enum StreamUpdate {
    /// A frame decoded and was appended to the log.
    Event(Value),
    /// The connection state changed.
    ///
    /// `State(Erroring)` is only broadcast when the attempt will not be
    /// retried; intermediate failures surface as [`StreamUpdate::Diagnostic`]
    /// followed by [`StreamUpdate::Reconnecting`].
    State(ConnectionState),
    /// A non-fatal problem was recorded.
    Diagnostic(Diagnostic),
    /// A reconnection attempt is about to start.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
    },
}

/// Point-in-time copy of the consumer's observable state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsumerSnapshot {
    /// Decoded events in arrival order.
    pub events: Vec<Value>,
    /// Current connection state.
    pub state: ConnectionState,
    /// Diagnostics recorded for the current subscription.
    pub diagnostics: Vec<Diagnostic>,
}

/// Configuration for the stream consumer.
#[derive(Debug, Clone)]
pub struct StreamConsumerConfig {
    /// Base URL of the analysis service.
    pub base_url: Url,
    /// Reconnection behavior.
    pub reconnect: ReconnectConfig,
    /// Capacity of the broadcast update channel.
    pub update_capacity: usize,
}

impl StreamConsumerConfig {
    /// Create a configuration with default reconnect and channel capacity.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            reconnect: ReconnectConfig::default(),
            update_capacity: DEFAULT_UPDATE_CAPACITY,
        }
    }
}

// =============================================================================
// Shared State
// =============================================================================

/// Core state plus the generation tag guarding against stale writers.
struct Shared {
    core: ConsumerCore,
    generation: u64,
}

/// One running subscription task.
struct ActiveSubscription {
    params: SubscriptionParameters,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

// =============================================================================
// Stream Consumer
// =============================================================================

/// Resilient consumer of the analysis event stream.
///
/// Manages the subscription lifecycle:
/// - start / stop / restart
/// - per-frame decode with non-fatal error handling
/// - optional reconnection with exponential backoff
pub struct StreamConsumer {
    config: StreamConsumerConfig,
    transport: Arc<dyn StreamTransport>,
    shared: Arc<RwLock<Shared>>,
    update_tx: broadcast::Sender<StreamUpdate>,
    active: Mutex<Option<ActiveSubscription>>,
}

impl StreamConsumer {
    /// Create a consumer over the given transport.
    #[must_use]
    pub fn new(config: StreamConsumerConfig, transport: Arc<dyn StreamTransport>) -> Self {
        let (update_tx, _) = broadcast::channel(config.update_capacity.max(1));
        Self {
            config,
            transport,
            shared: Arc::new(RwLock::new(Shared {
                core: ConsumerCore::new(),
                generation: 0,
            })),
            update_tx,
            active: Mutex::new(None),
        }
    }

    /// Subscribe to consumer updates.
    ///
    /// Slow receivers may observe [`broadcast::error::RecvError::Lagged`];
    /// the snapshot remains the authoritative state.
    #[must_use]
    pub fn updates(&self) -> broadcast::Receiver<StreamUpdate> {
        self.update_tx.subscribe()
    }

    /// Copy the current observable state.
    #[must_use]
    pub fn snapshot(&self) -> ConsumerSnapshot {
        let shared = self.shared.read();
        ConsumerSnapshot {
            events: shared.core.events(),
            state: shared.core.state(),
            diagnostics: shared.core.diagnostics(),
        }
    }

    /// Parameters of the running subscription, if any.
    #[must_use]
    pub fn active_parameters(&self) -> Option<SubscriptionParameters> {
        self.active.lock().as_ref().map(|a| a.params.clone())
    }

    /// Start a subscription with the given parameters.
    ///
    /// Any running subscription is cancelled first; its log and
    /// diagnostics are discarded before the new connection opens.
    pub fn start(&self, params: SubscriptionParameters) {
        let mut active = self.active.lock();
        Self::cancel_active(&mut active);

        let generation = {
            let mut shared = self.shared.write();
            shared.generation += 1;
            shared.core.begin_subscription();
            shared.generation
        };
        self.send(StreamUpdate::State(ConnectionState::Connecting));

        tracing::info!(
            instrument = %params.instrument,
            timeframe = %params.timeframe,
            setup_type = params.setup_type.as_str(),
            "Starting stream subscription"
        );

        let target = params.request_target(&self.config.base_url);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_subscription(SubscriptionTask {
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
            update_tx: self.update_tx.clone(),
            reconnect: self.config.reconnect.clone(),
            target,
            generation,
            cancel: cancel.clone(),
        }));

        *active = Some(ActiveSubscription {
            params,
            cancel,
            task,
        });
    }

    /// Stop the running subscription. Idempotent.
    ///
    /// Moves the state to [`ConnectionState::Closed`] and freezes the log.
    /// A second stop, or a stop with nothing running, changes nothing and
    /// broadcasts nothing.
    pub fn stop(&self) {
        let mut active = self.active.lock();
        if active.is_none() {
            return;
        }
        Self::cancel_active(&mut active);

        {
            let mut shared = self.shared.write();
            // Bump the generation so a still-draining task cannot write.
            shared.generation += 1;
            shared.core.mark_closed();
        }
        tracing::info!("Stream subscription stopped");
        self.send(StreamUpdate::State(ConnectionState::Closed));
    }

    /// Stop the running subscription and start a fresh one.
    pub fn restart(&self, params: SubscriptionParameters) {
        self.stop();
        self.start(params);
    }

    /// Restart only if `params` differ from the active subscription's.
    ///
    /// Returns `true` if a restart happened.
    pub fn reconfigure(&self, params: SubscriptionParameters) -> bool {
        let unchanged = self
            .active
            .lock()
            .as_ref()
            .is_some_and(|a| a.params == params);
        if unchanged {
            tracing::debug!("Subscription parameters unchanged; keeping current stream");
            return false;
        }
        self.restart(params);
        true
    }

    fn cancel_active(active: &mut Option<ActiveSubscription>) {
        if let Some(previous) = active.take() {
            previous.cancel.cancel();
            previous.task.abort();
        }
    }

    fn send(&self, update: StreamUpdate) {
        // Errors only mean no receiver is currently subscribed.
        let _ = self.update_tx.send(update);
    }
}

// =============================================================================
// Subscription Task
// =============================================================================

/// Everything one spawned subscription task needs.
struct SubscriptionTask {
    transport: Arc<dyn StreamTransport>,
    shared: Arc<RwLock<Shared>>,
    update_tx: broadcast::Sender<StreamUpdate>,
    reconnect: ReconnectConfig,
    target: Url,
    generation: u64,
    cancel: CancellationToken,
}

/// Outcome of one connection attempt.
enum Attempt {
    /// The server ended the stream normally.
    Completed,
    /// The transport failed before or during the stream.
    Failed,
    /// The task was cancelled.
    Cancelled,
}

impl SubscriptionTask {
    /// Broadcast an update; send failures only mean nobody is listening.
    fn send(&self, update: StreamUpdate) {
        let _ = self.update_tx.send(update);
    }

    /// True while this task's generation still owns the shared core.
    fn is_current(&self) -> bool {
        self.shared.read().generation == self.generation
    }
}

/// Connection loop for one subscription: attempt, then consult the
/// reconnect policy on failure.
async fn run_subscription(task: SubscriptionTask) {
    let mut policy = ReconnectPolicy::new(task.reconnect.clone());

    loop {
        if task.cancel.is_cancelled() || !task.is_current() {
            return;
        }

        match attempt_stream(&task, &mut policy).await {
            Attempt::Completed => {
                tracing::info!("Stream ended");
                if task.is_current() {
                    task.send(StreamUpdate::State(ConnectionState::Closed));
                }
                return;
            }
            Attempt::Cancelled => return,
            Attempt::Failed => {
                if let Some(delay) = policy.next_delay() {
                    let attempt = policy.attempt_count();
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Reconnecting to stream"
                    );
                    metrics::counter!("eruditefx_stream_reconnects_total").increment(1);
                    task.send(StreamUpdate::Reconnecting { attempt });

                    tokio::select! {
                        () = task.cancel.cancelled() => return,
                        () = tokio::time::sleep(delay) => {}
                    }

                    {
                        let mut shared = task.shared.write();
                        if shared.generation != task.generation {
                            return;
                        }
                        shared.core.mark_connecting();
                    }
                    task.send(StreamUpdate::State(ConnectionState::Connecting));
                } else {
                    tracing::error!("Stream failed and will not be retried");
                    if task.is_current() {
                        task.send(StreamUpdate::State(ConnectionState::Erroring));
                    }
                    return;
                }
            }
        }
    }
}

/// Open the transport once and fold its messages until it ends.
async fn attempt_stream(task: &SubscriptionTask, policy: &mut ReconnectPolicy) -> Attempt {
    let mut stream = match task.transport.open(&task.target).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open stream");
            metrics::counter!("eruditefx_stream_transport_errors_total").increment(1);
            let diagnostic = {
                let mut shared = task.shared.write();
                if shared.generation != task.generation {
                    return Attempt::Cancelled;
                }
                shared.core.record_transport_failure(e.to_string())
            };
            task.send(StreamUpdate::Diagnostic(diagnostic));
            return Attempt::Failed;
        }
    };

    loop {
        let message = tokio::select! {
            () = task.cancel.cancelled() => return Attempt::Cancelled,
            message = futures_util::StreamExt::next(&mut stream) => message,
        };

        let Some(message) = message else {
            // Transport streams end with an explicit Closed; a bare end of
            // stream is treated the same way.
            let mut shared = task.shared.write();
            if shared.generation != task.generation {
                return Attempt::Cancelled;
            }
            let _ = shared.core.apply(TransportMessage::Closed);
            return Attempt::Completed;
        };

        let applied = {
            let mut shared = task.shared.write();
            if shared.generation != task.generation {
                return Attempt::Cancelled;
            }
            shared.core.apply(message)
        };

        match applied {
            Applied::Event { value, newly_open } => {
                metrics::counter!("eruditefx_stream_frames_total").increment(1);
                if newly_open {
                    policy.reset();
                    task.send(StreamUpdate::State(ConnectionState::Open));
                }
                task.send(StreamUpdate::Event(value));
            }
            Applied::DecodeFailure(diagnostic) => {
                tracing::warn!(detail = %diagnostic.detail, "Dropped undecodable frame");
                metrics::counter!("eruditefx_stream_decode_errors_total").increment(1);
                task.send(StreamUpdate::Diagnostic(diagnostic));
            }
            Applied::TransportFailure(diagnostic) => {
                tracing::warn!(detail = %diagnostic.detail, "Stream transport failed");
                metrics::counter!("eruditefx_stream_transport_errors_total").increment(1);
                task.send(StreamUpdate::Diagnostic(diagnostic));
                return Attempt::Failed;
            }
            Applied::StreamEnded => return Attempt::Completed,
            Applied::Ignored => {}
        }
    }
}
