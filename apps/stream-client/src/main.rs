//! EruditeFX Stream Client Binary
//!
//! Subscribes to the analysis stream and prints decoded events until the
//! stream ends, fails terminally, or a shutdown signal arrives.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin eruditefx-stream-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ERUDITEFX_BASE_URL`: Base URL of the analysis service
//! - `ERUDITEFX_SETUP_TYPE`: scalp | intraday | swing
//!
//! ## Optional
//! - `ERUDITEFX_INSTRUMENT`: Instrument symbol (default: EUR/USD)
//! - `ERUDITEFX_TIMEFRAME`: Chart timeframe (default: 5M)
//! - `ERUDITEFX_GENERATE_IMAGE`: true | false (default: true)
//! - `ERUDITEFX_GENERATE_PDF`: true | false (default: true)
//! - `ERUDITEFX_PROVIDER`: te | static (default: te)
//! - `ERUDITEFX_RECONNECT_MAX_ATTEMPTS`: Reconnect budget, 0 disables (default: 0)
//! - `ERUDITEFX_RECONNECT_DELAY_INITIAL_MS`: First reconnect delay (default: 1000)
//! - `ERUDITEFX_RECONNECT_DELAY_MAX_SECS`: Delay cap (default: 30)
//! - `ERUDITEFX_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use eruditefx_stream_client::infrastructure::telemetry;
use eruditefx_stream_client::{
    ClientConfig, ConnectionState, SseTransport, StreamConsumer, StreamConsumerConfig,
    StreamUpdate, init_metrics,
};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    telemetry::init();

    tracing::info!("Starting EruditeFX stream client");

    let _metrics_handle = init_metrics();

    let config = ClientConfig::from_env()?;
    log_config(&config);

    let transport = Arc::new(SseTransport::new()?);
    let mut consumer_config = StreamConsumerConfig::new(config.base_url);
    consumer_config.reconnect = config.reconnect;
    let consumer = StreamConsumer::new(consumer_config, transport);

    let mut updates = consumer.updates();
    consumer.start(config.parameters);

    loop {
        tokio::select! {
            () = await_shutdown() => {
                tracing::info!("Shutdown signal received");
                consumer.stop();
                break;
            }
            update = updates.recv() => match update {
                Ok(StreamUpdate::Event(event)) => {
                    match serde_json::to_string_pretty(&event) {
                        Ok(rendered) => println!("{rendered}"),
                        Err(e) => tracing::warn!(error = %e, "Failed to render event"),
                    }
                }
                Ok(StreamUpdate::State(state)) => {
                    tracing::info!(state = state.as_str(), "Connection state changed");
                    if matches!(state, ConnectionState::Closed | ConnectionState::Erroring) {
                        break;
                    }
                }
                Ok(StreamUpdate::Diagnostic(diagnostic)) => {
                    tracing::warn!(
                        kind = ?diagnostic.kind,
                        detail = %diagnostic.detail,
                        "Stream diagnostic"
                    );
                }
                Ok(StreamUpdate::Reconnecting { attempt }) => {
                    tracing::info!(attempt, "Reconnecting");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Update receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    let snapshot = consumer.snapshot();
    tracing::info!(
        events = snapshot.events.len(),
        diagnostics = snapshot.diagnostics.len(),
        state = snapshot.state.as_str(),
        "Stream client stopped"
    );
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        base_url = %config.base_url,
        instrument = %config.parameters.instrument,
        timeframe = %config.parameters.timeframe,
        setup_type = config.parameters.setup_type.as_str(),
        provider = config.parameters.provider.as_str(),
        reconnect_attempts = config.reconnect.max_attempts,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
