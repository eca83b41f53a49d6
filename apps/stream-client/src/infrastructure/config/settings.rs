//! Client Configuration Settings
//!
//! Configuration for the stream client, loaded from `ERUDITEFX_*`
//! environment variables.

use std::time::Duration;

use url::Url;

use crate::domain::subscription::{Provider, SetupType, SubscriptionParameters};
use crate::infrastructure::stream::ReconnectConfig;

/// Default instrument when `ERUDITEFX_INSTRUMENT` is unset.
const DEFAULT_INSTRUMENT: &str = "EUR/USD";

/// Default timeframe when `ERUDITEFX_TIMEFRAME` is unset.
const DEFAULT_TIMEFRAME: &str = "5M";

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the analysis service.
    pub base_url: Url,
    /// Subscription parameters for the initial stream.
    pub parameters: SubscriptionParameters,
    /// Reconnection settings.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// Required: `ERUDITEFX_BASE_URL`, `ERUDITEFX_SETUP_TYPE`. Everything
    /// else falls back to a default; malformed required values fail
    /// loading rather than being silently replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing, empty, or
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = required_env("ERUDITEFX_BASE_URL")?;
        let base_url = Url::parse(&base_url).map_err(|_| ConfigError::InvalidValue {
            key: "ERUDITEFX_BASE_URL".to_string(),
            value: base_url,
        })?;

        let setup_raw = required_env("ERUDITEFX_SETUP_TYPE")?;
        let setup_type = SetupType::from_str_case_insensitive(&setup_raw).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "ERUDITEFX_SETUP_TYPE".to_string(),
                value: setup_raw,
            }
        })?;

        let provider = match std::env::var("ERUDITEFX_PROVIDER") {
            Ok(raw) => {
                Provider::from_str_case_insensitive(&raw).ok_or(ConfigError::InvalidValue {
                    key: "ERUDITEFX_PROVIDER".to_string(),
                    value: raw,
                })?
            }
            Err(_) => Provider::default(),
        };

        let parameters = SubscriptionParameters {
            instrument: parse_env_string("ERUDITEFX_INSTRUMENT", DEFAULT_INSTRUMENT),
            timeframe: parse_env_string("ERUDITEFX_TIMEFRAME", DEFAULT_TIMEFRAME),
            setup_type,
            generate_image: parse_env_bool("ERUDITEFX_GENERATE_IMAGE", true),
            generate_pdf: parse_env_bool("ERUDITEFX_GENERATE_PDF", true),
            provider,
        };

        let reconnect_defaults = ReconnectConfig::default();
        let reconnect = ReconnectConfig {
            initial_delay: parse_env_duration_millis(
                "ERUDITEFX_RECONNECT_DELAY_INITIAL_MS",
                reconnect_defaults.initial_delay,
            ),
            max_delay: parse_env_duration_secs(
                "ERUDITEFX_RECONNECT_DELAY_MAX_SECS",
                reconnect_defaults.max_delay,
            ),
            multiplier: parse_env_f64(
                "ERUDITEFX_RECONNECT_DELAY_MULTIPLIER",
                reconnect_defaults.multiplier,
            ),
            jitter_factor: reconnect_defaults.jitter_factor,
            max_attempts: parse_env_u32(
                "ERUDITEFX_RECONNECT_MAX_ATTEMPTS",
                reconnect_defaults.max_attempts,
            ),
        };

        Ok(Self {
            base_url,
            parameters,
            reconnect,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unparseable value.
    #[error("environment variable {key} has invalid value: {value:?}")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
