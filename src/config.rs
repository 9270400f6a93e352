//! Application-level configuration loading for the relay and its sessions.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{sync::SessionConfig, transport::TransportConfig};

/// Default location on disk where the relay looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RINGSIDE_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Competitor ids pre-seeded on the relay scoreboard.
    pub competitors: Vec<String>,
    /// Round length in seconds before any match configures one.
    pub default_duration_secs: u64,
    /// Best-of-N round count offered to operators by default.
    pub default_max_rounds: u32,
    /// Keep-alive ping cadence in milliseconds.
    pub ping_interval_ms: u64,
    /// Reconnect delay in milliseconds after a transport drop.
    pub reconnect_delay_ms: u64,
    /// Countdown tick cadence in milliseconds.
    pub tick_interval_ms: u64,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Transport tuning derived from this configuration.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }

    /// Session tuning derived from this configuration.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            default_duration_secs: self.default_duration_secs,
            ..SessionConfig::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            competitors: vec!["Chung".to_string(), "Hong".to_string()],
            default_duration_secs: 60,
            default_max_rounds: 3,
            ping_interval_ms: 30_000,
            reconnect_delay_ms: 3_000,
            tick_interval_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    competitors: Option<Vec<String>>,
    default_duration_secs: Option<u64>,
    default_max_rounds: Option<u32>,
    ping_interval_ms: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            competitors: raw
                .competitors
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.competitors),
            default_duration_secs: raw
                .default_duration_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.default_duration_secs),
            default_max_rounds: raw
                .default_max_rounds
                .filter(|rounds| *rounds > 0)
                .unwrap_or(defaults.default_max_rounds),
            ping_interval_ms: raw
                .ping_interval_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.ping_interval_ms),
            reconnect_delay_ms: raw
                .reconnect_delay_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.reconnect_delay_ms),
            tick_interval_ms: raw
                .tick_interval_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.tick_interval_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
