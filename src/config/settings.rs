//! Application settings read from the environment (and `.env` via `dotenvy`).
//!
//! Remote sync is enabled purely by the presence of `REMOTE_STORE_URL`; the
//! backend is chosen once from this at startup.

use std::time::Duration;

use tracing::info;

use crate::errors::{Error, Result};

/// Default bound on any single remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default interval for the remote listener and the cross-process watcher.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default assistant model.
pub const DEFAULT_ASSISTANT_MODEL: &str = "gemma-3-4b-it";
/// Default assistant endpoint root.
pub const DEFAULT_ASSISTANT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Everything the service needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Local cache database URL
    pub database_url: String,
    /// Remote document store, if configured
    pub remote: Option<RemoteConfig>,
    /// Text assistant, if configured
    pub assistant: Option<AssistantConfig>,
    /// Timing knobs for sync
    pub sync: SyncConfig,
    /// Path of the TOML file holding the seed roster
    pub members_path: String,
}

/// Remote document store location.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Root URL; collections live directly below it
    pub base_url: String,
    /// Optional bearer token
    pub api_key: Option<String>,
}

/// Text assistant credentials.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// API key
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Endpoint root
    pub base_url: String,
}

/// Sync timing.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Bound on each remote call
    pub remote_timeout: Duration,
    /// Poll interval for listeners and watchers
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn millis(var: &str, default: Duration) -> Result<Duration> {
    match non_empty(var) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(Error::Config {
                message: format!("{var} must be greater than zero"),
            }),
            Ok(ms) => Ok(Duration::from_millis(ms)),
            Err(e) => Err(Error::Config {
                message: format!("{var} must be a whole number of milliseconds: {e}"),
            }),
        },
    }
}

impl AppConfig {
    /// Reads the configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let remote = non_empty("REMOTE_STORE_URL").map(|base_url| RemoteConfig {
            base_url,
            api_key: non_empty("REMOTE_STORE_API_KEY"),
        });
        let assistant = non_empty("ASSISTANT_API_KEY").map(|api_key| AssistantConfig {
            api_key,
            model: non_empty("ASSISTANT_MODEL")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_MODEL.to_string()),
            base_url: non_empty("ASSISTANT_URL")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_URL.to_string()),
        });
        let sync = SyncConfig {
            remote_timeout: millis("REMOTE_TIMEOUT_MS", DEFAULT_REMOTE_TIMEOUT)?,
            poll_interval: millis("SYNC_POLL_MS", DEFAULT_POLL_INTERVAL)?,
        };

        let config = Self {
            database_url: super::database::get_database_url(),
            remote,
            assistant,
            sync,
            members_path: non_empty("MEMBERS_CONFIG").unwrap_or_else(|| "config.toml".to_string()),
        };

        if config.remote.is_some() {
            info!("Remote store configured; running in remote mode");
        } else {
            info!("No remote store configured; running in local-only mode");
        }
        Ok(config)
    }
}
