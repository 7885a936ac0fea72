//! Daemon configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! environment variables, then command-line flags (applied in `main`).
//!
//! ```toml
//! [timing]
//! start_buffer_ms = 1500
//! duration_ms = 25000
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 200
//! max_delay_ms = 2000
//!
//! [server]
//! port = 8080
//! data_dir = "/var/lib/roundcast"
//! event_capacity = 64
//! ```

use std::path::{Path, PathBuf};

use roundcast_scheduler::{RetryConfig, RoundTiming};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundcastConfig {
    pub timing: RoundTiming,
    pub retry: RetryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Events a slow SSE listener may fall behind before losing the oldest.
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("/var/lib/roundcast"),
            event_capacity: 64,
        }
    }
}

impl RoundcastConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RoundcastConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.sanitized())
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// A timing variable that is set but not a positive number resets that
    /// value to its default, and one above `MAX_TIMING_MS` is capped. An
    /// unparsable port is ignored.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("ROUND_START_BUFFER_MS") {
            self.timing.start_buffer_ms = RoundTiming::from_raw(Some(&raw), None).start_buffer_ms;
        }
        if let Some(raw) = lookup("ROUND_DURATION_MS") {
            self.timing.duration_ms = RoundTiming::from_raw(None, Some(&raw)).duration_ms;
        }
        if let Some(raw) = lookup("ROUNDCAST_PORT") {
            match raw.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %raw, "ignoring invalid ROUNDCAST_PORT"),
            }
        }
        if let Some(raw) = lookup("ROUNDCAST_DATA_DIR") {
            self.server.data_dir = PathBuf::from(raw);
        }
        self
    }

    pub fn sanitized(mut self) -> Self {
        self.timing = self.timing.sanitized();
        self
    }
}
