//! Configuration file loading for the analysis service.
//!
//! Settings are read from `analysis.toml`; every field has a default, so an
//! absent file or an empty one yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::analyzer::{AnalysisLimits, MAX_GAME_POSITIONS, MAX_TACTICAL_MOVES};
use crate::cache::{DEFAULT_CAPACITY, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::engine::SessionTimeouts;

/// Search depth used when a request asks for depth 0.
pub const DEFAULT_DEPTH: u32 = 15;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Analysis service settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Engine executable. Defaults to "stockfish" (assumes it's in PATH).
    #[serde(default = "default_engine_path")]
    pub engine_path: String,
    /// Depth substituted for requests that pass 0.
    #[serde(default = "default_depth")]
    pub default_depth: u32,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// How long `isready` may go unanswered before the engine counts as down.
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Upper bound on a single search. Unbounded when absent.
    #[serde(default)]
    pub search_timeout_secs: Option<u64>,
    #[serde(default = "default_max_game_positions")]
    pub max_game_positions: usize,
    #[serde(default = "default_max_tactical_moves")]
    pub max_tactical_moves: usize,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_depth() -> u32 {
    DEFAULT_DEPTH
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_status_timeout_ms() -> u64 {
    2_000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_max_game_positions() -> usize {
    MAX_GAME_POSITIONS
}

fn default_max_tactical_moves() -> usize {
    MAX_TACTICAL_MOVES
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            default_depth: default_depth(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            status_timeout_ms: default_status_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            search_timeout_secs: None,
            max_game_positions: default_max_game_positions(),
            max_tactical_moves: default_max_tactical_moves(),
        }
    }
}

impl AnalysisConfig {
    /// Loads the configuration from [`Self::config_path()`].
    ///
    /// Returns the default configuration if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads the configuration from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Returns `analysis.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("analysis.toml")
    }

    /// Config with a different engine and everything else defaulted.
    pub fn with_engine_path(engine_path: impl Into<String>) -> Self {
        Self {
            engine_path: engine_path.into(),
            ..Self::default()
        }
    }

    /// Map a requested depth, treating 0 as "use the default".
    pub fn effective_depth(&self, depth: u32) -> u32 {
        if depth == 0 {
            self.default_depth
        } else {
            depth
        }
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            handshake: Some(Duration::from_millis(self.handshake_timeout_ms)),
            search: self.search_timeout_secs.map(Duration::from_secs),
            status: Duration::from_millis(self.status_timeout_ms),
        }
    }

    pub fn limits(&self) -> AnalysisLimits {
        AnalysisLimits {
            max_positions: self.max_game_positions,
            max_moves: self.max_tactical_moves,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Interval between background sweeps; `0` is treated as one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
