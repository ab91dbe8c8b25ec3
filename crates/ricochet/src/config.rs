//! Server configuration, loaded from a TOML file.
//!
//! Every section and field is optional; anything missing keeps its
//! default. A minimal file:
//!
//! ```toml
//! [rooms]
//! reconnect_grace_secs = 45
//!
//! [persistence]
//! snapshot_path = "/var/lib/ricochet/rooms.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ricochet_room::RoomConfig;
use serde::Deserialize;

use crate::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub rooms: RoomsConfig,
    pub persistence: PersistenceConfig,
    pub log: LogConfig,
}

/// Room limits and the reconnect grace period.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub reconnect_grace_secs: u64,
    pub max_players: usize,
    pub max_name_len: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        let defaults = RoomConfig::default();
        Self {
            reconnect_grace_secs: defaults.reconnect_grace.as_secs(),
            max_players: defaults.max_players,
            max_name_len: defaults.max_name_len,
        }
    }
}

/// Snapshotting and stale-room cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// When false, nothing is loaded at startup or written afterwards.
    pub enabled: bool,
    pub snapshot_path: PathBuf,
    /// Also the stale-room sweep interval.
    pub snapshot_interval_secs: u64,
    /// Rooms idle for longer than this are purged.
    pub max_room_age_secs: u64,
}

impl PersistenceConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn max_room_age_ms(&self) -> u64 {
        self.max_room_age_secs.saturating_mul(1_000)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_path: PathBuf::from("data/rooms.json"),
            snapshot_interval_secs: 60,
            max_room_age_secs: 24 * 60 * 60,
        }
    }
}

/// Logging defaults. `RUST_LOG` wins over `filter` when set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or wrongly typed
    /// values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a config file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file exists but can't be read,
    /// or [`ConfigError::Parse`] if it isn't valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content)?;
                tracing::info!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Rejects values the server can't run with.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rooms.max_players == 0 {
            return Err(ConfigError::Invalid("rooms.max_players must be > 0".into()));
        }
        if self.rooms.max_name_len == 0 {
            return Err(ConfigError::Invalid("rooms.max_name_len must be > 0".into()));
        }
        if self.persistence.enabled {
            if self.persistence.snapshot_interval_secs == 0 {
                return Err(ConfigError::Invalid(
                    "persistence.snapshot_interval_secs must be > 0".into(),
                ));
            }
            if self.persistence.snapshot_path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "persistence.snapshot_path must not be empty".into(),
                ));
            }
        }
        if self.rooms.reconnect_grace_secs == 0 {
            tracing::warn!(
                "rooms.reconnect_grace_secs is 0, disconnected players are removed at once"
            );
        }
        Ok(())
    }

    /// The room-layer view of this config.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            reconnect_grace: Duration::from_secs(self.rooms.reconnect_grace_secs),
            max_players: self.rooms.max_players,
            max_name_len: self.rooms.max_name_len,
        }
    }
}
