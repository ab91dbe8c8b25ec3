//! Unified error type for Ricochet.

use std::path::PathBuf;

use ricochet_protocol::ProtocolError;
use ricochet_room::RoomError;

/// Errors from reading or writing room snapshots.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The snapshot file (or its temp file) couldn't be read or written.
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot couldn't be encoded, or the file on disk is corrupt.
    #[error(transparent)]
    Codec(#[from] ProtocolError),

    /// The file was written by an incompatible version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Errors from loading or validating the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range, e.g. a zero interval.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RicochetError {
    /// A room-level error (not found, invalid solution, wrong phase).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An encode/decode error outside of persistence.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
