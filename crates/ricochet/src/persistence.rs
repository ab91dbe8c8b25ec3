//! Room snapshots on disk.
//!
//! The whole room table is written as one JSON document:
//!
//! ```text
//! { "version": 1, "saved_at": 1718000000000, "rooms": [ ... ] }
//! ```
//!
//! Writes go to `<path>.tmp` first and are then renamed over `<path>`, so
//! a crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use ricochet_protocol::{unix_millis, Codec, JsonCodec, RoomId};
use ricochet_room::{GameModel, Room};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::PersistenceConfig;
use crate::{EventBroadcaster, PersistenceError, RoomService};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The on-disk document.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Snapshot<G: GameModel> {
    pub version: u32,
    /// Unix millis when the snapshot was taken.
    pub saved_at: u64,
    pub rooms: Vec<Room<G>>,
}

/// Saves and restores the service's rooms and sweeps stale ones.
pub struct PersistenceManager<G: GameModel, B: EventBroadcaster> {
    service: RoomService<G, B>,
    config: PersistenceConfig,
    codec: JsonCodec,
}

impl<G: GameModel, B: EventBroadcaster> PersistenceManager<G, B> {
    pub fn new(service: RoomService<G, B>, config: PersistenceConfig) -> Self {
        Self {
            service,
            config,
            codec: JsonCodec,
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.config.snapshot_path
    }

    /// Writes every room to the snapshot file. Returns the room count.
    ///
    /// # Errors
    /// [`PersistenceError::Io`] or [`PersistenceError::Codec`]. The
    /// previous snapshot is left in place on error.
    pub async fn save(&self) -> Result<usize, PersistenceError> {
        let snapshot = Snapshot::<G> {
            version: SNAPSHOT_VERSION,
            saved_at: unix_millis(),
            rooms: self.service.repository().snapshot().await,
        };
        let count = snapshot.rooms.len();
        let bytes = self.codec.encode(&snapshot)?;

        let path = self.snapshot_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| io_error(parent, source))?;
        }
        let temp = temp_path(path);
        fs::write(&temp, &bytes).await.map_err(|source| io_error(&temp, source))?;
        fs::rename(&temp, path).await.map_err(|source| io_error(path, source))?;

        tracing::info!(
            path = %path.display(),
            rooms = count,
            bytes = bytes.len(),
            "snapshot saved"
        );
        Ok(count)
    }

    /// Restores rooms from the snapshot file, skipping any that are
    /// already stale, and re-arms grace timers for disconnected players.
    /// A missing file is a fresh start. Returns how many rooms were
    /// restored.
    ///
    /// # Errors
    /// [`PersistenceError::Io`] if the file can't be read,
    /// [`PersistenceError::Codec`] if it is corrupt, or
    /// [`PersistenceError::UnsupportedVersion`].
    pub async fn load(&self) -> Result<usize, PersistenceError> {
        self.load_at(unix_millis()).await
    }

    /// [`load`](Self::load) with an explicit "now" for the staleness check.
    ///
    /// # Errors
    /// As for [`load`](Self::load).
    pub async fn load_at(&self, now: u64) -> Result<usize, PersistenceError> {
        let path = self.snapshot_path();
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot found, starting empty");
                return Ok(0);
            }
            Err(source) => return Err(io_error(path, source)),
        };

        let snapshot: Snapshot<G> = self.codec.decode(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let max_age = self.config.max_room_age_ms();
        let total = snapshot.rooms.len();
        let rooms: Vec<Room<G>> = snapshot
            .rooms
            .into_iter()
            .filter(|room| !room.is_stale(now, max_age))
            .collect();
        let skipped = total - rooms.len();

        let restored = self.service.repository().restore(rooms).await;
        let timers = self.service.resume_grace_timers().await;

        tracing::info!(
            path = %path.display(),
            restored,
            skipped_stale = skipped,
            grace_timers = timers,
            saved_at = snapshot.saved_at,
            "snapshot loaded"
        );
        Ok(restored)
    }

    /// Purges rooms idle for longer than the configured max age.
    pub async fn sweep(&self) -> Vec<RoomId> {
        self.sweep_at(unix_millis()).await
    }

    pub async fn sweep_at(&self, now: u64) -> Vec<RoomId> {
        let purged = self
            .service
            .purge_stale_rooms(self.config.max_room_age_ms(), now)
            .await;
        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "stale rooms swept");
        }
        purged
    }

    /// Spawns the periodic snapshot-and-sweep loop.
    ///
    /// The loop runs every `snapshot_interval` until `shutdown` flips to
    /// `true` (or its sender is dropped), then writes one final snapshot.
    /// A failed periodic save is logged and retried on the next tick; a
    /// failed final save is returned from the task.
    pub fn spawn(
        self,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<Result<(), PersistenceError>> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.snapshot_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing has changed yet.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.sweep().await;
                        if let Err(e) = self.save().await {
                            tracing::warn!(error = %e, "periodic snapshot failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("persistence loop stopping, writing final snapshot");
            self.save().await.map(|_| ())
        })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}
