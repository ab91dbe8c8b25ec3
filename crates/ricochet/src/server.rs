//! `RicochetServer`: owns a `RoomService` and its background work.
//!
//! Startup loads the last snapshot (dropping stale rooms and re-arming
//! grace timers), then spawns the snapshot/sweep loop. Shutdown stops the
//! loop, writes a final snapshot, and cancels pending timers.

use ricochet_room::GameModel;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    EventBroadcaster, PersistenceError, PersistenceManager, RicochetError, RoomService,
    RoomServiceBuilder, ServerConfig,
};

/// A running room engine.
pub struct RicochetServer<G: GameModel, B: EventBroadcaster> {
    service: RoomService<G, B>,
    shutdown_tx: watch::Sender<bool>,
    persistence: Option<JoinHandle<Result<(), PersistenceError>>>,
}

impl<G: GameModel, B: EventBroadcaster> RicochetServer<G, B> {
    /// Validates `config`, restores saved rooms, and starts background
    /// persistence.
    ///
    /// # Errors
    /// [`RicochetError::Config`] for invalid settings, or
    /// [`RicochetError::Persistence`] if an existing snapshot can't be
    /// read.
    pub async fn start(config: ServerConfig, broadcaster: B) -> Result<Self, RicochetError> {
        config.validate()?;

        let service: RoomService<G, B> = RoomServiceBuilder::new()
            .room_config(config.room_config())
            .build(broadcaster);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let persistence = if config.persistence.enabled {
            let manager = PersistenceManager::new(service.clone(), config.persistence.clone());
            manager.load().await?;
            Some(manager.spawn(shutdown_rx))
        } else {
            tracing::info!("persistence disabled, rooms live in memory only");
            None
        };

        tracing::info!(
            reconnect_grace_secs = config.rooms.reconnect_grace_secs,
            max_players = config.rooms.max_players,
            "Ricochet room engine running"
        );
        Ok(Self {
            service,
            shutdown_tx,
            persistence,
        })
    }

    /// The service to hand to transports.
    pub fn service(&self) -> &RoomService<G, B> {
        &self.service
    }

    /// Stops background work and writes a final snapshot.
    ///
    /// # Errors
    /// [`RicochetError::Persistence`] if the final snapshot fails, or
    /// [`RicochetError::Task`] if the persistence task panicked.
    pub async fn shutdown(self) -> Result<(), RicochetError> {
        tracing::info!("Ricochet room engine shutting down");
        // No receiver left just means the loop already exited.
        let _ = self.shutdown_tx.send(true);

        let result = match self.persistence {
            Some(task) => task.await?.map_err(RicochetError::from),
            None => Ok(()),
        };
        self.service.shutdown();
        result
    }
}
