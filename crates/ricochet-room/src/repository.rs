//! Room repository: keyed storage with one lock per room.
//!
//! The outer map is behind an `RwLock` that is only held long enough to
//! find (or insert) a room's `Arc<Mutex<Room>>`. Work on the room itself
//! happens under that room's own mutex, so two rooms never contend.
//!
//! Rooms are never handed out by reference. Callers either get a cloned
//! snapshot ([`RoomRepository::get`]) or run a closure while the lock is
//! held ([`RoomRepository::with_lock`]).

use std::collections::HashMap;
use std::sync::Arc;

use ricochet_protocol::{PlayerId, RoomId};
use tokio::sync::{Mutex, RwLock};

use crate::room::{Player, Room};
use crate::{
    generate_player_id, generate_room_code, GameModel, PlayerManager, RoomConfig, RoomError,
};

/// A room snapshot plus the ID of the player who just entered it.
pub struct Membership<G: GameModel> {
    pub room: Room<G>,
    pub player_id: PlayerId,
}

impl<G: GameModel> Clone for Membership<G> {
    fn clone(&self) -> Self {
        Self {
            room: self.room.clone(),
            player_id: self.player_id.clone(),
        }
    }
}

impl<G: GameModel> std::fmt::Debug for Membership<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("room", &self.room)
            .field("player_id", &self.player_id)
            .finish()
    }
}

/// Owns every room in the process.
pub struct RoomRepository<G: GameModel> {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<Room<G>>>>>,
    config: RoomConfig,
}

impl<G: GameModel> RoomRepository<G> {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room with `name` as its first player.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidName`] if the name is empty or too long.
    pub async fn create(&self, name: &str, now: u64) -> Result<Membership<G>, RoomError> {
        let name = PlayerManager::validate_name(name, self.config.max_name_len)?;
        let player_id = generate_player_id();

        let mut rooms = self.rooms.write().await;
        let room_id = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
            tracing::debug!(%code, "room code collision, regenerating");
        };

        let room = Room::new(room_id.clone(), Player::new(player_id.clone(), name), now);
        rooms.insert(room_id.clone(), Arc::new(Mutex::new(room.clone())));
        drop(rooms);

        tracing::info!(%room_id, %player_id, "room created");
        Ok(Membership { room, player_id })
    }

    /// Adds a new player to an existing room.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] if no such room exists.
    /// - [`RoomError::InvalidName`] or [`RoomError::RoomFull`] from admission.
    pub async fn join(
        &self,
        room_id: &RoomId,
        name: &str,
        now: u64,
    ) -> Result<Membership<G>, RoomError> {
        let config = &self.config;
        self.with_lock(room_id, |room| {
            let player_id = PlayerManager::admit(room, name, config, now)?;
            Ok(Membership {
                room: room.clone(),
                player_id,
            })
        })
        .await?
    }

    /// Returns a snapshot of the room.
    ///
    /// # Errors
    /// Returns [`RoomError::RoomNotFound`] if no such room exists.
    pub async fn get(&self, room_id: &RoomId) -> Result<Room<G>, RoomError> {
        self.with_lock(room_id, |room| room.clone()).await
    }

    /// Runs `f` with exclusive access to one room.
    ///
    /// The map lock is released before the room lock is taken, so a slow
    /// closure only holds up callers of the same room. The room lock is
    /// released when `f` returns or unwinds.
    ///
    /// # Errors
    /// Returns [`RoomError::RoomNotFound`] if no such room exists.
    pub async fn with_lock<R>(
        &self,
        room_id: &RoomId,
        f: impl FnOnce(&mut Room<G>) -> R,
    ) -> Result<R, RoomError> {
        let handle = self
            .rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let mut room = handle.lock().await;
        Ok(f(&mut room))
    }

    /// Deletes a room, returning its last state.
    pub async fn remove(&self, room_id: &RoomId) -> Option<Room<G>> {
        let handle = self.rooms.write().await.remove(room_id)?;
        let room = handle.lock().await.clone();
        tracing::info!(%room_id, "room removed");
        Some(room)
    }

    /// IDs of every room, sorted.
    pub async fn ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Clones every room, sorted by ID.
    ///
    /// Each room is locked on its own in turn, so the result is consistent
    /// per room but not a single point-in-time cut across rooms.
    pub async fn snapshot(&self) -> Vec<Room<G>> {
        let handles: Vec<Arc<Mutex<Room<G>>>> =
            self.rooms.read().await.values().cloned().collect();

        let mut rooms = Vec::with_capacity(handles.len());
        for handle in handles {
            rooms.push(handle.lock().await.clone());
        }
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    /// Inserts previously saved rooms, replacing any with the same ID.
    /// Returns how many were inserted.
    pub async fn restore(&self, saved: Vec<Room<G>>) -> usize {
        let mut rooms = self.rooms.write().await;
        let count = saved.len();
        for room in saved {
            rooms.insert(room.id.clone(), Arc::new(Mutex::new(room)));
        }
        count
    }

    /// Removes every room idle for longer than `max_age_ms` and returns
    /// their last state, sorted by ID.
    ///
    /// A room whose lock is held right now is in use, so it is skipped
    /// rather than waited on.
    pub async fn remove_stale(&self, max_age_ms: u64, now: u64) -> Vec<Room<G>> {
        let mut purged = Vec::new();
        self.rooms.write().await.retain(|room_id, handle| {
            let stale = handle
                .try_lock()
                .ok()
                .filter(|room| room.is_stale(now, max_age_ms))
                .map(|room| room.clone());
            match stale {
                Some(room) => {
                    tracing::info!(%room_id, "stale room purged");
                    purged.push(room);
                    false
                }
                None => true,
            }
        });
        purged.sort_by(|a, b| a.id.cmp(&b.id));
        purged
    }
}

impl<G: GameModel> Default for RoomRepository<G> {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
