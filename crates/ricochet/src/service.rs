//! `RoomService`: the one public surface over the room engine.
//!
//! Every call follows the same path:
//!
//! ```text
//! lock room → one manager call → drain signals (recursively) → broadcast → unlock
//! ```
//!
//! Draining happens while the lock is still held. A whole cause-and-effect
//! chain therefore lands atomically as far as other callers can tell. One
//! example: a removal completes the ready quorum, which starts the next
//! game, which clears the round state. Timer arms and cancels are applied
//! during the drain too.
//!
//! Broadcasts are handed to the [`EventBroadcaster`] before the lock is
//! released, so subscribers see a room's events in the same order the
//! room's state changed. The broadcaster only enqueues and never waits on
//! a receiver.

use std::sync::{Arc, Weak};
use std::time::Duration;

use ricochet_protocol::{unix_millis, Move, PlayerId, RoomEvent, RoomId};
use ricochet_room::{
    GameLifecycleManager, GameModel, Membership, PlayerManager, PlayerSolution, PlayerStatus,
    Room, RoomConfig, RoomError, RoomRepository, Signal, SolutionManager,
};
use ricochet_timer::GraceTimers;

use crate::EventBroadcaster;

/// Shared service state. Grace-timer callbacks hold a `Weak` to it so a
/// pending timer never keeps a dropped service alive.
struct Inner<G: GameModel, B: EventBroadcaster> {
    repo: RoomRepository<G>,
    timers: GraceTimers<PlayerId>,
    broadcaster: B,
}

/// Builder for a [`RoomService`].
///
/// ```rust,ignore
/// let service: RoomService<MyGame, _> = RoomServiceBuilder::new()
///     .reconnect_grace(Duration::from_secs(45))
///     .build(ChannelBroadcaster::default());
/// ```
pub struct RoomServiceBuilder {
    config: RoomConfig,
}

impl RoomServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: RoomConfig::default(),
        }
    }

    /// Replaces the whole room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how long a disconnected player may stay before removal.
    pub fn reconnect_grace(mut self, grace: Duration) -> Self {
        self.config.reconnect_grace = grace;
        self
    }

    pub fn max_players(mut self, max_players: usize) -> Self {
        self.config.max_players = max_players;
        self
    }

    /// Builds the service around `broadcaster`.
    pub fn build<G: GameModel, B: EventBroadcaster>(self, broadcaster: B) -> RoomService<G, B> {
        RoomService {
            inner: Arc::new(Inner {
                repo: RoomRepository::new(self.config),
                timers: GraceTimers::new(),
                broadcaster,
            }),
        }
    }
}

impl Default for RoomServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The room orchestrator. Cheap to clone; clones share all state.
pub struct RoomService<G: GameModel, B: EventBroadcaster> {
    inner: Arc<Inner<G, B>>,
}

impl<G: GameModel, B: EventBroadcaster> Clone for RoomService<G, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: GameModel, B: EventBroadcaster> RoomService<G, B> {
    /// A service with default room configuration.
    pub fn new(broadcaster: B) -> Self {
        RoomServiceBuilder::new().build(broadcaster)
    }

    pub fn config(&self) -> &RoomConfig {
        self.inner.repo.config()
    }

    pub fn repository(&self) -> &RoomRepository<G> {
        &self.inner.repo
    }

    pub fn broadcaster(&self) -> &B {
        &self.inner.broadcaster
    }

    /// Returns `true` while `player_id` has a pending removal.
    pub fn has_grace_timer(&self, player_id: &PlayerId) -> bool {
        self.inner.timers.is_armed(player_id)
    }

    pub fn pending_grace_timers(&self) -> usize {
        self.inner.timers.len()
    }

    // -----------------------------------------------------------------------
    // Request/response surface
    // -----------------------------------------------------------------------

    /// Creates a room with `player_name` as its first player.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`] if the name is empty or too long.
    pub async fn create_room(&self, player_name: &str) -> Result<Membership<G>, RoomError> {
        self.inner.repo.create(player_name, unix_millis()).await
    }

    /// Adds a player to a room and announces them.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`], [`RoomError::InvalidName`], or
    /// [`RoomError::RoomFull`].
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        player_name: &str,
    ) -> Result<Membership<G>, RoomError> {
        let now = unix_millis();
        let inner = &self.inner;
        inner
            .repo
            .with_lock(room_id, |room| {
                let player_id = PlayerManager::admit(room, player_name, inner.repo.config(), now)?;
                let name = room
                    .player(&player_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                inner.dispatch(
                    &room.id,
                    vec![RoomEvent::PlayerJoined {
                        id: player_id.clone(),
                        name,
                    }],
                );
                Ok::<_, RoomError>(Membership {
                    room: room.clone(),
                    player_id,
                })
            })
            .await?
    }

    /// Returns a snapshot of the room.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`].
    pub async fn get_room(&self, room_id: &RoomId) -> Result<Room<G>, RoomError> {
        self.inner.repo.get(room_id).await
    }

    /// Starts a new game, concluding the current one if it is still in
    /// progress. Returns the room as it is once the game has started.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`].
    pub async fn start_game(
        &self,
        room_id: &RoomId,
        use_fixed_board: bool,
    ) -> Result<Room<G>, RoomError> {
        self.run(room_id, |room, now| {
            let signals = GameLifecycleManager::start_game(room, use_fixed_board, now);
            Ok((signals, room.clone()))
        })
        .await
    }

    /// Submits a solution and returns the player's current best.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`], [`RoomError::PlayerNotFound`],
    /// [`RoomError::NotInProgress`], or [`RoomError::InvalidSolution`].
    pub async fn submit_solution(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        moves: Vec<Move>,
    ) -> Result<PlayerSolution, RoomError> {
        self.run(room_id, |room, now| {
            let (best, signals) = SolutionManager::submit(room, player_id, moves, now)?;
            Ok((signals, best))
        })
        .await
    }

    /// Retracts the player's current best solution.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`], [`RoomError::PlayerNotFound`], or
    /// [`RoomError::NotInProgress`].
    pub async fn retract_solution(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<(), RoomError> {
        self.run(room_id, |room, now| {
            Ok((SolutionManager::retract(room, player_id, now)?, ()))
        })
        .await
    }

    /// Declares that a player has stopped searching.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`], [`RoomError::PlayerNotFound`], or
    /// [`RoomError::NotInProgress`].
    pub async fn mark_finished_solving(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<(), RoomError> {
        self.run(room_id, |room, now| {
            Ok((GameLifecycleManager::mark_finished_solving(room, player_id, now)?, ()))
        })
        .await
    }

    /// Declares that a player is ready for the next game.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`], [`RoomError::PlayerNotFound`], or
    /// [`RoomError::NotInProgress`].
    pub async fn mark_ready_for_next(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<(), RoomError> {
        self.run(room_id, |room, now| {
            Ok((GameLifecycleManager::mark_ready_for_next(room, player_id, now)?, ()))
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Connection surface
    // -----------------------------------------------------------------------

    /// Associates a push connection with a player. A disconnected player
    /// is reconnected first. Returns the room state to send down the new
    /// connection.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] or [`RoomError::PlayerNotFound`].
    pub async fn connect(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<Room<G>, RoomError> {
        self.run(room_id, |room, now| {
            let signals = PlayerManager::reconnect(room, player_id, now)?;
            Ok((signals, room.clone()))
        })
        .await
    }

    /// Records that a player's connection dropped and starts their grace
    /// period.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] or [`RoomError::PlayerNotFound`].
    pub async fn disconnect(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<(), RoomError> {
        self.run(room_id, |room, now| {
            Ok((PlayerManager::disconnect(room, player_id, now)?, ()))
        })
        .await
    }

    /// Arms a fresh grace timer for every player currently marked
    /// disconnected, e.g. after rooms were restored from a snapshot.
    /// Returns how many timers were armed.
    pub async fn resume_grace_timers(&self) -> usize {
        let mut armed = 0;
        for room_id in self.inner.repo.ids().await {
            let result = self
                .run(&room_id, |room, _now| {
                    let signals: Vec<Signal> = room
                        .players
                        .iter()
                        .filter(|p| p.status == PlayerStatus::Disconnected)
                        .map(|p| Signal::ArmGraceTimer(p.id.clone()))
                        .collect();
                    let count = signals.len();
                    Ok((signals, count))
                })
                .await;
            match result {
                Ok(count) => armed += count,
                Err(e) => {
                    tracing::debug!(%room_id, error = %e, "room vanished before timers resumed");
                }
            }
        }
        if armed > 0 {
            tracing::info!(armed, "grace timers resumed");
        }
        armed
    }

    /// Deletes a room, cancelling its players' timers and closing its
    /// push channel.
    pub async fn remove_room(&self, room_id: &RoomId) -> bool {
        let Some(room) = self.inner.repo.remove(room_id).await else {
            return false;
        };
        self.inner.forget_room(&room);
        true
    }

    /// Purges rooms idle for longer than `max_age_ms`, releasing their
    /// timers and push channels. Returns the purged IDs.
    pub async fn purge_stale_rooms(&self, max_age_ms: u64, now: u64) -> Vec<RoomId> {
        let purged = self.inner.repo.remove_stale(max_age_ms, now).await;
        purged
            .iter()
            .map(|room| {
                self.inner.forget_room(room);
                room.id.clone()
            })
            .collect()
    }

    /// Cancels every pending grace timer.
    pub fn shutdown(&self) {
        self.inner.timers.cancel_all();
    }

    /// Locks `room_id`, runs `op`, drains its signals, and dispatches the
    /// resulting broadcasts, all under the room lock.
    async fn run<R>(
        &self,
        room_id: &RoomId,
        op: impl FnOnce(&mut Room<G>, u64) -> Result<(Vec<Signal>, R), RoomError>,
    ) -> Result<R, RoomError> {
        let now = unix_millis();
        let inner = &self.inner;
        inner
            .repo
            .with_lock(room_id, |room| {
                let (signals, value) = op(room, now)?;
                let mut events = Vec::new();
                inner.drain(room, signals, now, &mut events);
                inner.dispatch(&room.id, events);
                Ok::<_, RoomError>(value)
            })
            .await?
    }
}

impl<G: GameModel, B: EventBroadcaster> Inner<G, B> {
    /// Interprets signals in order. Manager calls that a signal triggers
    /// are drained before the next signal is looked at.
    fn drain(
        self: &Arc<Self>,
        room: &mut Room<G>,
        signals: Vec<Signal>,
        now: u64,
        events: &mut Vec<RoomEvent>,
    ) {
        for signal in signals {
            match signal {
                Signal::Broadcast(event) => events.push(event),
                Signal::ArmGraceTimer(player_id) => self.arm_grace_timer(room, player_id),
                Signal::CancelGraceTimer(player_id) => {
                    self.timers.cancel(&player_id);
                }
                Signal::EndGame => {
                    let more = GameLifecycleManager::end_game(room, now);
                    self.drain(room, more, now, events);
                }
                Signal::StartNextGame => {
                    let more = GameLifecycleManager::start_next_game(room, now);
                    self.drain(room, more, now, events);
                }
            }
        }
    }

    fn arm_grace_timer(self: &Arc<Self>, room: &Room<G>, player_id: PlayerId) {
        // The timer only acts on the disconnect that armed it.
        let epoch = room.player(&player_id).map_or(0, |p| p.disconnect_epoch);
        let room_id = room.id.clone();
        let service: Weak<Self> = Arc::downgrade(self);
        let key = player_id.clone();

        self.timers.arm(key, self.repo.config().reconnect_grace, move || async move {
            if let Some(inner) = service.upgrade() {
                inner.expire_player(room_id, player_id, epoch).await;
            }
        });
    }

    /// Grace expiry: remove the player through the usual drain path.
    async fn expire_player(self: Arc<Self>, room_id: RoomId, player_id: PlayerId, epoch: u64) {
        let now = unix_millis();
        let result = self
            .repo
            .with_lock(&room_id, |room| -> Result<(), RoomError> {
                let signals = PlayerManager::expire(room, &player_id, epoch, now)?;
                let mut events = Vec::new();
                self.drain(room, signals, now, &mut events);
                self.dispatch(&room.id, events);
                Ok(())
            })
            .await
            .and_then(|removed| removed);

        // Reconnected, already removed, or the room is gone.
        if let Err(e) = result {
            tracing::debug!(%room_id, %player_id, error = %e, "grace expiry skipped");
        }
    }

    fn dispatch(&self, room_id: &RoomId, events: Vec<RoomEvent>) {
        for event in events {
            tracing::trace!(%room_id, event = event.name(), "broadcast");
            self.broadcaster.broadcast(room_id, event);
        }
    }

    fn forget_room(&self, room: &Room<G>) {
        for player in &room.players {
            self.timers.cancel(&player.id);
        }
        self.broadcaster.close_room(&room.id);
    }
}
