//! Player manager: admission, disconnect, reconnect, and removal.
//!
//! ```text
//! join ──▶ [Connected] ──disconnect──▶ [Disconnected] ──expiry──▶ removed
//!               ▲                            │
//!               └─────────reconnect──────────┘
//! ```
//!
//! Removal is the only path out of a room. It never touches a connected
//! player, and it is where a departing player can complete a quorum the
//! remaining players were waiting on.

use ricochet_protocol::{PlayerId, RoomEvent};

use crate::room::{Player, PlayerStatus, Room};
use crate::{generate_player_id, GameModel, RoomConfig, RoomError, Signal};

/// Stateless operations on a locked room's player list.
pub struct PlayerManager;

impl PlayerManager {
    /// Trims `name` and checks it against the configured length limit.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidName`] if the trimmed name is empty or
    /// longer than `max_len` characters.
    pub fn validate_name(name: &str, max_len: usize) -> Result<String, RoomError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RoomError::InvalidName("name is empty".into()));
        }
        if trimmed.chars().count() > max_len {
            return Err(RoomError::InvalidName(format!(
                "name is longer than {max_len} characters"
            )));
        }
        Ok(trimmed.to_owned())
    }

    /// Adds a new connected player and returns their freshly generated ID.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidName`] or [`RoomError::RoomFull`]. The
    /// room is unchanged on error.
    pub fn admit<G: GameModel>(
        room: &mut Room<G>,
        name: &str,
        config: &RoomConfig,
        now: u64,
    ) -> Result<PlayerId, RoomError> {
        let name = Self::validate_name(name, config.max_name_len)?;
        if room.players.len() >= config.max_players {
            return Err(RoomError::RoomFull(room.id.clone()));
        }

        let player_id = generate_player_id();
        room.players.push(Player::new(player_id.clone(), name));
        room.touch(now);

        tracing::info!(room_id = %room.id, %player_id, "player joined");
        Ok(player_id)
    }

    /// Marks a connected player as disconnected and asks for a grace
    /// timer. Disconnecting an already-disconnected player is a no-op.
    ///
    /// # Errors
    /// Returns [`RoomError::PlayerNotFound`] if the player isn't in the room.
    pub fn disconnect<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        now: u64,
    ) -> Result<Vec<Signal>, RoomError> {
        let room_id = room.id.clone();
        let player = room
            .player_mut(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone(), room_id.clone()))?;

        if player.status == PlayerStatus::Disconnected {
            tracing::debug!(%room_id, %player_id, "already disconnected");
            return Ok(Vec::new());
        }

        player.status = PlayerStatus::Disconnected;
        player.disconnected_at = Some(now);
        player.disconnect_epoch += 1;
        room.touch(now);

        tracing::info!(%room_id, %player_id, "player disconnected, grace period started");
        Ok(vec![Signal::ArmGraceTimer(player_id.clone())])
    }

    /// Marks a disconnected player as connected again and asks for their
    /// grace timer to be cancelled. Reconnecting a connected player is a
    /// no-op.
    ///
    /// # Errors
    /// Returns [`RoomError::PlayerNotFound`] if the player isn't in the room.
    pub fn reconnect<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        now: u64,
    ) -> Result<Vec<Signal>, RoomError> {
        let room_id = room.id.clone();
        let player = room
            .player_mut(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone(), room_id.clone()))?;

        if player.status == PlayerStatus::Connected {
            tracing::debug!(%room_id, %player_id, "already connected");
            return Ok(Vec::new());
        }

        player.status = PlayerStatus::Connected;
        player.disconnected_at = None;
        room.touch(now);

        tracing::info!(%room_id, %player_id, "player reconnected");
        Ok(vec![Signal::CancelGraceTimer(player_id.clone())])
    }

    /// Grace-period expiry for the disconnect numbered `epoch`.
    ///
    /// If the player has since reconnected and dropped again, the expiry
    /// belongs to an earlier disconnect and nothing happens. Otherwise
    /// this is [`remove`](Self::remove).
    ///
    /// # Errors
    /// As for [`remove`](Self::remove).
    pub fn expire<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        epoch: u64,
        now: u64,
    ) -> Result<Vec<Signal>, RoomError> {
        if let Some(player) = room.player(player_id) {
            if !player.is_connected() && player.disconnect_epoch != epoch {
                tracing::debug!(
                    room_id = %room.id,
                    %player_id,
                    epoch,
                    current = player.disconnect_epoch,
                    "grace timer outlived its disconnect, ignoring"
                );
                return Ok(Vec::new());
            }
        }
        Self::remove(room, player_id, now)
    }

    /// Removes a disconnected player and purges their per-game
    /// bookkeeping.
    ///
    /// Returns a `PlayerLeft` broadcast, followed by `EndGame` if every
    /// remaining player has finished solving and `StartNextGame` if every
    /// remaining player is ready. An empty room completes no quorum.
    ///
    /// # Errors
    /// - [`RoomError::PlayerNotFound`] if the player was already removed.
    /// - [`RoomError::StillConnected`] if the player is connected.
    pub fn remove<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        now: u64,
    ) -> Result<Vec<Signal>, RoomError> {
        let index = room
            .players
            .iter()
            .position(|p| &p.id == player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone(), room.id.clone()))?;

        if room.players[index].is_connected() {
            return Err(RoomError::StillConnected(player_id.clone()));
        }

        room.players.remove(index);
        room.finished_solving.remove(player_id);
        room.ready_for_next.remove(player_id);
        room.solutions.remove(player_id);
        room.solution_history.remove(player_id);
        room.touch(now);

        tracing::info!(
            room_id = %room.id,
            %player_id,
            remaining = room.players.len(),
            "player removed"
        );

        let mut signals = vec![Signal::Broadcast(RoomEvent::PlayerLeft {
            id: player_id.clone(),
        })];

        if room.phase.is_in_progress() && room.all_players_in(&room.finished_solving) {
            tracing::debug!(room_id = %room.id, "removal completed the finished quorum");
            signals.push(Signal::EndGame);
        }
        if room.phase.has_started() && room.all_players_in(&room.ready_for_next) {
            tracing::debug!(room_id = %room.id, "removal completed the ready quorum");
            signals.push(Signal::StartNextGame);
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use ricochet_protocol::RoomId;

    use super::*;
    use crate::testing::ScriptedGame;
    use crate::GamePhase;

    fn room() -> (Room<ScriptedGame>, PlayerId) {
        let host = PlayerId::new("host");
        let room = Room::new(RoomId::new("ROOM01"), Player::new(host.clone(), "Host"), 0);
        (room, host)
    }

    fn disconnected(room: &mut Room<ScriptedGame>, id: &PlayerId) {
        PlayerManager::disconnect(room, id, 10).unwrap();
    }

    #[test]
    fn test_validate_name_trims_and_limits() {
        assert_eq!(PlayerManager::validate_name("  Ada ", 8).unwrap(), "Ada");
        assert!(matches!(
            PlayerManager::validate_name("   ", 8),
            Err(RoomError::InvalidName(_))
        ));
        assert!(matches!(
            PlayerManager::validate_name("abcdefghi", 8),
            Err(RoomError::InvalidName(_))
        ));
    }

    #[test]
    fn test_admit_full_room_rejected() {
        let (mut room, _) = room();
        let config = RoomConfig {
            max_players: 2,
            ..RoomConfig::default()
        };
        PlayerManager::admit(&mut room, "Bo", &config, 1).unwrap();
        let err = PlayerManager::admit(&mut room, "Cy", &config, 2).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(_)));
        assert_eq!(room.players.len(), 2);
    }

    #[test]
    fn test_disconnect_arms_timer_once() {
        let (mut room, host) = room();
        let signals = PlayerManager::disconnect(&mut room, &host, 42).unwrap();
        assert_eq!(signals, vec![Signal::ArmGraceTimer(host.clone())]);

        let player = room.player(&host).unwrap();
        assert_eq!(player.status, PlayerStatus::Disconnected);
        assert_eq!(player.disconnected_at, Some(42));

        let again = PlayerManager::disconnect(&mut room, &host, 50).unwrap();
        assert!(again.is_empty());
        assert_eq!(room.player(&host).unwrap().disconnected_at, Some(42));
    }

    #[test]
    fn test_reconnect_cancels_timer_and_clears_timestamp() {
        let (mut room, host) = room();
        disconnected(&mut room, &host);

        let signals = PlayerManager::reconnect(&mut room, &host, 20).unwrap();
        assert_eq!(signals, vec![Signal::CancelGraceTimer(host.clone())]);
        let player = room.player(&host).unwrap();
        assert!(player.is_connected());
        assert_eq!(player.disconnected_at, None);
    }

    #[test]
    fn test_reconnect_connected_player_is_noop() {
        let (mut room, host) = room();
        assert!(PlayerManager::reconnect(&mut room, &host, 5).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_player_not_found() {
        let (mut room, _) = room();
        let ghost = PlayerId::new("ghost");
        assert!(PlayerManager::disconnect(&mut room, &ghost, 0).unwrap_err().is_not_found());
        assert!(PlayerManager::reconnect(&mut room, &ghost, 0).unwrap_err().is_not_found());
        assert!(PlayerManager::remove(&mut room, &ghost, 0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_connected_player_refused() {
        let (mut room, host) = room();
        let err = PlayerManager::remove(&mut room, &host, 0).unwrap_err();
        assert!(matches!(err, RoomError::StillConnected(_)));
        assert_eq!(room.players.len(), 1);
    }

    #[test]
    fn test_remove_purges_bookkeeping() {
        let (mut room, host) = room();
        let guest = PlayerManager::admit(&mut room, "Guest", &RoomConfig::default(), 1).unwrap();
        room.phase = GamePhase::InProgress;
        room.ready_for_next.insert(guest.clone());
        room.solutions.insert(
            guest.clone(),
            crate::PlayerSolution::new(guest.clone(), Vec::new(), 3),
        );
        room.solution_history.insert(guest.clone(), Vec::new());
        disconnected(&mut room, &guest);

        let signals = PlayerManager::remove(&mut room, &guest, 30).unwrap();

        assert_eq!(signals[0], Signal::Broadcast(RoomEvent::PlayerLeft { id: guest.clone() }));
        assert!(!room.has_player(&guest));
        assert!(room.has_player(&host));
        assert!(!room.ready_for_next.contains(&guest));
        assert!(!room.solutions.contains_key(&guest));
        assert!(!room.solution_history.contains_key(&guest));
    }

    #[test]
    fn test_remove_completes_finished_quorum() {
        let (mut room, host) = room();
        let config = RoomConfig::default();
        let b = PlayerManager::admit(&mut room, "B", &config, 1).unwrap();
        let c = PlayerManager::admit(&mut room, "C", &config, 1).unwrap();
        room.phase = GamePhase::InProgress;
        room.finished_solving.insert(host.clone());
        room.finished_solving.insert(b);
        disconnected(&mut room, &c);

        let signals = PlayerManager::remove(&mut room, &c, 40).unwrap();
        assert_eq!(signals.iter().filter(|s| **s == Signal::EndGame).count(), 1);
        assert!(!signals.contains(&Signal::StartNextGame));
    }

    #[test]
    fn test_remove_completes_ready_quorum() {
        let (mut room, host) = room();
        let guest = PlayerManager::admit(&mut room, "G", &RoomConfig::default(), 1).unwrap();
        room.phase = GamePhase::Ended;
        room.ready_for_next.insert(host);
        disconnected(&mut room, &guest);

        let signals = PlayerManager::remove(&mut room, &guest, 40).unwrap();
        assert!(signals.contains(&Signal::StartNextGame));
        assert!(!signals.contains(&Signal::EndGame));
    }

    #[test]
    fn test_remove_last_player_completes_no_quorum() {
        let (mut room, host) = room();
        room.phase = GamePhase::InProgress;
        disconnected(&mut room, &host);

        let signals = PlayerManager::remove(&mut room, &host, 40).unwrap();
        assert_eq!(signals.len(), 1);
        assert!(room.players.is_empty());
    }

    #[test]
    fn test_disconnect_bumps_epoch_each_time() {
        let (mut room, host) = room();
        assert_eq!(room.player(&host).unwrap().disconnect_epoch, 0);
        disconnected(&mut room, &host);
        PlayerManager::reconnect(&mut room, &host, 10).unwrap();
        disconnected(&mut room, &host);
        assert_eq!(room.player(&host).unwrap().disconnect_epoch, 2);
    }

    #[test]
    fn test_expire_from_earlier_disconnect_in_same_millisecond_is_ignored() {
        let (mut room, host) = room();
        let guest = PlayerManager::admit(&mut room, "G", &RoomConfig::default(), 1).unwrap();

        PlayerManager::disconnect(&mut room, &guest, 10).unwrap();
        let first = room.player(&guest).unwrap().disconnect_epoch;
        PlayerManager::reconnect(&mut room, &guest, 10).unwrap();
        PlayerManager::disconnect(&mut room, &guest, 10).unwrap();
        let second = room.player(&guest).unwrap().disconnect_epoch;

        assert!(PlayerManager::expire(&mut room, &guest, first, 10).unwrap().is_empty());
        assert!(room.has_player(&guest));

        let signals = PlayerManager::expire(&mut room, &guest, second, 40).unwrap();
        assert_eq!(signals, vec![Signal::Broadcast(RoomEvent::PlayerLeft { id: guest.clone() })]);
        assert!(!room.has_player(&guest));
        assert!(room.has_player(&host));
    }

    #[test]
    fn test_expire_after_reconnect_is_still_connected() {
        let (mut room, host) = room();
        disconnected(&mut room, &host);
        let epoch = room.player(&host).unwrap().disconnect_epoch;
        PlayerManager::reconnect(&mut room, &host, 20).unwrap();

        let err = PlayerManager::expire(&mut room, &host, epoch, 30).unwrap_err();
        assert!(matches!(err, RoomError::StillConnected(_)));
    }

    #[test]
    fn test_remove_twice_second_is_not_found() {
        let (mut room, host) = room();
        disconnected(&mut room, &host);
        PlayerManager::remove(&mut room, &host, 40).unwrap();
        assert!(PlayerManager::remove(&mut room, &host, 41).unwrap_err().is_not_found());
    }
}
