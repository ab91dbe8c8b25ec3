//! Solution manager: submissions, retraction, and winner selection.
//!
//! Each player has one *current* solution (their best) and a history
//! holding one entry per distinct move count they reached this game.
//! Retracting drops the current move count from the history and falls
//! back to the best one left, like an undo stack ordered by cost.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use ricochet_protocol::{Move, PlayerId, RoomEvent};

use crate::room::{PlayerSolution, Room};
use crate::{GameModel, RoomError, Signal};

/// Stateless operations on a locked room's solutions.
pub struct SolutionManager;

impl SolutionManager {
    /// Validates and records a solution, returning the player's current
    /// best afterwards.
    ///
    /// The history gains an entry only if this move count is new for the
    /// player. The current best changes only on the first submission or a
    /// strictly lower move count, and only then is `PlayerSolved`
    /// broadcast.
    ///
    /// # Errors
    /// - [`RoomError::PlayerNotFound`] if the player isn't in the room.
    /// - [`RoomError::NotInProgress`] if no game is being played.
    /// - [`RoomError::InvalidSolution`] if the moves don't reach the
    ///   target. Nothing is recorded in that case.
    pub fn submit<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        moves: Vec<Move>,
        now: u64,
    ) -> Result<(PlayerSolution, Vec<Signal>), RoomError> {
        Self::check_playing(room, player_id)?;
        let game = room
            .game
            .as_ref()
            .ok_or_else(|| RoomError::NotInProgress(room.id.clone()))?;
        G::validate_solution(game, &moves).map_err(RoomError::InvalidSolution)?;

        let candidate = PlayerSolution::new(player_id.clone(), moves, now);
        let move_count = candidate.move_count();

        let history = room.solution_history.entry(player_id.clone()).or_default();
        if !history.iter().any(|s| s.move_count() == move_count) {
            history.push(candidate.clone());
        }
        room.touch(now);

        if let Some(best) = room.solutions.get(player_id) {
            if best.move_count() <= move_count {
                tracing::debug!(
                    room_id = %room.id,
                    %player_id,
                    move_count,
                    best = best.move_count(),
                    "solution does not improve on current best"
                );
                return Ok((best.clone(), Vec::new()));
            }
        }

        room.solutions.insert(player_id.clone(), candidate.clone());
        tracing::info!(room_id = %room.id, %player_id, move_count, "player solved");

        let signal = Signal::Broadcast(RoomEvent::PlayerSolved {
            id: player_id.clone(),
            move_count,
        });
        Ok((candidate, vec![signal]))
    }

    /// Withdraws the player's current best and restores the next best
    /// from their history.
    ///
    /// Emits `PlayerSolved` with the restored count, or
    /// `SolutionRetracted` once the history is exhausted. Retracting with
    /// no current solution is a no-op.
    ///
    /// # Errors
    /// - [`RoomError::PlayerNotFound`] if the player isn't in the room.
    /// - [`RoomError::NotInProgress`] if no game is being played.
    pub fn retract<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        now: u64,
    ) -> Result<Vec<Signal>, RoomError> {
        Self::check_playing(room, player_id)?;

        let Some(current) = room.solutions.remove(player_id) else {
            tracing::debug!(room_id = %room.id, %player_id, "nothing to retract");
            return Ok(Vec::new());
        };
        room.touch(now);

        let retracted = current.move_count();
        let restored = match room.solution_history.get_mut(player_id) {
            Some(history) => {
                history.retain(|s| s.move_count() != retracted);
                history
                    .iter()
                    .min_by(|a, b| {
                        a.move_count()
                            .cmp(&b.move_count())
                            .then(a.solved_at.cmp(&b.solved_at))
                    })
                    .cloned()
            }
            None => None,
        };

        match restored {
            Some(next) => {
                let move_count = next.move_count();
                room.solutions.insert(player_id.clone(), next);
                tracing::info!(
                    room_id = %room.id,
                    %player_id,
                    retracted,
                    move_count,
                    "solution retracted, previous best restored"
                );
                Ok(vec![Signal::Broadcast(RoomEvent::PlayerSolved {
                    id: player_id.clone(),
                    move_count,
                })])
            }
            None => {
                room.solution_history.remove(player_id);
                tracing::info!(room_id = %room.id, %player_id, retracted, "solution retracted");
                Ok(vec![Signal::Broadcast(RoomEvent::SolutionRetracted {
                    id: player_id.clone(),
                })])
            }
        }
    }

    /// Picks the winning solution: fewest moves, then earliest
    /// `solved_at`. Ties that survive both fall back to player ID so the
    /// result never depends on map order.
    pub fn winner(solutions: &BTreeMap<PlayerId, PlayerSolution>) -> Option<&PlayerSolution> {
        solutions.values().min_by(|a, b| Self::compare(a, b))
    }

    fn compare(a: &PlayerSolution, b: &PlayerSolution) -> Ordering {
        a.rank().cmp(&b.rank())
    }

    fn check_playing<G: GameModel>(room: &Room<G>, player_id: &PlayerId) -> Result<(), RoomError> {
        if !room.has_player(player_id) {
            return Err(RoomError::PlayerNotFound(player_id.clone(), room.id.clone()));
        }
        if !room.phase.is_in_progress() {
            return Err(RoomError::NotInProgress(room.id.clone()));
        }
        Ok(())
    }
}
