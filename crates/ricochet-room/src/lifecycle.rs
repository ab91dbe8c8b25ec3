//! Game lifecycle manager: starting, ending, and continuing games.
//!
//! Ending a game is the only place a win is credited. It happens once per
//! game instance, on the `InProgress → Ending → Ended` transition, no
//! matter which path reaches it: the finished quorum, a removal that
//! completes that quorum, or a new game started over an unfinished one.

use ricochet_protocol::{PlayerId, RobotPositions, RoomEvent, RoomId};

use crate::room::{PlayerSolution, Room};
use crate::{GameModel, GamePhase, RoomError, Signal, SolutionManager};

/// Stateless operations on a locked room's game lifecycle.
pub struct GameLifecycleManager;

impl GameLifecycleManager {
    /// Starts a new game instance and returns a `GameStarted` broadcast.
    ///
    /// A game still in progress is concluded first, crediting its winner.
    /// The next game is picked in priority order:
    ///
    /// 1. the fixed configuration, if `use_fixed_board`
    /// 2. a continuation from the winning solution's final positions
    /// 3. a continuation from the previous game's starting positions
    /// 4. a random game, when the room has never had one
    pub fn start_game<G: GameModel>(
        room: &mut Room<G>,
        use_fixed_board: bool,
        now: u64,
    ) -> Vec<Signal> {
        let winner = match Self::conclude(room) {
            Some(winner) => winner,
            None => SolutionManager::winner(&room.solutions).cloned(),
        };

        let final_positions = match (room.game.as_ref(), winner.as_ref()) {
            (Some(game), Some(winner)) => Self::replay::<G>(&room.id, game, winner),
            _ => None,
        };

        let next = if use_fixed_board {
            G::fixed_game()
        } else if let Some(previous) = room.game.as_ref() {
            G::continue_game(previous, final_positions.as_ref())
        } else {
            G::random_game()
        };

        room.game = Some(next);
        room.solutions.clear();
        room.solution_history.clear();
        room.finished_solving.clear();
        room.ready_for_next.clear();
        room.phase = GamePhase::InProgress;
        room.game_started_at = Some(now);
        room.touch(now);

        tracing::info!(
            room_id = %room.id,
            use_fixed_board,
            continued_from_win = final_positions.is_some(),
            games_played = room.games_played,
            "game started"
        );
        vec![Signal::Broadcast(RoomEvent::GameStarted {})]
    }

    /// Ends the game in progress and returns its `GameEnded` broadcast.
    ///
    /// Returns nothing if no game is in progress, so a second end request
    /// for the same instance can never credit a second win.
    pub fn end_game<G: GameModel>(room: &mut Room<G>, now: u64) -> Vec<Signal> {
        let Some(winner) = Self::conclude(room) else {
            tracing::debug!(room_id = %room.id, phase = %room.phase, "no game to end");
            return Vec::new();
        };
        room.touch(now);

        let event = match winner {
            Some(solution) => RoomEvent::GameEnded {
                winner_name: room.player(&solution.player_id).map(|p| p.name.clone()),
                winner_id: Some(solution.player_id),
                moves: solution.moves,
            },
            None => RoomEvent::GameEnded {
                winner_id: None,
                winner_name: None,
                moves: Vec::new(),
            },
        };
        vec![Signal::Broadcast(event)]
    }

    /// Starts the next game after the ready quorum completed elsewhere
    /// (a removal, for instance).
    pub fn start_next_game<G: GameModel>(room: &mut Room<G>, now: u64) -> Vec<Signal> {
        Self::start_game(room, false, now)
    }

    /// Records that a player has stopped searching. When every player has,
    /// the game ends on the spot and `GameEnded` follows
    /// `PlayerFinishedSolving` in the returned signals.
    ///
    /// # Errors
    /// - [`RoomError::PlayerNotFound`] if the player isn't in the room.
    /// - [`RoomError::NotInProgress`] if no game is being played.
    pub fn mark_finished_solving<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        now: u64,
    ) -> Result<Vec<Signal>, RoomError> {
        if !room.has_player(player_id) {
            return Err(RoomError::PlayerNotFound(player_id.clone(), room.id.clone()));
        }
        // A repeat is a no-op even after it completed the quorum and ended
        // the game.
        if room.finished_solving.contains(player_id) {
            tracing::debug!(room_id = %room.id, %player_id, "already finished solving");
            return Ok(Vec::new());
        }
        if !room.phase.is_in_progress() {
            return Err(RoomError::NotInProgress(room.id.clone()));
        }
        room.finished_solving.insert(player_id.clone());
        room.touch(now);
        tracing::info!(room_id = %room.id, %player_id, "player finished solving");

        let mut signals = vec![Signal::Broadcast(RoomEvent::PlayerFinishedSolving {
            id: player_id.clone(),
        })];
        if room.all_players_in(&room.finished_solving) {
            signals.extend(Self::end_game(room, now));
        }
        Ok(signals)
    }

    /// Records that a player wants the next game. When every player does,
    /// the next game starts on the spot and `GameStarted` follows
    /// `PlayerReadyForNext` in the returned signals.
    ///
    /// # Errors
    /// - [`RoomError::PlayerNotFound`] if the player isn't in the room.
    /// - [`RoomError::NotInProgress`] if the room has never had a game.
    pub fn mark_ready_for_next<G: GameModel>(
        room: &mut Room<G>,
        player_id: &PlayerId,
        now: u64,
    ) -> Result<Vec<Signal>, RoomError> {
        if !room.has_player(player_id) {
            return Err(RoomError::PlayerNotFound(player_id.clone(), room.id.clone()));
        }
        if room.ready_for_next.contains(player_id) {
            tracing::debug!(room_id = %room.id, %player_id, "already ready for next");
            return Ok(Vec::new());
        }
        if !room.phase.has_started() {
            return Err(RoomError::NotInProgress(room.id.clone()));
        }
        room.ready_for_next.insert(player_id.clone());
        room.touch(now);
        tracing::info!(room_id = %room.id, %player_id, "player ready for next game");

        let mut signals = vec![Signal::Broadcast(RoomEvent::PlayerReadyForNext {
            id: player_id.clone(),
        })];
        if room.all_players_in(&room.ready_for_next) {
            signals.extend(Self::start_game(room, false, now));
        }
        Ok(signals)
    }

    /// Runs `InProgress → Ending → Ended`, crediting the winner.
    ///
    /// Returns `None` when no game is in progress. Otherwise returns the
    /// winning solution, which is itself `None` when nobody solved.
    fn conclude<G: GameModel>(room: &mut Room<G>) -> Option<Option<PlayerSolution>> {
        if !room.phase.can_transition_to(GamePhase::Ending) {
            return None;
        }
        room.phase = GamePhase::Ending;

        let winner = SolutionManager::winner(&room.solutions).cloned();
        match &winner {
            Some(solution) => {
                *room.wins.entry(solution.player_id.clone()).or_insert(0) += 1;
                room.games_played += 1;
                tracing::info!(
                    room_id = %room.id,
                    winner = %solution.player_id,
                    move_count = solution.move_count(),
                    "game ended"
                );
            }
            None => tracing::info!(room_id = %room.id, "game ended without a winner"),
        }

        room.phase = GamePhase::Ended;
        Some(winner)
    }

    /// Final robot positions after the winning moves, if they still replay.
    fn replay<G: GameModel>(
        room_id: &RoomId,
        game: &G::Game,
        winner: &PlayerSolution,
    ) -> Option<RobotPositions> {
        if winner.moves.is_empty() {
            return None;
        }
        match G::play(game, &winner.moves) {
            Ok(positions) => Some(positions),
            Err(reason) => {
                tracing::warn!(
                    %room_id,
                    winner = %winner.player_id,
                    %reason,
                    "winning solution no longer replays, continuing from previous start"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Player;
    use crate::testing::{BoardOrigin, ScriptedGame};

    fn room_of(n: usize) -> (Room<ScriptedGame>, Vec<PlayerId>) {
        let ids: Vec<PlayerId> = (0..n).map(|i| PlayerId::new(format!("p{i}"))).collect();
        let mut room = Room::new(RoomId::new("LIFE01"), Player::new(ids[0].clone(), "P0"), 0);
        for (i, id) in ids.iter().enumerate().skip(1) {
            room.players.push(Player::new(id.clone(), format!("P{i}")));
        }
        (room, ids)
    }

    fn origin(room: &Room<ScriptedGame>) -> BoardOrigin {
        room.game.as_ref().unwrap().origin
    }

    fn solve(room: &mut Room<ScriptedGame>, id: &PlayerId, len: usize, at: u64) {
        let moves = ScriptedGame::solution(room.game.as_ref().unwrap(), len);
        SolutionManager::submit(room, id, moves, at).unwrap();
    }

    #[test]
    fn test_start_game_first_game_is_random() {
        let (mut room, _) = room_of(1);
        let signals = GameLifecycleManager::start_game(&mut room, false, 10);
        assert_eq!(signals, vec![Signal::Broadcast(RoomEvent::GameStarted {})]);
        assert_eq!(room.phase, GamePhase::InProgress);
        assert_eq!(room.game_started_at, Some(10));
        assert_eq!(origin(&room), BoardOrigin::Random);
    }

    #[test]
    fn test_start_game_fixed_board_takes_priority() {
        let (mut room, ids) = room_of(1);
        GameLifecycleManager::start_game(&mut room, false, 10);
        solve(&mut room, &ids[0], 3, 20);
        GameLifecycleManager::start_game(&mut room, true, 30);
        assert_eq!(origin(&room), BoardOrigin::Fixed);
    }

    #[test]
    fn test_start_game_over_unfinished_game_credits_winner_and_continues() {
        let (mut room, ids) = room_of(2);
        GameLifecycleManager::start_game(&mut room, false, 10);
        solve(&mut room, &ids[1], 4, 20);
        let target = room.game.as_ref().unwrap().target;

        GameLifecycleManager::start_game(&mut room, false, 30);

        assert_eq!(room.wins_for(&ids[1]), 1);
        assert_eq!(room.games_played, 1);
        let board = room.game.as_ref().unwrap();
        assert_eq!(board.origin, BoardOrigin::Continued { from_final: true });
        assert!(board.robots.values().any(|cell| *cell == target));
    }

    #[test]
    fn test_start_game_after_unsolved_game_continues_from_previous() {
        let (mut room, _) = room_of(1);
        GameLifecycleManager::start_game(&mut room, false, 10);
        let previous = room.game.as_ref().unwrap().robots.clone();
        GameLifecycleManager::start_game(&mut room, false, 20);

        let board = room.game.as_ref().unwrap();
        assert_eq!(board.origin, BoardOrigin::Continued { from_final: false });
        assert_eq!(board.robots, previous);
        assert_eq!(room.games_played, 0);
    }

    #[test]
    fn test_start_game_clears_per_game_state_and_keeps_tallies() {
        let (mut room, ids) = room_of(2);
        GameLifecycleManager::start_game(&mut room, false, 10);
        solve(&mut room, &ids[0], 2, 20);
        GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 21).unwrap();
        GameLifecycleManager::mark_ready_for_next(&mut room, &ids[1], 22).unwrap();

        GameLifecycleManager::start_game(&mut room, false, 30);

        assert!(room.solutions.is_empty());
        assert!(room.solution_history.is_empty());
        assert!(room.finished_solving.is_empty());
        assert!(room.ready_for_next.is_empty());
        assert_eq!(room.wins_for(&ids[0]), 1);
        assert_eq!(room.games_played, 1);
    }

    #[test]
    fn test_mark_finished_quorum_ends_game_with_winner() {
        let (mut room, ids) = room_of(2);
        GameLifecycleManager::start_game(&mut room, false, 10);
        solve(&mut room, &ids[0], 3, 20);

        let first = GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 30).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(room.phase, GamePhase::InProgress);

        let second = GameLifecycleManager::mark_finished_solving(&mut room, &ids[1], 40).unwrap();
        assert_eq!(second.len(), 2);
        match second[1].as_event() {
            Some(RoomEvent::GameEnded { winner_id, winner_name, moves }) => {
                assert_eq!(winner_id.as_ref(), Some(&ids[0]));
                assert_eq!(winner_name.as_deref(), Some("P0"));
                assert_eq!(moves.len(), 3);
            }
            other => panic!("expected GameEnded, got {other:?}"),
        }
        assert_eq!(room.phase, GamePhase::Ended);
        assert_eq!(room.wins_for(&ids[0]), 1);
    }

    #[test]
    fn test_mark_finished_without_solutions_ends_with_no_winner() {
        let (mut room, ids) = room_of(1);
        GameLifecycleManager::start_game(&mut room, false, 10);
        let signals = GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 20).unwrap();
        assert_eq!(
            signals[1],
            Signal::Broadcast(RoomEvent::GameEnded {
                winner_id: None,
                winner_name: None,
                moves: Vec::new(),
            })
        );
        assert_eq!(room.games_played, 0);
    }

    #[test]
    fn test_mark_finished_twice_is_noop() {
        let (mut room, ids) = room_of(2);
        GameLifecycleManager::start_game(&mut room, false, 10);
        GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 20).unwrap();
        let again = GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 21).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_mark_finished_repeat_after_quorum_is_noop() {
        let (mut room, ids) = room_of(2);
        GameLifecycleManager::start_game(&mut room, false, 10);
        solve(&mut room, &ids[1], 3, 15);
        GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 20).unwrap();
        GameLifecycleManager::mark_finished_solving(&mut room, &ids[1], 21).unwrap();
        assert_eq!(room.phase, GamePhase::Ended);

        let again = GameLifecycleManager::mark_finished_solving(&mut room, &ids[1], 22).unwrap();
        assert!(again.is_empty());
        assert_eq!(room.wins_for(&ids[1]), 1);
        assert_eq!(room.games_played, 1);
    }

    #[test]
    fn test_mark_finished_newcomer_after_game_ended_not_in_progress() {
        let (mut room, ids) = room_of(1);
        GameLifecycleManager::start_game(&mut room, false, 10);
        GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 20).unwrap();
        room.players.push(Player::new(PlayerId::new("late"), "Late"));

        let err = GameLifecycleManager::mark_finished_solving(&mut room, &PlayerId::new("late"), 30)
            .unwrap_err();
        assert!(matches!(err, RoomError::NotInProgress(_)));
    }

    #[test]
    fn test_mark_finished_before_start_not_in_progress() {
        let (mut room, ids) = room_of(1);
        let err = GameLifecycleManager::mark_finished_solving(&mut room, &ids[0], 5).unwrap_err();
        assert!(matches!(err, RoomError::NotInProgress(_)));
        let err = GameLifecycleManager::mark_ready_for_next(&mut room, &ids[0], 5).unwrap_err();
        assert!(matches!(err, RoomError::NotInProgress(_)));
    }

    #[test]
    fn test_end_game_twice_credits_once() {
        let (mut room, ids) = room_of(1);
        GameLifecycleManager::start_game(&mut room, false, 10);
        solve(&mut room, &ids[0], 2, 20);
        assert_eq!(GameLifecycleManager::end_game(&mut room, 30).len(), 1);
        assert!(GameLifecycleManager::end_game(&mut room, 31).is_empty());
        assert_eq!(room.wins_for(&ids[0]), 1);
    }

    #[test]
    fn test_mark_ready_quorum_starts_next_game() {
        let (mut room, ids) = room_of(2);
        GameLifecycleManager::start_game(&mut room, false, 10);
        GameLifecycleManager::mark_ready_for_next(&mut room, &ids[0], 20).unwrap();
        let signals = GameLifecycleManager::mark_ready_for_next(&mut room, &ids[1], 30).unwrap();

        assert_eq!(
            signals,
            vec![
                Signal::Broadcast(RoomEvent::PlayerReadyForNext { id: ids[1].clone() }),
                Signal::Broadcast(RoomEvent::GameStarted {}),
            ]
        );
        assert_eq!(room.game_started_at, Some(30));
        assert!(room.ready_for_next.is_empty());
    }
}
