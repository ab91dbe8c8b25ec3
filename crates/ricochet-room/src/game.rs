//! The `GameModel` trait, the seam to the puzzle itself.
//!
//! Move physics and board generation live outside the room engine. The
//! engine only needs to ask four kinds of question, and this trait is
//! exactly those questions.

use std::fmt;

use ricochet_protocol::{Move, RobotPositions};
use serde::{de::DeserializeOwned, Serialize};

/// The puzzle rules and board generator a room is played with.
///
/// All methods are associated functions: a model carries no state of its
/// own, and everything it needs is in the `Game` value it is handed.
pub trait GameModel: Send + Sync + 'static {
    /// One game instance: board, robot start positions, and target.
    /// Serializable so it can be written into snapshots.
    type Game: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned;

    /// A fully random game, used for a room's first game.
    fn random_game() -> Self::Game;

    /// The well-known fixed configuration (for practice and demos).
    fn fixed_game() -> Self::Game;

    /// A continuation game: same board as `previous`, new target.
    ///
    /// `robots` carries the final positions of the winning solution when
    /// there was one; `None` keeps `previous`'s starting positions.
    fn continue_game(previous: &Self::Game, robots: Option<&RobotPositions>) -> Self::Game;

    /// Replays `moves` from the game's starting positions.
    ///
    /// Returns the final robot positions, or a human-readable reason the
    /// first illegal move was rejected.
    fn play(game: &Self::Game, moves: &[Move]) -> Result<RobotPositions, String>;

    /// Returns `true` if `robots` has the target robot on the target cell.
    fn is_solved(game: &Self::Game, robots: &RobotPositions) -> bool;

    /// Checks that `moves` is a legal sequence that reaches the target.
    fn validate_solution(game: &Self::Game, moves: &[Move]) -> Result<RobotPositions, String> {
        if moves.is_empty() {
            return Err("solution has no moves".into());
        }
        let robots = Self::play(game, moves)?;
        if Self::is_solved(game, &robots) {
            Ok(robots)
        } else {
            Err("moves do not reach the target".into())
        }
    }
}
