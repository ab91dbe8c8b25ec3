//! A deterministic `GameModel` for tests.
//!
//! The board is 16×16 with no walls: a move is legal if it stays on the
//! board, actually moves the robot, and doesn't land on another robot.
//! That is enough to exercise every validation path the room engine
//! relies on without pulling in real puzzle physics.

use std::sync::atomic::{AtomicU64, Ordering};

use ricochet_protocol::{Cell, Move, Robot, RobotPositions};
use serde::{Deserialize, Serialize};

use crate::GameModel;

/// Side length of the scripted board.
pub const BOARD_SIZE: u8 = 16;

static NEXT_BOARD: AtomicU64 = AtomicU64::new(1);

/// How a scripted board was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardOrigin {
    Random,
    Fixed,
    /// `from_final` is true when the winner's final positions were used.
    Continued { from_final: bool },
}

/// One scripted game instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedBoard {
    pub id: u64,
    pub robots: RobotPositions,
    pub target_robot: Robot,
    pub target: Cell,
    pub origin: BoardOrigin,
}

/// The scripted game model.
pub struct ScriptedGame;

impl ScriptedGame {
    /// A fresh random-origin board, without going through the trait.
    pub fn board() -> ScriptedBoard {
        <Self as GameModel>::random_game()
    }

    /// A winning solution of exactly `len` moves (at least one).
    ///
    /// The target robot wanders along row 1 and then steps onto the
    /// target. Row 1 never holds a robot or a target.
    pub fn solution(board: &ScriptedBoard, len: usize) -> Vec<Move> {
        let len = len.max(1);
        let mut moves: Vec<Move> = (0..len - 1)
            .map(|i| Move::new(board.target_robot, Cell::new(1, 1 + (i % 13) as u8)))
            .collect();
        moves.push(Move::new(board.target_robot, board.target));
        moves
    }

    /// A move sequence that leaves the board.
    pub fn illegal_moves() -> Vec<Move> {
        vec![Move::new(Robot::Red, Cell::new(BOARD_SIZE, 0))]
    }

    /// A legal sequence that never reaches the target.
    pub fn wandering_moves(board: &ScriptedBoard) -> Vec<Move> {
        vec![Move::new(board.target_robot, Cell::new(2, 2))]
    }

    fn starting_robots() -> RobotPositions {
        let far = BOARD_SIZE - 1;
        [
            (Robot::Red, Cell::new(0, 0)),
            (Robot::Green, Cell::new(0, far)),
            (Robot::Blue, Cell::new(far, 0)),
            (Robot::Yellow, Cell::new(far, far)),
        ]
        .into_iter()
        .collect()
    }

    /// First free cell on the diagonal band used for targets.
    fn free_target(robots: &RobotPositions, seed: u64) -> Cell {
        (0..8u64)
            .map(|k| {
                let step = ((seed + k) % 8) as u8;
                Cell::new(5 + step, 10 - step)
            })
            .find(|cell| !robots.values().any(|c| c == cell))
            .unwrap_or(Cell::new(7, 7))
    }
}

impl GameModel for ScriptedGame {
    type Game = ScriptedBoard;

    fn random_game() -> ScriptedBoard {
        let id = NEXT_BOARD.fetch_add(1, Ordering::Relaxed);
        let robots = Self::starting_robots();
        ScriptedBoard {
            id,
            target: Self::free_target(&robots, id),
            robots,
            target_robot: Robot::Red,
            origin: BoardOrigin::Random,
        }
    }

    fn fixed_game() -> ScriptedBoard {
        let robots = Self::starting_robots();
        ScriptedBoard {
            id: 0,
            target: Cell::new(8, 8),
            robots,
            target_robot: Robot::Blue,
            origin: BoardOrigin::Fixed,
        }
    }

    fn continue_game(previous: &ScriptedBoard, robots: Option<&RobotPositions>) -> ScriptedBoard {
        let from_final = robots.is_some();
        let robots = robots.cloned().unwrap_or_else(|| previous.robots.clone());
        let position = Robot::ALL
            .iter()
            .position(|r| *r == previous.target_robot)
            .unwrap_or(0);
        let target_robot = Robot::ALL[(position + 1) % Robot::ALL.len()];
        let id = NEXT_BOARD.fetch_add(1, Ordering::Relaxed);

        ScriptedBoard {
            id,
            target: Self::free_target(&robots, id),
            robots,
            target_robot,
            origin: BoardOrigin::Continued { from_final },
        }
    }

    fn play(game: &ScriptedBoard, moves: &[Move]) -> Result<RobotPositions, String> {
        let mut robots = game.robots.clone();
        for (step, mv) in moves.iter().enumerate() {
            let from = *robots
                .get(&mv.robot)
                .ok_or_else(|| format!("move {step}: {} robot is not on the board", mv.robot))?;
            if mv.to.row >= BOARD_SIZE || mv.to.col >= BOARD_SIZE {
                return Err(format!("move {step}: {} is off the board", mv.to));
            }
            if mv.to == from {
                return Err(format!("move {step}: {} robot does not move", mv.robot));
            }
            if robots.iter().any(|(r, c)| *r != mv.robot && *c == mv.to) {
                return Err(format!("move {step}: {} is occupied", mv.to));
            }
            robots.insert(mv.robot, mv.to);
        }
        Ok(robots)
    }

    fn is_solved(game: &ScriptedBoard, robots: &RobotPositions) -> bool {
        robots.get(&game.target_robot) == Some(&game.target)
    }
}
