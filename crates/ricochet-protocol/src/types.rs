//! Core value types shared by every Ricochet layer.
//!
//! Nothing in here knows about locks, rooms, or timers. These are plain
//! values that get cloned into room state, carried inside events, and
//! written into snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An opaque, unguessable identifier for a player.
///
/// The server mints these when a player creates or joins a room and
/// hands them back to the client. Possession of the ID is what lets a
/// connection act as that player, so it is never derived from anything
/// the client controls.
///
/// `#[serde(transparent)]` keeps the JSON form a plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps an existing identifier (e.g. one presented by a client).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A short, human-typeable room code such as `K7QMZ4`.
///
/// Codes are shown to players in upper case and typed back in whatever
/// case the player likes. Every constructor (including deserialization)
/// upper-cases and trims the input, so `"k7qmz4 "` and `"K7QMZ4"` name
/// the same room and comparisons stay exact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room ID, normalizing case and surrounding whitespace.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.0
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let id = Self::new(value);
        if id.0.is_empty() {
            return Err(ProtocolError::Invalid("room code is empty".into()));
        }
        if !id.0.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(ProtocolError::Invalid(format!(
                "room code {value:?} contains non-alphanumeric characters"
            )));
        }
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Puzzle values
// ---------------------------------------------------------------------------

/// One of the robots on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Robot {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Robot {
    /// Every robot, in a stable order.
    pub const ALL: [Robot; 4] =
        [Robot::Red, Robot::Green, Robot::Blue, Robot::Yellow];
}

impl fmt::Display for Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
            Self::Blue => write!(f, "blue"),
            Self::Yellow => write!(f, "yellow"),
        }
    }
}

/// A board square, addressed by row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A single step of a solution: which robot moved, and where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub robot: Robot,
    pub to: Cell,
}

impl Move {
    pub const fn new(robot: Robot, to: Cell) -> Self {
        Self { robot, to }
    }
}

/// Where every robot stands. `BTreeMap` keeps snapshots diff-friendly.
pub type RobotPositions = BTreeMap<Robot, Cell>;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch.
///
/// Room timestamps are wall-clock values because they survive restarts
/// inside snapshots. A clock set before 1970 reads as 0.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
