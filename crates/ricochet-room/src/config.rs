//! Room configuration and the per-game state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long a disconnected player has to reconnect before removal.
    pub reconnect_grace: Duration,

    /// Maximum players allowed in a room.
    pub max_players: usize,

    /// Maximum display-name length, in characters, after trimming.
    pub max_name_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(30),
            max_players: 16,
            max_name_len: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// GamePhase
// ---------------------------------------------------------------------------

/// Where the room's current game instance is in its life.
///
/// ```text
/// NotStarted → InProgress → Ending → Ended
/// ```
///
/// - **NotStarted**: the room has never had a game.
/// - **InProgress**: players are submitting solutions.
/// - **Ending**: the finished quorum was reached; the winner is being
///   resolved. Only ever observed inside the room lock.
/// - **Ended**: terminal for this instance. Starting another game creates
///   a *new* instance in `InProgress`; it is not a transition out of
///   `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    NotStarted,
    InProgress,
    Ending,
    Ended,
}

impl GamePhase {
    /// Returns `true` while solutions may be submitted or retracted.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns `true` once some game has been started in this room.
    pub fn has_started(&self) -> bool {
        !matches!(self, Self::NotStarted)
    }

    /// The next phase of the same game instance, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::InProgress),
            Self::InProgress => Some(Self::Ending),
            Self::Ending => Some(Self::Ended),
            Self::Ended => None,
        }
    }

    /// Returns `true` if moving to `target` follows the state machine.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ending => write!(f, "Ending"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}
