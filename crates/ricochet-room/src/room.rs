//! The room aggregate and the values it owns.
//!
//! Everything in a `Room` is plain data. Mutation happens only through
//! the managers, and only while the repository holds that room's lock.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ricochet_protocol::{Move, PlayerId, RoomId};
use serde::{Deserialize, Serialize};

use crate::{GameModel, GamePhase};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Whether a player currently has a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Connected,
    Disconnected,
}

/// A member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub status: PlayerStatus,
    /// Set only while `status` is `Disconnected`.
    pub disconnected_at: Option<u64>,
    /// Bumped on every disconnect. A grace timer only acts on the
    /// disconnect whose epoch it was armed with.
    #[serde(default)]
    pub disconnect_epoch: u64,
}

impl Player {
    /// A freshly joined, connected player.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: PlayerStatus::Connected,
            disconnected_at: None,
            disconnect_epoch: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == PlayerStatus::Connected
    }
}

// ---------------------------------------------------------------------------
// PlayerSolution
// ---------------------------------------------------------------------------

/// A validated solution one player found for the active game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSolution {
    pub player_id: PlayerId,
    pub moves: Vec<Move>,
    /// Unix millis when the solution was accepted.
    pub solved_at: u64,
}

impl PlayerSolution {
    pub fn new(player_id: PlayerId, moves: Vec<Move>, solved_at: u64) -> Self {
        Self {
            player_id,
            moves,
            solved_at,
        }
    }

    /// The solution's cost. Lower is better.
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// Ordering key for "better": fewer moves, then earlier, then player
    /// ID so that ties are total and deterministic.
    pub(crate) fn rank(&self) -> (usize, u64, &PlayerId) {
        (self.move_count(), self.solved_at, &self.player_id)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One play session: its players, the active game, and all per-game
/// bookkeeping.
///
/// Invariants, upheld by the managers:
/// - `finished_solving` and `ready_for_next` only contain current players
///   and are cleared whenever a game starts.
/// - `solutions` holds at most one entry per player: that player's best
///   valid submission, which is also present in their history.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Room<G: GameModel> {
    pub id: RoomId,
    pub players: Vec<Player>,
    pub game: Option<G::Game>,
    #[serde(default)]
    pub phase: GamePhase,
    pub game_started_at: Option<u64>,
    pub created_at: u64,
    pub last_activity_at: u64,
    pub solutions: BTreeMap<PlayerId, PlayerSolution>,
    /// Every distinct move count each player reached this game, one
    /// solution per count (the first one found).
    pub solution_history: BTreeMap<PlayerId, Vec<PlayerSolution>>,
    pub wins: BTreeMap<PlayerId, u32>,
    pub games_played: u32,
    pub finished_solving: BTreeSet<PlayerId>,
    pub ready_for_next: BTreeSet<PlayerId>,
}

impl<G: GameModel> Room<G> {
    /// Creates a room with its first player and no game.
    pub fn new(id: RoomId, creator: Player, now: u64) -> Self {
        Self {
            id,
            players: vec![creator],
            game: None,
            phase: GamePhase::NotStarted,
            game_started_at: None,
            created_at: now,
            last_activity_at: now,
            solutions: BTreeMap::new(),
            solution_history: BTreeMap::new(),
            wins: BTreeMap::new(),
            games_played: 0,
            finished_solving: BTreeSet::new(),
            ready_for_next: BTreeSet::new(),
        }
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Quorum check: every current player is in `set`. An empty room
    /// never has a quorum.
    pub fn all_players_in(&self, set: &BTreeSet<PlayerId>) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| set.contains(&p.id))
    }

    /// Win tally for one player.
    pub fn wins_for(&self, id: &PlayerId) -> u32 {
        self.wins.get(id).copied().unwrap_or(0)
    }

    /// Records activity for staleness cleanup.
    pub fn touch(&mut self, now: u64) {
        self.last_activity_at = self.last_activity_at.max(now);
    }

    /// Returns `true` if the room has been idle longer than `max_age_ms`.
    pub fn is_stale(&self, now: u64, max_age_ms: u64) -> bool {
        now.saturating_sub(self.last_activity_at) > max_age_ms
    }
}

// `derive(Clone)` would demand `G: Clone`, but only `G::Game` is stored.
impl<G: GameModel> Clone for Room<G> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            players: self.players.clone(),
            game: self.game.clone(),
            phase: self.phase,
            game_started_at: self.game_started_at,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            solutions: self.solutions.clone(),
            solution_history: self.solution_history.clone(),
            wins: self.wins.clone(),
            games_played: self.games_played,
            finished_solving: self.finished_solving.clone(),
            ready_for_next: self.ready_for_next.clone(),
        }
    }
}

impl<G: GameModel> fmt::Debug for Room<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("players", &self.players)
            .field("game", &self.game)
            .field("phase", &self.phase)
            .field("solutions", &self.solutions)
            .field("wins", &self.wins)
            .field("games_played", &self.games_played)
            .field("finished_solving", &self.finished_solving)
            .field("ready_for_next", &self.ready_for_next)
            .finish_non_exhaustive()
    }
}
