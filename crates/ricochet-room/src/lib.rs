//! Room state and the managers that mutate it.
//!
//! A [`Room`] is the aggregate root for one play session. It lives in a
//! [`RoomRepository`], which hands out exclusive, closure-scoped access
//! per room. Three stateless managers operate on a locked room:
//!
//! - [`PlayerManager`]: disconnect, reconnect, and grace-expiry removal
//! - [`SolutionManager`]: submit, retract, and winner selection
//! - [`GameLifecycleManager`]: start, end, and continue games
//!
//! Managers never call each other. Each returns a list of [`Signal`]s
//! describing follow-up effects, and the orchestrator one layer up
//! decides what to do with them.
//!
//! The puzzle itself is behind the [`GameModel`] trait: the room engine
//! asks it to validate solutions and generate boards, and otherwise
//! treats a game as an opaque value.

mod config;
mod error;
mod game;
mod ids;
mod lifecycle;
mod players;
mod repository;
mod room;
mod signal;
mod solutions;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use config::{GamePhase, RoomConfig};
pub use error::RoomError;
pub use game::GameModel;
pub use ids::{generate_player_id, generate_room_code, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
pub use lifecycle::GameLifecycleManager;
pub use players::PlayerManager;
pub use repository::{Membership, RoomRepository};
pub use room::{Player, PlayerSolution, PlayerStatus, Room};
pub use signal::Signal;
pub use solutions::SolutionManager;
