//! # Ricochet
//!
//! Server-side room orchestration for a multiplayer robot puzzle game.
//!
//! Ricochet owns all shared state for a room: who is in it, the game being
//! played, every player's solutions, and the win tally. It serializes
//! concurrent player actions per room, rides out short disconnects with a
//! grace period, and decides exactly once when a game has ended and who
//! won. The puzzle rules plug in through [`GameModel`]; the push transport
//! plugs in through [`EventBroadcaster`].
//!
//! ```text
//! transport ──▶ RoomService ──lock──▶ managers ──signals──▶ RoomService ──▶ EventBroadcaster
//!                    │                                         │
//!                    └──────────── GraceTimers ◀───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ricochet::prelude::*;
//!
//! let config = ServerConfig::load("ricochet.toml")?;
//! init_tracing(&config.log.filter);
//!
//! let server = RicochetServer::<MyGame, _>::start(config, ChannelBroadcaster::default()).await?;
//! let service = server.service().clone();
//! let Membership { room, player_id } = service.create_room("Ada").await?;
//! // ... hand `service` to the transport ...
//! server.shutdown().await?;
//! ```

mod broadcast;
mod config;
mod error;
mod persistence;
mod server;
mod service;
mod telemetry;

pub use broadcast::{ChannelBroadcaster, EventBroadcaster, DEFAULT_CHANNEL_CAPACITY};
pub use config::{LogConfig, PersistenceConfig, RoomsConfig, ServerConfig};
pub use error::{ConfigError, PersistenceError, RicochetError};
pub use persistence::{PersistenceManager, Snapshot, SNAPSHOT_VERSION};
pub use server::RicochetServer;
pub use service::{RoomService, RoomServiceBuilder};
pub use telemetry::init_tracing;

pub use ricochet_protocol as protocol;
pub use ricochet_room::{
    GameModel, GamePhase, Membership, Player, PlayerSolution, PlayerStatus, Room, RoomConfig,
    RoomError,
};

/// The types most callers need.
pub mod prelude {
    pub use crate::{
        init_tracing, ChannelBroadcaster, EventBroadcaster, GameModel, Membership,
        RicochetError, RicochetServer, Room, RoomError, RoomService, ServerConfig,
    };
    pub use ricochet_protocol::{Cell, Move, PlayerId, Robot, RoomEvent, RoomId};
}
