//! Shared vocabulary for Ricochet.
//!
//! This crate defines the values every other layer talks in:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`]): who is playing, and where.
//! - **Puzzle values** ([`Robot`], [`Cell`], [`Move`], [`RobotPositions`]):
//!   the pieces of a solution, opaque to the room engine beyond equality.
//! - **Events** ([`RoomEvent`]): the named notifications pushed to every
//!   connection in a room.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how values become bytes,
//!   for the push channel and for on-disk snapshots.
//!
//! ```text
//! Room engine (values) → Codec (bytes) → transport / snapshot file
//! ```

mod codec;
mod error;
mod event;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::RoomEvent;
pub use types::{
    unix_millis, Cell, Move, PlayerId, Robot, RobotPositions, RoomId,
};
