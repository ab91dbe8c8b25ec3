//! Signals: effects a manager asks for but does not perform.
//!
//! A manager mutates the room it was handed and returns a `Vec<Signal>`.
//! It never calls another manager, arms a timer, or talks to a
//! broadcaster itself. The orchestrator interprets signals in order,
//! and a signal that leads to another manager call may yield more
//! signals, which are interpreted before moving on.

use ricochet_protocol::{PlayerId, RoomEvent};

/// A requested side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Push this event to everyone in the room (terminal).
    Broadcast(RoomEvent),

    /// Start the grace period for a player who just disconnected.
    ArmGraceTimer(PlayerId),

    /// Stop the grace period for a player who came back.
    CancelGraceTimer(PlayerId),

    /// The finished quorum is complete: resolve the winner and end the
    /// game.
    EndGame,

    /// The ready quorum is complete: start the next game.
    StartNextGame,
}

impl Signal {
    /// Returns the event if this is a terminal broadcast.
    pub fn as_event(&self) -> Option<&RoomEvent> {
        match self {
            Self::Broadcast(event) => Some(event),
            _ => None,
        }
    }
}
