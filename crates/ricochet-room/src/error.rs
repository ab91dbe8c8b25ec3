//! Error types for the room layer.

use ricochet_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
///
/// A failed operation never leaves a partial mutation behind: managers
/// validate before they write.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (or was purged as stale).
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The player is not in this room.
    #[error("player {0} not in room {1}")]
    PlayerNotFound(PlayerId, RoomId),

    /// No more player slots available.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The display name is empty or too long.
    #[error("invalid player name: {0}")]
    InvalidName(String),

    /// The submitted moves don't validly reach the target.
    #[error("invalid solution: {0}")]
    InvalidSolution(String),

    /// A game-scoped operation with no game in progress.
    #[error("no game in progress in room {0}")]
    NotInProgress(RoomId),

    /// Removal was requested for a player who is still connected.
    #[error("player {0} is still connected")]
    StillConnected(PlayerId),
}

impl RoomError {
    /// HTTP-style status code for transports: 404 = not found,
    /// 400 = invalid argument, 409 = conflicts with current room state.
    pub fn status(&self) -> u16 {
        match self {
            Self::RoomNotFound(_) | Self::PlayerNotFound(..) => 404,
            Self::InvalidName(_) | Self::InvalidSolution(_) => 400,
            Self::RoomFull(_) | Self::NotInProgress(_) | Self::StillConnected(_) => 409,
        }
    }

    /// Returns `true` for the "room or player absent" family.
    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let room = RoomId::new("ABC");
        let player = PlayerId::new("p");
        assert_eq!(RoomError::RoomNotFound(room.clone()).status(), 404);
        assert_eq!(RoomError::PlayerNotFound(player.clone(), room.clone()).status(), 404);
        assert_eq!(RoomError::InvalidSolution("x".into()).status(), 400);
        assert_eq!(RoomError::NotInProgress(room).status(), 409);
        assert_eq!(RoomError::StillConnected(player).status(), 409);
    }

    #[test]
    fn test_display_includes_ids() {
        let err = RoomError::PlayerNotFound(PlayerId::new("p9"), RoomId::new("zz"));
        assert_eq!(err.to_string(), "player p9 not in room ZZ");
    }
}
