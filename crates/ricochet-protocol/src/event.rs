//! Events pushed to every connection associated with a room.
//!
//! The room engine emits these after a room's lock has been released; the
//! transport decides how to fan them out. The JSON shape is internally
//! tagged with `snake_case` names and `camelCase` fields:
//!
//! ```text
//! { "type": "player_solved", "id": "4be1…", "moveCount": 7 }
//! ```

use serde::{Deserialize, Serialize};

use crate::{Move, PlayerId};

/// A named notification about something that happened in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RoomEvent {
    /// A new player entered the room.
    PlayerJoined { id: PlayerId, name: String },

    /// A player was removed (grace period expired).
    PlayerLeft { id: PlayerId },

    /// A fresh game instance began; clients should refetch the room.
    GameStarted {},

    /// A player's recorded best solution changed.
    PlayerSolved { id: PlayerId, move_count: usize },

    /// A player retracted their only remaining solution.
    SolutionRetracted { id: PlayerId },

    /// A player declared they have stopped searching.
    PlayerFinishedSolving { id: PlayerId },

    /// A player declared they are ready for the next game.
    PlayerReadyForNext { id: PlayerId },

    /// The game ended. `winner_id`/`winner_name` are `None` and `moves`
    /// is empty when nobody solved it.
    GameEnded {
        winner_id: Option<PlayerId>,
        winner_name: Option<String>,
        moves: Vec<Move>,
    },
}

impl RoomEvent {
    /// The wire name of this event (the value of its `type` tag).
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::GameStarted {} => "game_started",
            Self::PlayerSolved { .. } => "player_solved",
            Self::SolutionRetracted { .. } => "solution_retracted",
            Self::PlayerFinishedSolving { .. } => "player_finished_solving",
            Self::PlayerReadyForNext { .. } => "player_ready_for_next",
            Self::GameEnded { .. } => "game_ended",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, Robot};

    #[test]
    fn test_player_solved_uses_camel_case_fields() {
        let event = RoomEvent::PlayerSolved {
            id: PlayerId::new("p1"),
            move_count: 7,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "player_solved", "id": "p1", "moveCount": 7 })
        );
    }

    #[test]
    fn test_game_started_has_only_a_tag() {
        let json = serde_json::to_string(&RoomEvent::GameStarted {}).unwrap();
        assert_eq!(json, r#"{"type":"game_started"}"#);
    }

    #[test]
    fn test_game_ended_without_winner() {
        let event = RoomEvent::GameEnded {
            winner_id: None,
            winner_name: None,
            moves: Vec::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "game_ended",
                "winnerId": null,
                "winnerName": null,
                "moves": []
            })
        );
    }

    #[test]
    fn test_game_ended_decodes_from_wire_shape() {
        let raw = r#"{
            "type": "game_ended",
            "winnerId": "p2",
            "winnerName": "Ada",
            "moves": [{ "robot": "red", "to": { "row": 1, "col": 2 } }]
        }"#;
        let event: RoomEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            RoomEvent::GameEnded {
                winner_id: Some(PlayerId::new("p2")),
                winner_name: Some("Ada".into()),
                moves: vec![Move::new(Robot::Red, Cell::new(1, 2))],
            }
        );
    }

    #[test]
    fn test_name_matches_serialized_tag() {
        let events = [
            RoomEvent::PlayerLeft { id: PlayerId::new("a") },
            RoomEvent::SolutionRetracted { id: PlayerId::new("a") },
            RoomEvent::PlayerReadyForNext { id: PlayerId::new("a") },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }
}
