//! Room-code and player-ID generation.

use rand::Rng;
use ricochet_protocol::{PlayerId, RoomId};

/// Length of a generated room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Characters a room code may contain. `0/O`, `1/I/L` are left out so a
/// code read aloud or off a screen can't be mistyped.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generates a random room code such as `K7QMZ4`.
///
/// Uniqueness is the caller's job; the repository regenerates on
/// collision.
pub fn generate_room_code() -> RoomId {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[idx] as char
        })
        .collect();
    RoomId::new(code)
}

/// Generates an unguessable player ID: 128 random bits as 32 hex chars.
pub fn generate_player_id() -> PlayerId {
    let bytes: [u8; 16] = rand::rng().random();
    PlayerId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
