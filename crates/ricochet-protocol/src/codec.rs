//! Codec trait and implementations for turning values into bytes.
//!
//! Two things in Ricochet leave the process as bytes: room events on
//! their way to a push connection, and the room table on its way to the
//! snapshot file. Both go through a [`Codec`], so swapping JSON for a
//! binary format later touches one type instead of every caller.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because a codec lives inside long-running
/// tasks (the persistence loop, per-connection forwarders).
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Snapshots written with this codec are pretty-printed so an operator
/// can open the file and read it.
///
/// ```rust
/// use ricochet_protocol::{Codec, JsonCodec, PlayerId, RoomEvent};
///
/// let codec = JsonCodec;
/// let event = RoomEvent::PlayerLeft { id: PlayerId::new("p1") };
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: RoomEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec_pretty(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::RoomEvent;

    #[test]
    fn test_decode_truncated_input_returns_decode_error() {
        let result: Result<RoomEvent, _> = JsonCodec.decode(br#"{"type":"pla"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_unknown_event_type_fails() {
        let result: Result<RoomEvent, _> =
            JsonCodec.decode(br#"{"type":"player_teleported","id":"p1"}"#);
        assert!(result.is_err());
    }
}
