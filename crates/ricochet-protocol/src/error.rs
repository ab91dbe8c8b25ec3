//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means bytes could not be produced from a value
//! or a value could not be recovered from bytes. It never describes room
//! or game state.

/// Errors that can occur while encoding or decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: a truncated snapshot file, a client that sends
    /// a robot colour we don't know, or a field of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value decoded but violates a protocol rule, e.g. an empty
    /// room code.
    #[error("invalid value: {0}")]
    Invalid(String),
}
