//! Unified error type for the server crate.

use parlor_engine::GameError;
use parlor_protocol::ProtocolError;
use parlor_room::RoomError;

/// Top-level error wrapping every layer's failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// An engine failure.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A room-layer failure.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A wire encode/decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A WebSocket-level failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_game_error() {
        let err: ServerError = GameError::NotInitialized.into();
        assert!(matches!(err, ServerError::Game(_)));
        assert_eq!(err.to_string(), "game not initialized");
    }

    #[test]
    fn test_from_room_error() {
        let err: ServerError = RoomError::NotInRoom.into();
        assert!(matches!(err, ServerError::Room(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: ServerError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(err.to_string().contains("bad"));
    }
}
