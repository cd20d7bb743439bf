//! Error types for the room layer.

use parlor_engine::GameError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code.
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// The connection already belongs to a room.
    #[error("you are already in a room")]
    AlreadyInRoom,

    /// The connection does not belong to any room.
    #[error("not in a room")]
    NotInRoom,

    /// The password was missing or wrong.
    #[error("invalid password")]
    InvalidCredential,

    /// The operation is reserved for the room owner.
    #[error("only the room owner can do that")]
    NotOwner,

    /// Recreation was requested while a game is still live.
    #[error("the current game has not ended yet")]
    GameInProgress,

    /// The room has no live game to forward to.
    #[error("no active game in this room")]
    NoActiveGame,

    /// An engine failure, forwarded as-is.
    #[error(transparent)]
    Game(#[from] GameError),
}
