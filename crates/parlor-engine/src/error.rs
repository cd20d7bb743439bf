//! Error types for the engine layer.

use crate::ids::{GameId, PlayerId};

/// Errors that can occur during engine operations.
///
/// Every precondition violation is a synchronous, typed failure; the
/// operation leaves session and registry state exactly as it found it.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The session has not been initialized yet.
    #[error("game not initialized")]
    NotInitialized,

    /// The operation requires a running game.
    #[error("game not started")]
    NotStarted,

    /// `init` was called a second time.
    #[error("game already initialized")]
    AlreadyInitialized,

    /// `start` was called on a game that already left the waiting state.
    #[error("game already started")]
    AlreadyStarted,

    /// The roster is at capacity; no more player slots.
    #[error("room is full: limit is {0} players")]
    RoomFull(usize),

    /// Fewer players than the game's minimum.
    #[error("not enough players: expected {expected}+ but got {got}")]
    NotEnoughPlayers { expected: usize, got: usize },

    /// More players than the game's maximum.
    #[error("too many players: expected {expected}- but got {got}")]
    TooManyPlayers { expected: usize, got: usize },

    /// The player is not part of this session.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// No player has the turn yet (game not running).
    #[error("no current player")]
    NoCurrentPlayer,

    /// The action is malformed or violates the game's rules.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// The patch tried to touch an engine-owned field.
    #[error("{0} can not be updated")]
    ForbiddenFieldUpdate(&'static str),

    /// The patch's `player_ids` is not a permutation of the live roster.
    #[error("player ids can not be updated: {0}")]
    InvalidPlayerIdUpdate(String),

    /// No game type registered under this namespace.
    #[error("game type {0} is not registered")]
    NotRegistered(String),

    /// A game type with this namespace already exists.
    #[error("game type {0} is already registered")]
    AlreadyRegistered(String),

    /// No live session with this id.
    #[error("game {0} not found")]
    GameNotFound(GameId),
}
