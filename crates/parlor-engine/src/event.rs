//! Event types published on the bus.
//!
//! Every state change a session makes is published as a [`GameEvent`].
//! Game-scoped events carry a full [`GameData`] snapshot; player-scoped
//! events carry the affected player's [`PlayerData`] and name the player
//! in `player_id` so relays can unicast them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{GameId, PlayerId};
use crate::player::PlayerData;

/// The kind of a published event. Subscriptions filter on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PlayerJoined,
    PlayerLeft,
    PlayerDataChanged,
    GameStarted,
    GameEnded,
    NextTurn,
    GameDataChanged,
}

/// The lifecycle state of a session.
///
/// ```text
/// NotInitialized → Waiting → Running → Ended
/// ```
///
/// `Ended` is terminal. A session that never reaches `Running` can still
/// end up deleted (empty-room sweep), but never transitions backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    NotInitialized,
    Waiting,
    Running,
    Ended,
}

/// A roster entry as seen in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub name: String,
    pub player_id: PlayerId,
}

/// A point-in-time snapshot of one session, as carried by game-scoped
/// events.
///
/// `player_ids` and `players` are recomputed from the live roster every
/// time a snapshot is taken; they are never stored, so they cannot
/// drift. `current_player_index` is `-1` until the game is running.
/// Game-specific fields live in `extra` and are flattened on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub game_id: GameId,
    pub state: GameState,
    pub min_players: usize,
    pub max_players: usize,
    pub player_ids: Vec<PlayerId>,
    pub players: Vec<PlayerSummary>,
    pub current_player_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<PlayerId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The payload of an event: a game snapshot or one player's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventBody {
    Game(GameData),
    Player(PlayerData),
}

impl EventBody {
    /// Returns the game snapshot, if this is a game-scoped event.
    pub fn as_game(&self) -> Option<&GameData> {
        match self {
            Self::Game(data) => Some(data),
            Self::Player(_) => None,
        }
    }

    /// Returns the player data, if this is a player-scoped event.
    pub fn as_player(&self) -> Option<&PlayerData> {
        match self {
            Self::Player(data) => Some(data),
            Self::Game(_) => None,
        }
    }
}

/// One event on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub game_id: GameId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    pub data: EventBody,
}

impl GameEvent {
    /// Builds a game-scoped event carrying a snapshot.
    pub fn game(kind: EventKind, data: GameData) -> Self {
        Self {
            kind,
            game_id: data.game_id.clone(),
            player_id: None,
            data: EventBody::Game(data),
        }
    }

    /// Builds a player-scoped event carrying one player's data.
    pub fn player(kind: EventKind, game_id: GameId, data: PlayerData) -> Self {
        Self {
            kind,
            game_id,
            player_id: Some(data.player_id.clone()),
            data: EventBody::Player(data),
        }
    }
}
