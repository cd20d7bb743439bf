//! Per-session player records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GameError;
use crate::ids::PlayerId;

/// One player's data as stored by its owning session and carried by
/// player-scoped events. Game-specific fields live in `extra` and are
/// flattened on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerData {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerData {
    pub fn new(player_id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            player_id,
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// A player inside one [`GameSession`](crate::GameSession).
///
/// Owned exclusively by that session; all mutation goes through the
/// session's player-update operation, which emits the change event.
#[derive(Debug, Clone)]
pub struct GamePlayer {
    data: PlayerData,
}

impl GamePlayer {
    /// Creates a player record, merging the session's initial player data.
    pub(crate) fn new(player_id: PlayerId, name: &str, initial: &Map<String, Value>) -> Self {
        let mut data = PlayerData::new(player_id, name);
        for (key, value) in initial {
            data.extra.insert(key.clone(), value.clone());
        }
        Self { data }
    }

    pub fn id(&self) -> &PlayerId {
        &self.data.player_id
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn data(&self) -> &PlayerData {
        &self.data
    }

    /// Merge-patches the player's data. The id is immutable; everything
    /// else (including the display name) may change.
    pub(crate) fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), GameError> {
        if patch.contains_key("player_id") {
            return Err(GameError::ForbiddenFieldUpdate("player id"));
        }
        for (key, value) in patch {
            if key == "name" {
                if let Value::String(name) = value {
                    self.data.name = name.clone();
                    continue;
                }
            }
            self.data.extra.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
