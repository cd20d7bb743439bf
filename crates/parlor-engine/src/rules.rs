//! The `GameRules` trait, the extension point concrete games implement.
//!
//! The engine owns the turn machinery, the roster, and an opaque
//! game-data blob; a `GameRules` value only supplies the rules. Games
//! never see engine internals; the hooks receive view/context arguments
//! scoped to what they are allowed to touch.

use serde_json::{Map, Value};

use crate::error::GameError;
use crate::ids::PlayerId;
use crate::session::{RulesView, TurnCtx};

/// How many players a game accepts. `start` requires the roster size to
/// be inside `[min, max]`; `join` enforces `max` at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLimits {
    pub min: usize,
    pub max: usize,
}

impl PlayerLimits {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

/// Collected during `on_init`: the only place a game can seed its
/// initial data or change the shuffle behavior.
#[derive(Debug)]
pub struct GameSetup {
    pub(crate) initial_game_data: Map<String, Value>,
    pub(crate) initial_player_data: Map<String, Value>,
    pub(crate) shuffle_before_start: bool,
}

impl GameSetup {
    pub(crate) fn new() -> Self {
        Self {
            initial_game_data: Map::new(),
            initial_player_data: Map::new(),
            shuffle_before_start: true,
        }
    }

    /// Seeds the game-specific data committed when `init` completes.
    ///
    /// Engine-owned fields (`state`, `game_id`, `current_player_index`,
    /// `winner_id`, the roster fields) are rejected; the player order
    /// can only be changed later, through the update operation.
    pub fn set_initial_game_data(&mut self, data: Map<String, Value>) -> Result<(), GameError> {
        for &key in crate::session::RESERVED_GAME_FIELDS {
            if data.contains_key(key) {
                return Err(GameError::ForbiddenFieldUpdate(key));
            }
        }
        if data.contains_key("player_ids") {
            return Err(GameError::ForbiddenFieldUpdate("player_ids"));
        }
        self.initial_game_data = data;
        Ok(())
    }

    /// Seeds the data every joining player starts with.
    pub fn set_initial_player_data(&mut self, data: Map<String, Value>) -> Result<(), GameError> {
        if data.contains_key("player_id") {
            return Err(GameError::ForbiddenFieldUpdate("player id"));
        }
        self.initial_player_data = data;
        Ok(())
    }

    /// Whether the roster is shuffled when the game starts. Default: true.
    pub fn set_shuffle_before_start(&mut self, shuffle: bool) {
        self.shuffle_before_start = shuffle;
    }
}

/// The trait concrete games implement. Three hooks carry the rules; the
/// engine calls them at the right time and owns everything else.
pub trait GameRules: Send + 'static {
    /// The player-count window this game accepts.
    fn limits(&self) -> PlayerLimits;

    /// Called once during `init`. Seed initial game/player data and the
    /// shuffle flag here.
    fn on_init(&mut self, setup: &mut GameSetup) -> Result<(), GameError>;

    /// Returns the winning player, or `None` while the game is
    /// undecided. Called before every turn advance.
    fn check_win_condition(&self, view: &RulesView<'_>) -> Option<PlayerId>;

    /// Handles one player action. Returns `true` if the player's turn is
    /// over (the engine then advances to the next player).
    fn on_player_action(
        &mut self,
        ctx: &mut TurnCtx<'_>,
        player: PlayerId,
        action: &Map<String, Value>,
    ) -> Result<bool, GameError>;

    /// The keys every action of this game must carry. The engine rejects
    /// actions missing any of them before `on_player_action` runs.
    /// Default: no required keys.
    fn action_fields(&self) -> &'static [&'static str] {
        &[]
    }
}
