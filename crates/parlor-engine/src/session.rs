//! The per-session turn/lifecycle state machine.
//!
//! A [`GameSession`] owns one game instance: its rules value, its player
//! roster, and the engine-owned game-data blob. All operations are
//! synchronous and take an [`EngineCtx`] carrying the bus to publish on
//! and the registry's deferred-turn queue.
//!
//! "Not initialized" is a real state, not a null convention: the session
//! core (game id, lifecycle state, turn index, blob) only exists once
//! `init` has run, and every operation that needs it fails with
//! [`GameError::NotInitialized`] until then.

use serde_json::{Map, Value};

use crate::bus::EventBus;
use crate::error::GameError;
use crate::event::{EventKind, GameData, GameEvent, GameState, PlayerSummary};
use crate::ids::{next_free_ordinal, GameId, PlayerId};
use crate::player::GamePlayer;
use crate::rules::{GameRules, GameSetup, PlayerLimits};
use crate::shuffle::fisher_yates;

/// Engine-owned snapshot fields a data patch may never touch.
pub(crate) const RESERVED_GAME_FIELDS: &[&str] = &[
    "state",
    "game_id",
    "current_player_index",
    "winner_id",
    "players",
    "min_players",
    "max_players",
];

/// The mutable engine surroundings a session operation runs in: the bus
/// events are published on and the queue next-turn events are deferred
/// into. Owned by the registry; constructed per call.
pub struct EngineCtx<'a> {
    pub bus: &'a mut EventBus,
    pub deferred: &'a mut std::collections::VecDeque<GameId>,
}

impl<'a> EngineCtx<'a> {
    pub fn new(
        bus: &'a mut EventBus,
        deferred: &'a mut std::collections::VecDeque<GameId>,
    ) -> Self {
        Self { bus, deferred }
    }
}

/// Everything that exists only after `init`.
struct SessionCore {
    game_id: GameId,
    state: GameState,
    /// Index into the roster; `None` until the first turn advance. May
    /// transiently exceed the roster length between a removal and the
    /// following advance, never across an operation boundary.
    current: Option<usize>,
    winner: Option<PlayerId>,
    extra: Map<String, Value>,
}

/// One running game instance.
pub struct GameSession {
    rules: Box<dyn GameRules>,
    limits: PlayerLimits,
    shuffle_before_start: bool,
    initial_player_data: Map<String, Value>,
    players: Vec<GamePlayer>,
    core: Option<SessionCore>,
}

impl GameSession {
    /// Wraps a rules value. The session is unusable until [`init`](Self::init).
    pub fn new(rules: Box<dyn GameRules>) -> Self {
        let limits = rules.limits();
        Self {
            rules,
            limits,
            shuffle_before_start: true,
            initial_player_data: Map::new(),
            players: Vec::new(),
            core: None,
        }
    }

    /// One-time transition to `Waiting`: runs the rules' `on_init` hook,
    /// builds the core, and commits the initial game data through the
    /// normal update path (so subscribers see a `GAME_DATA_CHANGED`).
    pub fn init(&mut self, game_id: GameId, ctx: &mut EngineCtx<'_>) -> Result<(), GameError> {
        if self.core.is_some() {
            return Err(GameError::AlreadyInitialized);
        }

        let mut setup = GameSetup::new();
        self.rules.on_init(&mut setup)?;
        self.shuffle_before_start = setup.shuffle_before_start;
        self.initial_player_data = setup.initial_player_data;

        self.core = Some(SessionCore {
            game_id,
            state: GameState::Waiting,
            current: None,
            winner: None,
            extra: Map::new(),
        });

        self.update_game_data(setup.initial_game_data, true, ctx)
    }

    /// The session's lifecycle state.
    pub fn state(&self) -> GameState {
        self.core
            .as_ref()
            .map(|core| core.state)
            .unwrap_or(GameState::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.core.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.state() == GameState::Running
    }

    pub fn game_id(&self) -> Result<&GameId, GameError> {
        Ok(&self.core_ref()?.game_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn limits(&self) -> PlayerLimits {
        self.limits
    }

    /// A fresh snapshot; roster fields are recomputed on every call.
    pub fn game_data(&self) -> Result<GameData, GameError> {
        Ok(snapshot(self.core_ref()?, &self.players, self.limits))
    }

    /// The player whose turn it is.
    pub fn current_player(&self) -> Result<&GamePlayer, GameError> {
        let core = self.core_ref()?;
        core.current
            .and_then(|index| self.players.get(index))
            .ok_or(GameError::NoCurrentPlayer)
    }

    /// The smallest player ordinal unused in this session.
    pub fn allocate_player_id(&self) -> Result<PlayerId, GameError> {
        let core = self.core_ref()?;
        let ordinal = next_free_ordinal(self.players.iter().map(|p| p.id().ordinal));
        Ok(PlayerId::new(core.game_id.clone(), ordinal))
    }

    /// Adds a player, allocating an id unless one was supplied. Emits
    /// `PLAYER_DATA_CHANGED` for the new record, then `PLAYER_JOINED`.
    pub fn join(
        &mut self,
        name: &str,
        player_id: Option<PlayerId>,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<PlayerId, GameError> {
        self.core_ref()?;
        if self.players.len() >= self.limits.max {
            return Err(GameError::RoomFull(self.limits.max));
        }

        let player_id = match player_id {
            Some(id) => id,
            None => self.allocate_player_id()?,
        };
        let player = GamePlayer::new(player_id.clone(), name, &self.initial_player_data);
        let player_data = player.data().clone();
        self.players.push(player);

        let core = self.core_ref()?;
        ctx.bus.publish(&GameEvent::player(
            EventKind::PlayerDataChanged,
            core.game_id.clone(),
            player_data,
        ));
        ctx.bus.publish(&GameEvent::game(
            EventKind::PlayerJoined,
            snapshot(core, &self.players, self.limits),
        ));
        Ok(player_id)
    }

    /// Removes a player.
    ///
    /// Outside `Running` this is a plain removal. During a game, the turn
    /// index is renumbered before anything else: it is decremented
    /// (modulo the pre-removal roster size) exactly when the departing
    /// index is at or below it. If the departing player held the turn,
    /// the turn advances; if the removal leaves a lone player in a
    /// multiplayer game, the game ends with that player as the outcome.
    /// `PLAYER_LEFT` always fires last, carrying the post-removal
    /// snapshot, so an end-of-game triggered here is observed *before*
    /// the departure.
    pub fn leave(&mut self, player_id: &PlayerId, ctx: &mut EngineCtx<'_>) -> Result<(), GameError> {
        self.core_ref()?;
        let index = self.index_of(player_id)?;

        if self.state() != GameState::Running {
            self.players.remove(index);
            let core = self.core_ref()?;
            ctx.bus.publish(&GameEvent::game(
                EventKind::PlayerLeft,
                snapshot(core, &self.players, self.limits),
            ));
            return Ok(());
        }

        let len = self.players.len();
        let core = self.core.as_mut().ok_or(GameError::NotInitialized)?;
        let old_current = core.current;
        if let Some(current) = core.current {
            if index <= current {
                core.current = Some((current + len - 1) % len);
            }
        }
        self.players.remove(index);

        if old_current == Some(index) {
            self.next(ctx)?;
        } else if self.players.len() <= 1 && self.limits.min > 1 {
            let winner = self.players.first().map(|p| p.id().clone());
            self.end(winner, ctx)?;
        }

        let core = self.core_ref()?;
        ctx.bus.publish(&GameEvent::game(
            EventKind::PlayerLeft,
            snapshot(core, &self.players, self.limits),
        ));
        Ok(())
    }

    /// Starts the game: requires `Waiting` and a roster inside the
    /// limits. Shuffles the roster if enabled, emits `GAME_STARTED`, then
    /// performs the first turn advance.
    pub fn start(&mut self, ctx: &mut EngineCtx<'_>) -> Result<(), GameError> {
        match self.state() {
            GameState::NotInitialized => return Err(GameError::NotInitialized),
            GameState::Waiting => {}
            GameState::Running | GameState::Ended => return Err(GameError::AlreadyStarted),
        }
        if self.players.len() < self.limits.min {
            return Err(GameError::NotEnoughPlayers {
                expected: self.limits.min,
                got: self.players.len(),
            });
        }
        if self.players.len() > self.limits.max {
            return Err(GameError::TooManyPlayers {
                expected: self.limits.max,
                got: self.players.len(),
            });
        }

        if self.shuffle_before_start {
            fisher_yates(&mut self.players);
        }

        let core = self.core.as_mut().ok_or(GameError::NotInitialized)?;
        core.state = GameState::Running;
        let core = self.core_ref()?;
        ctx.bus.publish(&GameEvent::game(
            EventKind::GameStarted,
            snapshot(core, &self.players, self.limits),
        ));

        self.next(ctx)
    }

    /// Validates and dispatches one player action. A `true` return from
    /// the rules hook means the turn is over and the engine advances.
    pub fn handle_action(
        &mut self,
        player_id: &PlayerId,
        action: &Map<String, Value>,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<(), GameError> {
        self.core_ref()?;
        if self.state() != GameState::Running {
            return Err(GameError::NotStarted);
        }

        for field in self.rules.action_fields() {
            if !action.contains_key(*field) {
                return Err(GameError::InvalidAction(format!(
                    "action is missing required field: {field}"
                )));
            }
        }
        self.index_of(player_id)?;

        let core = self.core.as_mut().ok_or(GameError::NotInitialized)?;
        let mut turn_ctx = TurnCtx {
            core,
            players: &mut self.players,
            limits: self.limits,
            bus: &mut *ctx.bus,
        };
        let turn_over = self
            .rules
            .on_player_action(&mut turn_ctx, player_id.clone(), action)?;

        if turn_over {
            self.next(ctx)?;
        }
        Ok(())
    }

    /// Merge-patches the game-specific data.
    ///
    /// Engine-owned fields are rejected; a `player_ids` entry must be a
    /// permutation of the live roster and reorders it in place while the
    /// active player keeps the turn. Emits `GAME_DATA_CHANGED` unless
    /// `send_event` is false.
    pub fn update_game_data(
        &mut self,
        patch: Map<String, Value>,
        send_event: bool,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<(), GameError> {
        let core = self.core.as_mut().ok_or(GameError::NotInitialized)?;
        apply_game_patch(
            core,
            &mut self.players,
            self.limits,
            patch,
            send_event,
            ctx.bus,
        )
    }

    /// Merge-patches one player's data and emits `PLAYER_DATA_CHANGED`
    /// scoped to that player.
    pub fn update_player_data(
        &mut self,
        player_id: &PlayerId,
        patch: &Map<String, Value>,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<(), GameError> {
        self.core_ref()?;
        let index = self.index_of(player_id)?;
        self.players[index].apply_patch(patch)?;
        let core = self.core_ref()?;
        ctx.bus.publish(&GameEvent::player(
            EventKind::PlayerDataChanged,
            core.game_id.clone(),
            self.players[index].data().clone(),
        ));
        Ok(())
    }

    pub fn players(&self) -> &[GamePlayer] {
        &self.players
    }

    /// Advances the turn: a winner (or a lone remaining player in a
    /// multiplayer game) ends the game; otherwise the index moves on and
    /// `NEXT_TURN` is *deferred* onto the registry queue, so the caller's
    /// synchronous work completes before subscribers observe the new
    /// turn.
    fn next(&mut self, ctx: &mut EngineCtx<'_>) -> Result<(), GameError> {
        let core = self.core.as_ref().ok_or(GameError::NotInitialized)?;
        if core.state != GameState::Running {
            return Err(GameError::NotStarted);
        }

        let view = RulesView {
            core,
            players: &self.players,
            limits: self.limits,
        };
        let mut winner = self.rules.check_win_condition(&view);

        if winner.is_some() || (self.players.len() <= 1 && self.limits.min > 1) {
            if winner.is_none() && self.players.len() == 1 {
                winner = Some(self.players[0].id().clone());
            }
            return self.end(winner, ctx);
        }

        let len = self.players.len();
        let core = self.core.as_mut().ok_or(GameError::NotInitialized)?;
        core.current = Some(core.current.map(|c| c + 1).unwrap_or(0) % len);
        ctx.deferred.push_back(core.game_id.clone());
        Ok(())
    }

    /// Terminal transition; records the winner and emits `GAME_ENDED`.
    fn end(&mut self, winner: Option<PlayerId>, ctx: &mut EngineCtx<'_>) -> Result<(), GameError> {
        let core = self.core.as_mut().ok_or(GameError::NotInitialized)?;
        if core.state != GameState::Running {
            return Err(GameError::NotStarted);
        }
        core.state = GameState::Ended;
        core.winner = winner;

        let core = self.core_ref()?;
        tracing::debug!(game_id = %core.game_id, winner = ?core.winner, "game ended");
        ctx.bus.publish(&GameEvent::game(
            EventKind::GameEnded,
            snapshot(core, &self.players, self.limits),
        ));
        Ok(())
    }

    fn core_ref(&self) -> Result<&SessionCore, GameError> {
        self.core.as_ref().ok_or(GameError::NotInitialized)
    }

    fn index_of(&self, player_id: &PlayerId) -> Result<usize, GameError> {
        self.players
            .iter()
            .position(|p| p.id() == player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.clone()))
    }
}

fn snapshot(core: &SessionCore, players: &[GamePlayer], limits: PlayerLimits) -> GameData {
    GameData {
        game_id: core.game_id.clone(),
        state: core.state,
        min_players: limits.min,
        max_players: limits.max,
        player_ids: players.iter().map(|p| p.id().clone()).collect(),
        players: players
            .iter()
            .map(|p| PlayerSummary {
                name: p.name().to_string(),
                player_id: p.id().clone(),
            })
            .collect(),
        current_player_index: core.current.map(|i| i as i64).unwrap_or(-1),
        winner_id: core.winner.clone(),
        extra: core.extra.clone(),
    }
}

fn apply_game_patch(
    core: &mut SessionCore,
    players: &mut Vec<GamePlayer>,
    limits: PlayerLimits,
    mut patch: Map<String, Value>,
    send_event: bool,
    bus: &mut EventBus,
) -> Result<(), GameError> {
    for &key in RESERVED_GAME_FIELDS {
        if patch.contains_key(key) {
            return Err(GameError::ForbiddenFieldUpdate(key));
        }
    }


    if let Some(value) = patch.remove("player_ids") {
        let new_order: Vec<PlayerId> = serde_json::from_value(value)
            .map_err(|e| GameError::InvalidPlayerIdUpdate(e.to_string()))?;
        if new_order.len() != players.len() {
            return Err(GameError::InvalidPlayerIdUpdate(
                "length does not match".into(),
            ));
        }
        if !players.iter().all(|p| new_order.contains(p.id())) {
            return Err(GameError::InvalidPlayerIdUpdate("ids do not match".into()));
        }

        let current_id = core.current.and_then(|i| players.get(i)).map(|p| p.id().clone());
        let mut reordered = Vec::with_capacity(players.len());
        for id in &new_order {
            let position = players
                .iter()
                .position(|p| p.id() == id)
                .expect("validated as a permutation above");
            reordered.push(players.remove(position));
        }
        *players = reordered;
        if let Some(current_id) = current_id {
            core.current = players.iter().position(|p| p.id() == &current_id);
        }
    }

    for (key, value) in patch {
        core.extra.insert(key, value);
    }

    if send_event {
        bus.publish(&GameEvent::game(
            EventKind::GameDataChanged,
            snapshot(core, players, limits),
        ));
    }
    Ok(())
}

/// Read-only view handed to `check_win_condition`.
pub struct RulesView<'a> {
    core: &'a SessionCore,
    players: &'a [GamePlayer],
    limits: PlayerLimits,
}

impl RulesView<'_> {
    /// A fresh snapshot of the session.
    pub fn game_data(&self) -> GameData {
        snapshot(self.core, self.players, self.limits)
    }

    /// The game-specific data blob.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.core.extra
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The id of the player at a roster position.
    pub fn player_at(&self, index: usize) -> Option<&PlayerId> {
        self.players.get(index).map(|p| p.id())
    }

    /// The id of the player whose turn it is.
    pub fn current_player(&self) -> Option<&PlayerId> {
        self.core
            .current
            .and_then(|i| self.players.get(i))
            .map(|p| p.id())
    }
}

/// Mutable context handed to `on_player_action`.
pub struct TurnCtx<'a> {
    core: &'a mut SessionCore,
    players: &'a mut Vec<GamePlayer>,
    limits: PlayerLimits,
    bus: &'a mut EventBus,
}

impl TurnCtx<'_> {
    /// A fresh snapshot of the session.
    pub fn game_data(&self) -> GameData {
        snapshot(self.core, self.players, self.limits)
    }

    /// The game-specific data blob.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.core.extra
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_at(&self, index: usize) -> Option<&PlayerId> {
        self.players.get(index).map(|p| p.id())
    }

    pub fn current_player(&self) -> Option<&PlayerId> {
        self.core
            .current
            .and_then(|i| self.players.get(i))
            .map(|p| p.id())
    }

    /// Merge-patches the game data and emits `GAME_DATA_CHANGED`.
    pub fn update_game_data(&mut self, patch: Map<String, Value>) -> Result<(), GameError> {
        apply_game_patch(self.core, self.players, self.limits, patch, true, self.bus)
    }

    /// Merge-patches the game data without emitting an event.
    pub fn update_game_data_silent(&mut self, patch: Map<String, Value>) -> Result<(), GameError> {
        apply_game_patch(self.core, self.players, self.limits, patch, false, self.bus)
    }

    /// Merge-patches one player's data and emits `PLAYER_DATA_CHANGED`.
    pub fn update_player_data(
        &mut self,
        player_id: &PlayerId,
        patch: &Map<String, Value>,
    ) -> Result<(), GameError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id() == player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.clone()))?;
        self.players[index].apply_patch(patch)?;
        self.bus.publish(&GameEvent::player(
            EventKind::PlayerDataChanged,
            self.core.game_id.clone(),
            self.players[index].data().clone(),
        ));
        Ok(())
    }
}
