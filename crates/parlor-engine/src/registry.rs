//! The game-type registry and live-session arena.
//!
//! The registry maps namespaces to factories, owns every live
//! [`GameSession`], owns the event bus, and holds the deferred-turn
//! queue. Sessions are never handed out by reference; every operation
//! goes through a registry method that resolves the session and runs the
//! call on the shared timeline.

use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value};

use crate::bus::{EventBus, EventFilter, EventMailbox, SubscriptionId};
use crate::error::GameError;
use crate::event::{EventKind, GameData, GameEvent, GameState};
use crate::ids::{next_free_ordinal, GameId, PlayerId};
use crate::rules::GameRules;
use crate::session::{EngineCtx, GameSession};

/// A registered game type: a namespace and a factory producing fresh
/// rules values.
pub struct GameType {
    namespace: String,
    factory: Box<dyn Fn() -> Box<dyn GameRules> + Send + Sync>,
}

impl GameType {
    pub fn new(
        namespace: impl Into<String>,
        factory: impl Fn() -> Box<dyn GameRules> + Send + Sync + 'static,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            factory: Box::new(factory),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Owns all registered game types and live sessions.
pub struct GameRegistry {
    registered: HashMap<String, GameType>,
    sessions: HashMap<GameId, GameSession>,
    bus: EventBus,
    deferred_turns: VecDeque<GameId>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
            sessions: HashMap::new(),
            bus: EventBus::new(),
            deferred_turns: VecDeque::new(),
        }
    }

    /// Registers a game type. Duplicate namespaces fail.
    pub fn register(&mut self, game_type: GameType) -> Result<(), GameError> {
        if self.registered.contains_key(game_type.namespace()) {
            return Err(GameError::AlreadyRegistered(
                game_type.namespace().to_string(),
            ));
        }
        tracing::debug!(namespace = game_type.namespace(), "game type registered");
        self.registered
            .insert(game_type.namespace().to_string(), game_type);
        Ok(())
    }

    pub fn is_registered(&self, namespace: &str) -> bool {
        self.registered.contains_key(namespace)
    }

    /// Instantiates a session of the given namespace: allocates the
    /// smallest free ordinal for that namespace, runs `init`, and retains
    /// the session until it is explicitly deleted.
    pub fn create(&mut self, namespace: &str) -> Result<GameId, GameError> {
        let game_type = self
            .registered
            .get(namespace)
            .ok_or_else(|| GameError::NotRegistered(namespace.to_string()))?;

        let ordinal = next_free_ordinal(
            self.sessions
                .keys()
                .filter(|id| id.namespace == namespace)
                .map(|id| id.ordinal),
        );
        let game_id = GameId::new(namespace, ordinal);

        let mut session = GameSession::new((game_type.factory)());
        let mut ctx = EngineCtx {
            bus: &mut self.bus,
            deferred: &mut self.deferred_turns,
        };
        session.init(game_id.clone(), &mut ctx)?;
        self.sessions.insert(game_id.clone(), session);

        tracing::info!(%game_id, "game created");
        Ok(game_id)
    }

    /// Adds a player to a session. Without a supplied id, the session
    /// allocates its smallest free player ordinal.
    pub fn join(
        &mut self,
        game_id: &GameId,
        name: &str,
        player_id: Option<PlayerId>,
    ) -> Result<PlayerId, GameError> {
        let session = self
            .sessions
            .get_mut(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.clone()))?;
        let mut ctx = EngineCtx {
            bus: &mut self.bus,
            deferred: &mut self.deferred_turns,
        };
        session.join(name, player_id, &mut ctx)
    }

    /// Picks the id a join would allocate, without joining. For callers
    /// that must record the id before the join events fire.
    pub fn allocate_player_id(&self, game_id: &GameId) -> Result<PlayerId, GameError> {
        self.sessions
            .get(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.clone()))?
            .allocate_player_id()
    }

    /// Removes a player; the owning session is resolved from the id.
    pub fn leave(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        let session = self
            .sessions
            .get_mut(&player_id.game)
            .ok_or_else(|| GameError::GameNotFound(player_id.game.clone()))?;
        let mut ctx = EngineCtx {
            bus: &mut self.bus,
            deferred: &mut self.deferred_turns,
        };
        session.leave(player_id, &mut ctx)
    }

    /// Dispatches one player action to its session.
    pub fn send_action(
        &mut self,
        game_id: &GameId,
        player_id: &PlayerId,
        action: &Map<String, Value>,
    ) -> Result<(), GameError> {
        let session = self
            .sessions
            .get_mut(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.clone()))?;
        let mut ctx = EngineCtx {
            bus: &mut self.bus,
            deferred: &mut self.deferred_turns,
        };
        session.handle_action(player_id, action, &mut ctx)
    }

    pub fn start(&mut self, game_id: &GameId) -> Result<(), GameError> {
        let session = self
            .sessions
            .get_mut(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.clone()))?;
        let mut ctx = EngineCtx {
            bus: &mut self.bus,
            deferred: &mut self.deferred_turns,
        };
        session.start(&mut ctx)
    }

    /// Merge-patches one player's data in its owning session.
    pub fn update_player_data(
        &mut self,
        player_id: &PlayerId,
        patch: &Map<String, Value>,
    ) -> Result<(), GameError> {
        let session = self
            .sessions
            .get_mut(&player_id.game)
            .ok_or_else(|| GameError::GameNotFound(player_id.game.clone()))?;
        let mut ctx = EngineCtx {
            bus: &mut self.bus,
            deferred: &mut self.deferred_turns,
        };
        session.update_player_data(player_id, patch, &mut ctx)
    }

    /// Removes a session from the live arena, freeing its ordinal for
    /// reuse. Subscribers are not detached; they dispose their own
    /// subscriptions when they observe `GAME_ENDED`.
    pub fn delete_game(&mut self, game_id: &GameId) -> bool {
        let removed = self.sessions.remove(game_id).is_some();
        if removed {
            tracing::debug!(%game_id, "game deleted");
        }
        removed
    }

    /// Snapshot of one session's data.
    pub fn game_data(&self, game_id: &GameId) -> Result<GameData, GameError> {
        self.sessions
            .get(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.clone()))?
            .game_data()
    }

    pub fn game_state(&self, game_id: &GameId) -> Option<GameState> {
        self.sessions.get(game_id).map(|s| s.state())
    }

    /// Ids of live sessions, optionally filtered by namespace and state.
    /// Pure snapshot with no side effects.
    pub fn running_games(
        &self,
        namespace: Option<&str>,
        state: Option<GameState>,
    ) -> Vec<GameId> {
        self.sessions
            .iter()
            .filter(|(id, session)| {
                namespace.is_none_or(|ns| id.namespace == ns)
                    && state.is_none_or(|s| session.state() == s)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Subscribes to the shared bus.
    pub fn subscribe(&mut self, filter: EventFilter) -> (SubscriptionId, EventMailbox) {
        self.bus.subscribe(filter)
    }

    /// Subscribes to every event of one session.
    pub fn subscribe_game(&mut self, game_id: GameId) -> (SubscriptionId, EventMailbox) {
        self.bus.subscribe(EventFilter::game(game_id))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    /// Whether any next-turn events are waiting to be published.
    pub fn has_deferred(&self) -> bool {
        !self.deferred_turns.is_empty()
    }

    /// Publishes every queued `NEXT_TURN`, in order, each with a fresh
    /// snapshot taken at publish time. Sessions deleted since the turn
    /// was queued are skipped.
    ///
    /// This is the engine's single deliberate break from synchronous
    /// delivery: the caller that triggered a turn advance finishes its
    /// own call stack (and any further synchronous state changes) before
    /// downstream subscribers observe the new turn.
    pub fn flush_deferred(&mut self) -> usize {
        let mut published = 0;
        while let Some(game_id) = self.deferred_turns.pop_front() {
            let Some(session) = self.sessions.get(&game_id) else {
                continue;
            };
            let Ok(data) = session.game_data() else {
                continue;
            };
            self.bus.publish(&GameEvent::game(EventKind::NextTurn, data));
            published += 1;
        }
        published
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}
