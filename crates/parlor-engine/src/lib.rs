//! Turn-based game engine for Parlor.
//!
//! The engine is the lowest layer of the server: it knows nothing about
//! rooms, connections, or the wire format. It owns the per-session turn
//! state machine, the player roster, the game-type registry, and the
//! event bus every state change is published on.
//!
//! # Key types
//!
//! - [`GameRules`]: the trait concrete games implement
//! - [`GameSession`]: one running game instance (roster + turn state)
//! - [`GameRegistry`]: maps game-type namespaces to factories and owns
//!   every live session
//! - [`EventBus`] / [`EventFilter`]: the shared publish/subscribe stream
//! - [`GameError`]: every way an engine operation can fail
//!
//! All engine mutation is synchronous: operations either succeed and
//! publish their events in call order, or fail with a typed error and
//! leave state untouched. The single exception is the next-turn event,
//! which is queued on the registry and only published by
//! [`GameRegistry::flush_deferred`]: see the registry docs for the
//! ordering contract.

mod bus;
mod error;
mod event;
mod ids;
mod player;
mod registry;
mod rules;
mod session;
mod shuffle;

pub use bus::{EventBus, EventFilter, EventMailbox, SubscriptionId};
pub use error::GameError;
pub use event::{EventBody, EventKind, GameData, GameEvent, GameState, PlayerSummary};
pub use ids::{next_free_ordinal, random_code, GameId, PlayerId};
pub use player::{GamePlayer, PlayerData};
pub use registry::{GameRegistry, GameType};
pub use rules::{GameRules, GameSetup, PlayerLimits};
pub use session::{EngineCtx, GameSession, RulesView, TurnCtx};
pub use shuffle::fisher_yates;
