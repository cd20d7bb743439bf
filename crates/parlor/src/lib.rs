//! # Parlor
//!
//! A server for short-lived multiplayer turn-based game sessions over
//! persistent WebSocket connections.
//!
//! Games implement [`GameRules`](parlor_engine::GameRules); the server
//! hosts them in password-gated rooms, keeps turn order, and fans state
//! changes back out to the right clients.
//!
//! ```rust,no_run
//! use parlor::{GameServer, ServerError};
//! use parlor_games::TikTakToe;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ServerError> {
//!     let server = GameServer::builder()
//!         .bind("0.0.0.0:7070")
//!         .game(TikTakToe::game_type())
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```

pub mod api;
mod error;
mod gateway;
mod server;

pub use error::ServerError;
pub use server::{GameServer, ServerBuilder, SharedCoordinator};

pub use parlor_engine as engine;
pub use parlor_protocol as protocol;
pub use parlor_room as room;
