//! Built-in games for Parlor.
//!
//! Each game is a [`GameRules`](parlor_engine::GameRules) implementation
//! plus a [`GameType`](parlor_engine::GameType) constructor to register
//! it with. The board lives in the engine-owned game-data blob, so
//! clients see it inside every snapshot-carrying event.

mod connect_four;
mod tiktaktoe;

pub use connect_four::ConnectFour;
pub use tiktaktoe::TikTakToe;
