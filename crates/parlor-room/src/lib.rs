//! Room coordination for Parlor.
//!
//! A room is a joinable lobby: a short code, an optional password, and
//! at most one live game session at a time. The [`RoomCoordinator`] owns
//! the engine registry and every room, maps connections to rooms,
//! enforces the password gate and ownership rules, relays session events
//! to the right connections, and garbage-collects empty rooms.
//!
//! The coordinator is synchronous: the gateway serializes all calls on
//! one timeline and calls [`RoomCoordinator::pump`] after each one to
//! drain event relays and deferred turns.

mod coordinator;
mod credentials;
mod error;
mod room;

use std::fmt;

pub use coordinator::{CoordinatorConfig, JoinRequest, RoomCoordinator};
pub use credentials::{client_pseudonym, PasswordScheme, SaltedDigest};
pub use error::RoomError;
pub use room::{ClientSender, RoomNeeds, RoomOutbound, SystemNotice};

/// Opaque identifier for one network connection, assigned by the
/// gateway at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
