//! Structured identifiers and the identifier allocator.
//!
//! Game ids scope a session within its game-type namespace; player ids
//! scope a player within its session. Both carry their parent scope so a
//! bare id is always enough to find its owner.
//!
//! Ordinal allocation always returns the smallest unused value, not a
//! running counter: slots vacated by deleted games and departed players
//! are reused, which keeps tests deterministic.

use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Identifies one game session: its type namespace plus an ordinal that
/// is unique among live sessions of that namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId {
    pub namespace: String,
    pub ordinal: u32,
}

impl GameId {
    pub fn new(namespace: impl Into<String>, ordinal: u32) -> Self {
        Self {
            namespace: namespace.into(),
            ordinal,
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace, self.ordinal)
    }
}

/// Identifies one player within one session.
///
/// Ordinals are never reused within a session's lifetime, but a departed
/// player's ordinal may be handed to a later joiner of a *different*
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId {
    pub game: GameId,
    pub ordinal: u32,
}

impl PlayerId {
    pub fn new(game: GameId, ordinal: u32) -> Self {
        Self { game, ordinal }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.game, self.ordinal)
    }
}

/// Returns the smallest non-negative ordinal not present in `existing`.
pub fn next_free_ordinal(existing: impl IntoIterator<Item = u32>) -> u32 {
    let used: HashSet<u32> = existing.into_iter().collect();
    let mut next = 0;
    while used.contains(&next) {
        next += 1;
    }
    next
}

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generates a random room code of `length` letters that does not collide
/// with any code in `existing`.
pub fn random_code<'a>(length: usize, existing: impl IntoIterator<Item = &'a str>) -> String {
    let taken: HashSet<&str> = existing.into_iter().collect();
    let mut rng = rand::rng();
    loop {
        let code: String = (0..length)
            .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
            .collect();
        if !taken.contains(code.as_str()) {
            return code;
        }
    }
}
