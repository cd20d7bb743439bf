//! The messages that travel on the wire.
//!
//! Every frame is one internally tagged JSON object: a `type` field
//! names the message, the remaining fields are its payload. This keeps
//! the format trivial to produce and consume from a browser client.

use parlor_engine::GameEvent;
use parlor_room::{RoomOutbound, SystemNotice};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter a room (the `hash` is the room code).
    Join {
        name: String,
        hash: String,
        #[serde(default)]
        password: Option<String>,
    },
    /// A game-specific action object, forwarded to the session.
    Action {
        #[serde(default)]
        data: Value,
    },
    /// Leave the current room.
    Leave,
    /// Start the room's game (owner only).
    Start,
    /// Replace an ended game with a fresh one (owner only).
    Recreate,
    /// A chat line.
    Message { text: String },
}

/// Framework notices carried by [`ServerMessage::SystemEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemEvent {
    /// Your identity inside the room, and whether you own it.
    Youare { name: String, id: String, owner: bool },
    /// Ownership moved to another member.
    OwnerChanged { id: String, name: String },
}

impl From<SystemNotice> for SystemEvent {
    fn from(notice: SystemNotice) -> Self {
        match notice {
            SystemNotice::YouAre { name, id, owner } => Self::Youare { name, id, owner },
            SystemNotice::OwnerChanged { id, name } => Self::OwnerChanged { id, name },
        }
    }
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The join succeeded; carries the room code.
    JoinAccept { room: String },
    /// The join was rejected.
    JoinError { reason: String },
    /// A relayed session or player event.
    GameEvent { event: GameEvent },
    /// A framework notice.
    SystemEvent { event: SystemEvent },
    /// A chat broadcast.
    Message {
        sender: String,
        sender_id: String,
        message: String,
        timestamp: u64,
    },
    /// A generic operation failure, sent only to the initiator.
    Error { message: String },
}

impl From<RoomOutbound> for ServerMessage {
    fn from(outbound: RoomOutbound) -> Self {
        match outbound {
            RoomOutbound::JoinAccept { room } => Self::JoinAccept { room },
            RoomOutbound::JoinError { reason } => Self::JoinError { reason },
            RoomOutbound::GameEvent(event) => Self::GameEvent { event },
            RoomOutbound::System(notice) => Self::SystemEvent {
                event: notice.into(),
            },
            RoomOutbound::Chat {
                sender,
                sender_id,
                message,
                timestamp,
            } => Self::Message {
                sender,
                sender_id,
                message,
                timestamp,
            },
            RoomOutbound::Error { message } => Self::Error { message },
        }
    }
}

/// Create-room request, as posted by the HTTP-style collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub namespace: String,
    pub has_password: bool,
    #[serde(default)]
    pub password: Option<String>,
}

/// Create-room response: the code clients join with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub hash: String,
}
