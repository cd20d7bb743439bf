//! One room: its metadata, membership, live game, and subscriptions.

use parlor_engine::{EventKind, EventMailbox, GameEvent, GameId, PlayerId, SubscriptionId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ConnectionId;

/// Sending half of a connection's outbound mailbox. The gateway owns the
/// receiving half and translates every value to a wire message.
pub type ClientSender = mpsc::UnboundedSender<RoomOutbound>;

/// Framework-level notices, delivered as `system_event` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemNotice {
    /// Unicast to a connection: its display name, its pseudonymous id,
    /// and whether it currently owns the room.
    YouAre {
        name: String,
        id: String,
        owner: bool,
    },
    /// Broadcast when ownership moves to another member.
    OwnerChanged { id: String, name: String },
}

/// An outbound message from the coordinator to one connection.
#[derive(Debug, Clone)]
pub enum RoomOutbound {
    /// The join succeeded; carries the room code.
    JoinAccept { room: String },
    /// The join was rejected.
    JoinError { reason: String },
    /// A relayed session or player event.
    GameEvent(GameEvent),
    /// A framework notice.
    System(SystemNotice),
    /// A chat line.
    Chat {
        sender: String,
        sender_id: String,
        message: String,
        timestamp: u64,
    },
    /// A generic operation failure, sent only to the initiator.
    Error { message: String },
}

/// What a client needs to know before joining: the game type and whether
/// a password is required. Never contains the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomNeeds {
    pub namespace: String,
    pub password: bool,
}

/// Room metadata. The credential is write-once at creation and never
/// leaves the coordinator.
#[derive(Debug, Clone)]
pub(crate) struct RoomData {
    pub namespace: String,
    pub code: String,
    pub has_password: bool,
    pub credential: Option<String>,
}

/// One connection's membership record inside a room.
pub(crate) struct RoomClient {
    pub conn: ConnectionId,
    pub name: String,
    pub player_id: Option<PlayerId>,
    pub sender: ClientSender,
}

/// A lobby wrapping at most one live session.
///
/// `clients` is insertion-ordered; ownership election relies on that
/// order, so members are never reshuffled.
pub(crate) struct Room {
    pub data: RoomData,
    pub game: Option<GameId>,
    pub relay_sub: Option<(SubscriptionId, EventMailbox)>,
    pub end_sub: Option<(SubscriptionId, EventMailbox)>,
    pub clients: Vec<RoomClient>,
    pub owner: Option<ConnectionId>,
}

impl Room {
    pub fn new(data: RoomData) -> Self {
        Self {
            data,
            game: None,
            relay_sub: None,
            end_sub: None,
            clients: Vec::new(),
            owner: None,
        }
    }

    pub fn needs(&self) -> RoomNeeds {
        RoomNeeds {
            namespace: self.data.namespace.clone(),
            password: self.needs_password(),
        }
    }

    pub fn needs_password(&self) -> bool {
        self.data.has_password && self.data.credential.is_some()
    }

    pub fn client(&self, conn: ConnectionId) -> Option<&RoomClient> {
        self.clients.iter().find(|c| c.conn == conn)
    }

    pub fn client_index(&self, conn: ConnectionId) -> Option<usize> {
        self.clients.iter().position(|c| c.conn == conn)
    }

    /// Sends to every member; dead receivers are silently dropped.
    pub fn broadcast(&self, outbound: &RoomOutbound) {
        for client in &self.clients {
            let _ = client.sender.send(outbound.clone());
        }
    }

    /// Sends to one member, if still present.
    pub fn send_to(&self, conn: ConnectionId, outbound: RoomOutbound) {
        if let Some(client) = self.client(conn) {
            let _ = client.sender.send(outbound);
        }
    }

    /// Relays one session event: player-scoped events go only to the
    /// connection owning that player, everything else to the whole room.
    pub fn relay(&self, event: &GameEvent) {
        if event.kind == EventKind::PlayerDataChanged {
            let Some(player_id) = &event.player_id else {
                tracing::warn!(room = %self.data.code, "player event without player id");
                return;
            };
            match self
                .clients
                .iter()
                .find(|c| c.player_id.as_ref() == Some(player_id))
            {
                Some(client) => {
                    let _ = client.sender.send(RoomOutbound::GameEvent(event.clone()));
                }
                None => {
                    tracing::warn!(
                        room = %self.data.code,
                        %player_id,
                        "no connection owns this player"
                    );
                }
            }
            return;
        }
        self.broadcast(&RoomOutbound::GameEvent(event.clone()));
    }
}
