//! The room coordinator: maps connections to rooms to sessions.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parlor_engine::{
    EventFilter, EventKind, GameId, GameRegistry, GameType, PlayerId,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::credentials::{client_pseudonym, PasswordScheme};
use crate::error::RoomError;
use crate::room::{ClientSender, Room, RoomClient, RoomData, RoomNeeds, RoomOutbound, SystemNotice};
use crate::ConnectionId;

/// Display name chat notices are attributed to.
const SYSTEM_SENDER: &str = "System";

/// Tunables for room lifecycle behavior.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Length of generated room codes.
    pub code_length: usize,
    /// How long an empty room survives after creation before the
    /// one-shot sweep fires.
    pub room_grace: Duration,
    /// How long a connection may stay roomless before the gateway
    /// disconnects it.
    pub join_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            code_length: 5,
            room_grace: Duration::from_secs(30),
            join_grace: Duration::from_secs(30),
        }
    }
}

/// A join request as sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    pub hash: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Owns the engine registry and every room; the single mutation point
/// for all room and session state.
///
/// Every operation is synchronous. Failures are typed and leave shared
/// state untouched; `join` additionally unwinds the membership it
/// tentatively created when the session join fails.
pub struct RoomCoordinator {
    registry: GameRegistry,
    rooms: HashMap<String, Room>,
    memberships: HashMap<ConnectionId, String>,
    scheme: Box<dyn PasswordScheme>,
    config: CoordinatorConfig,
}

impl RoomCoordinator {
    pub fn new(scheme: impl PasswordScheme, config: CoordinatorConfig) -> Self {
        Self {
            registry: GameRegistry::new(),
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            scheme: Box::new(scheme),
            config,
        }
    }

    /// Registers a game type with the backing registry.
    pub fn register(&mut self, game_type: GameType) -> Result<(), RoomError> {
        self.registry.register(game_type)?;
        Ok(())
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Read access to the backing registry.
    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    /// Creates a room for the given namespace, with an optional
    /// password, and immediately backs it with a fresh session. Returns
    /// the room code, or `None` if the namespace is unregistered.
    ///
    /// The caller is responsible for scheduling the one-shot
    /// [`sweep_room`](Self::sweep_room) check after
    /// [`CoordinatorConfig::room_grace`].
    pub fn create_room(&mut self, namespace: &str, password: Option<&str>) -> Option<String> {
        if !self.registry.is_registered(namespace) {
            return None;
        }

        let code = parlor_engine::random_code(
            self.config.code_length,
            self.rooms.keys().map(String::as_str),
        );
        let data = RoomData {
            namespace: namespace.to_string(),
            code: code.clone(),
            has_password: password.is_some(),
            credential: password.map(|p| self.scheme.hash(p)),
        };
        self.rooms.insert(code.clone(), Room::new(data));

        if let Err(e) = self.attach_game(&code) {
            tracing::error!(room = %code, error = %e, "backing session creation failed");
            self.rooms.remove(&code);
            return None;
        }

        tracing::info!(room = %code, namespace, "room created");
        Some(code)
    }

    pub fn room_exists(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    /// The pre-join descriptor: which game, and whether a password is
    /// required. Never leaks the credential.
    pub fn needs(&self, code: &str) -> Option<RoomNeeds> {
        self.rooms.get(code).map(Room::needs)
    }

    pub fn is_member(&self, conn: ConnectionId) -> bool {
        self.memberships.contains_key(&conn)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Admits a connection into a room.
    ///
    /// All rejection paths answer on `sender` and return `false`:
    /// membership conflicts and unknown rooms as generic errors, a
    /// failed password gate or session join as a structured join-error.
    /// On success the joiner receives the accept and its identity
    /// notice, and the room is told someone arrived.
    pub fn join(&mut self, conn: ConnectionId, sender: ClientSender, req: JoinRequest) -> bool {
        if self.memberships.contains_key(&conn) {
            let _ = sender.send(RoomOutbound::Error {
                message: RoomError::AlreadyInRoom.to_string(),
            });
            return false;
        }
        let Some(room) = self.rooms.get(&req.hash) else {
            let _ = sender.send(RoomOutbound::Error {
                message: RoomError::RoomNotFound(req.hash.clone()).to_string(),
            });
            return false;
        };

        if room.needs_password() {
            let credential = room
                .data
                .credential
                .as_deref()
                .expect("needs_password implies a credential");
            let accepted = req
                .password
                .as_deref()
                .is_some_and(|p| self.scheme.verify(credential, p));
            if !accepted {
                let _ = sender.send(RoomOutbound::JoinError {
                    reason: RoomError::InvalidCredential.to_string(),
                });
                return false;
            }
        }

        let Some(game) = room.game.clone() else {
            let _ = sender.send(RoomOutbound::JoinError {
                reason: RoomError::NoActiveGame.to_string(),
            });
            return false;
        };

        // Record the membership first so the event relay can already
        // resolve the player, then join the session, unwinding the
        // record if that fails.
        let player_id = match self.registry.allocate_player_id(&game) {
            Ok(id) => id,
            Err(e) => {
                let _ = sender.send(RoomOutbound::JoinError {
                    reason: e.to_string(),
                });
                return false;
            }
        };
        let room = self.rooms.get_mut(&req.hash).expect("looked up above");
        room.clients.push(RoomClient {
            conn,
            name: req.name.clone(),
            player_id: Some(player_id.clone()),
            sender: sender.clone(),
        });

        if let Err(e) = self.registry.join(&game, &req.name, Some(player_id)) {
            let room = self.rooms.get_mut(&req.hash).expect("looked up above");
            room.clients.retain(|c| c.conn != conn);
            let _ = sender.send(RoomOutbound::JoinError {
                reason: e.to_string(),
            });
            return false;
        }

        self.memberships.insert(conn, req.hash.clone());
        let room = self.rooms.get_mut(&req.hash).expect("looked up above");
        if room.owner.is_none() {
            room.owner = Some(conn);
        }
        let owner = room.owner == Some(conn);

        room.send_to(conn, RoomOutbound::JoinAccept {
            room: req.hash.clone(),
        });
        room.send_to(
            conn,
            RoomOutbound::System(SystemNotice::YouAre {
                name: req.name.clone(),
                id: client_pseudonym(conn),
                owner,
            }),
        );
        room.broadcast(&RoomOutbound::Chat {
            sender: SYSTEM_SENDER.to_string(),
            sender_id: "system".to_string(),
            message: format!("{} joined the room", req.name),
            timestamp: now_millis(),
        });

        tracing::debug!(room = %req.hash, %conn, "client joined");
        true
    }

    /// Removes a connection from its room: leaves the backing session,
    /// hands ownership to the earliest remaining member if needed, and
    /// tells the room someone left.
    pub fn leave(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        let code = self.memberships.remove(&conn).ok_or(RoomError::NotInRoom)?;
        let room = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        let index = room.client_index(conn).ok_or(RoomError::NotInRoom)?;
        let client = room.clients.remove(index);
        let was_owner = room.owner == Some(conn);
        let name = client.name;

        if let Some(player_id) = client.player_id {
            if let Err(e) = self.registry.leave(&player_id) {
                tracing::warn!(%player_id, error = %e, "session leave failed");
            }
        }

        let room = self.rooms.get_mut(&code).expect("still present");
        if was_owner {
            room.owner = room.clients.first().map(|c| c.conn);
            if let Some(new_owner) = room.owner {
                let new_name = room.clients[0].name.clone();
                room.broadcast(&RoomOutbound::System(SystemNotice::OwnerChanged {
                    id: client_pseudonym(new_owner),
                    name: new_name.clone(),
                }));
                room.send_to(
                    new_owner,
                    RoomOutbound::System(SystemNotice::YouAre {
                        name: new_name,
                        id: client_pseudonym(new_owner),
                        owner: true,
                    }),
                );
            }
        }
        room.broadcast(&RoomOutbound::Chat {
            sender: SYSTEM_SENDER.to_string(),
            sender_id: "system".to_string(),
            message: format!("{name} left the room"),
            timestamp: now_millis(),
        });

        tracing::debug!(room = %code, %conn, "client left");
        Ok(())
    }

    /// Forwards a game action from a connection to its session.
    pub fn action(
        &mut self,
        conn: ConnectionId,
        action: &Map<String, Value>,
    ) -> Result<(), RoomError> {
        let (game, player_id) = self.resolve_player(conn)?;
        self.registry.send_action(&game, &player_id, action)?;
        Ok(())
    }

    /// Starts the room's game. Owner-only.
    pub fn start(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        let code = self.membership(conn)?;
        let room = self
            .rooms
            .get(&code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        if room.owner != Some(conn) {
            return Err(RoomError::NotOwner);
        }
        let game = room.game.clone().ok_or(RoomError::NoActiveGame)?;
        self.registry.start(&game)?;
        Ok(())
    }

    /// Replaces an ended game with a fresh session and re-joins every
    /// still-connected member with fresh player ids. Owner-only; invalid
    /// while a game is live.
    pub fn recreate(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        let code = self.membership(conn)?;
        {
            let room = self
                .rooms
                .get(&code)
                .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
            if room.owner != Some(conn) {
                return Err(RoomError::NotOwner);
            }
            if room.game.is_some() {
                return Err(RoomError::GameInProgress);
            }
        }

        let game = self.attach_game(&code)?;
        let members: Vec<(ConnectionId, String)> = self
            .rooms
            .get(&code)
            .expect("attached above")
            .clients
            .iter()
            .map(|c| (c.conn, c.name.clone()))
            .collect();
        for (member, name) in members {
            match self.registry.join(&game, &name, None) {
                Ok(player_id) => {
                    let room = self.rooms.get_mut(&code).expect("attached above");
                    if let Some(client) =
                        room.clients.iter_mut().find(|c| c.conn == member)
                    {
                        client.player_id = Some(player_id);
                    }
                }
                Err(e) => {
                    tracing::warn!(%member, error = %e, "re-join after recreate failed");
                }
            }
        }

        tracing::debug!(room = %code, %game, "game recreated");
        Ok(())
    }

    /// Relays a chat line to the whole room, tagged with the sender's
    /// display name and pseudonymous id.
    pub fn message(&mut self, conn: ConnectionId, text: &str) -> Result<(), RoomError> {
        let code = self.membership(conn)?;
        let room = self
            .rooms
            .get(&code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        let name = room
            .client(conn)
            .map(|c| c.name.clone())
            .ok_or(RoomError::NotInRoom)?;
        room.broadcast(&RoomOutbound::Chat {
            sender: name,
            sender_id: client_pseudonym(conn),
            message: text.to_string(),
            timestamp: now_millis(),
        });
        Ok(())
    }

    /// Implicit leave on a dropped connection, followed by the
    /// empty-room check.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        let Some(code) = self.memberships.get(&conn).cloned() else {
            return;
        };
        if let Err(e) = self.leave(conn) {
            tracing::warn!(%conn, error = %e, "leave on disconnect failed");
        }
        self.sweep_room(&code);
    }

    /// Deletes the room (and its backing session) iff it has zero
    /// connected clients. Returns whether it was removed.
    pub fn sweep_room(&mut self, code: &str) -> bool {
        match self.rooms.get(code) {
            Some(room) if room.clients.is_empty() => {}
            _ => return false,
        }
        let room = self.rooms.remove(code).expect("checked above");
        if let Some((id, _)) = room.relay_sub {
            self.registry.unsubscribe(id);
        }
        if let Some((id, _)) = room.end_sub {
            self.registry.unsubscribe(id);
        }
        if let Some(game) = room.game {
            self.registry.delete_game(&game);
        }
        tracing::debug!(room = %code, "room swept");
        true
    }

    /// Drains every room's subscriptions and the deferred-turn queue
    /// until nothing is pending: relays events to members (player-scoped
    /// ones unicast), and runs end-of-game cleanup when `GAME_ENDED`
    /// fires. The gateway calls this after every dispatched inbound
    /// message, which is what makes deferred next-turn events land after
    /// the triggering call completed.
    pub fn pump(&mut self) {
        loop {
            let mut progressed = false;
            let codes: Vec<String> = self.rooms.keys().cloned().collect();
            for code in codes {
                if self.relay_pending(&code) {
                    progressed = true;
                }
                if self.take_end_events(&code) {
                    progressed = true;
                    self.cleanup_game(&code);
                }
            }
            if self.registry.has_deferred() && self.registry.flush_deferred() > 0 {
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Creates a fresh backing session for a room and wires up its
    /// end-of-game and relay subscriptions.
    fn attach_game(&mut self, code: &str) -> Result<GameId, RoomError> {
        let namespace = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.to_string()))?
            .data
            .namespace
            .clone();
        let game = self.registry.create(&namespace)?;
        let end_sub = self
            .registry
            .subscribe(EventFilter::game_kind(game.clone(), EventKind::GameEnded));
        let relay_sub = self.registry.subscribe(EventFilter::game(game.clone()));

        let room = self.rooms.get_mut(code).expect("looked up above");
        room.game = Some(game.clone());
        room.end_sub = Some(end_sub);
        room.relay_sub = Some(relay_sub);
        Ok(game)
    }

    /// Drains a room's relay mailbox and fans the events out. Returns
    /// whether anything was relayed.
    fn relay_pending(&mut self, code: &str) -> bool {
        let events = {
            let Some(room) = self.rooms.get_mut(code) else {
                return false;
            };
            let mut events = Vec::new();
            if let Some((_, mailbox)) = room.relay_sub.as_mut() {
                while let Ok(event) = mailbox.try_recv() {
                    events.push(event);
                }
            }
            events
        };
        if events.is_empty() {
            return false;
        }
        let room = self.rooms.get(code).expect("present");
        for event in &events {
            room.relay(event);
        }
        true
    }

    /// Consumes any pending end-of-game notifications for a room.
    fn take_end_events(&mut self, code: &str) -> bool {
        let Some(room) = self.rooms.get_mut(code) else {
            return false;
        };
        let mut ended = false;
        if let Some((_, mailbox)) = room.end_sub.as_mut() {
            while mailbox.try_recv().is_ok() {
                ended = true;
            }
        }
        ended
    }

    /// End-of-game cleanup, run exactly once per session: removes every
    /// member from the ended game (their departure events are still
    /// relayed), then disposes both subscriptions together and deletes
    /// the session from the registry.
    fn cleanup_game(&mut self, code: &str) {
        let player_ids: Vec<PlayerId> = {
            let Some(room) = self.rooms.get_mut(code) else {
                return;
            };
            room.clients
                .iter_mut()
                .filter_map(|c| c.player_id.take())
                .collect()
        };
        for player_id in &player_ids {
            if let Err(e) = self.registry.leave(player_id) {
                tracing::warn!(%player_id, error = %e, "leave during cleanup failed");
            }
        }
        self.relay_pending(code);

        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        let relay_sub = room.relay_sub.take();
        let end_sub = room.end_sub.take();
        let game = room.game.take();
        if let Some((id, _)) = relay_sub {
            self.registry.unsubscribe(id);
        }
        if let Some((id, _)) = end_sub {
            self.registry.unsubscribe(id);
        }
        if let Some(game) = game {
            self.registry.delete_game(&game);
            tracing::debug!(room = %code, %game, "ended game cleaned up");
        }
    }

    fn membership(&self, conn: ConnectionId) -> Result<String, RoomError> {
        self.memberships
            .get(&conn)
            .cloned()
            .ok_or(RoomError::NotInRoom)
    }

    fn resolve_player(&self, conn: ConnectionId) -> Result<(GameId, PlayerId), RoomError> {
        let code = self.membership(conn)?;
        let room = self
            .rooms
            .get(&code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        let game = room.game.clone().ok_or(RoomError::NoActiveGame)?;
        let player_id = room
            .client(conn)
            .and_then(|c| c.player_id.clone())
            .ok_or(RoomError::NotInRoom)?;
        Ok((game, player_id))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
