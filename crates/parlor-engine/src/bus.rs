//! The shared event bus.
//!
//! One bus per registry carries every event from every session. A
//! subscription is a predicate evaluated at publish time (event kind
//! equality or all kinds, plus an optional exact game id), paired with an
//! unbounded mailbox the matching events are pushed into.
//!
//! Delivery is synchronous and in registration order within the
//! publishing call: by the time `publish` returns, every matching
//! subscriber's mailbox holds the event. A subscriber attached mid-stream
//! only sees events from its subscription point forward.

use tokio::sync::mpsc;

use crate::event::{EventKind, GameEvent};
use crate::ids::GameId;

/// Handle identifying one subscription, used to dispose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription.
pub type EventMailbox = mpsc::UnboundedReceiver<GameEvent>;

/// The predicate a subscription applies to every published event.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Match only this kind; `None` matches every kind.
    pub kind: Option<EventKind>,
    /// Match only events of this session; `None` matches every session.
    pub game_id: Option<GameId>,
}

impl EventFilter {
    /// Matches every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches one event kind across all sessions.
    pub fn kind(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            game_id: None,
        }
    }

    /// Matches every event of one session.
    pub fn game(game_id: GameId) -> Self {
        Self {
            kind: None,
            game_id: Some(game_id),
        }
    }

    /// Matches one event kind of one session.
    pub fn game_kind(game_id: GameId, kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            game_id: Some(game_id),
        }
    }

    fn matches(&self, event: &GameEvent) -> bool {
        if let Some(kind) = self.kind {
            if event.kind != kind {
                return false;
            }
        }
        if let Some(game_id) = &self.game_id {
            if &event.game_id != game_id {
                return false;
            }
        }
        true
    }
}

struct Subscriber {
    id: SubscriptionId,
    filter: EventFilter,
    sender: mpsc::UnboundedSender<GameEvent>,
}

/// The process-wide publish/subscribe channel.
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a subscription and returns its handle plus the mailbox
    /// matching events are delivered into. Dropping the mailbox also
    /// disposes the subscription (it is pruned on the next publish).
    pub fn subscribe(&mut self, filter: EventFilter) -> (SubscriptionId, EventMailbox) {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push(Subscriber { id, filter, sender });
        (id, receiver)
    }

    /// Disposes a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|s| s.id != id);
    }

    /// Publishes an event to every matching subscriber, in registration
    /// order. Subscribers whose mailbox was dropped are pruned.
    pub fn publish(&mut self, event: &GameEvent) {
        self.subscribers.retain(|s| {
            if s.filter.matches(event) {
                s.sender.send(event.clone()).is_ok()
            } else {
                !s.sender.is_closed()
            }
        });
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventBody, GameData, GameState};
    use serde_json::Map;

    fn snapshot(game_id: GameId) -> GameData {
        GameData {
            game_id,
            state: GameState::Waiting,
            min_players: 2,
            max_players: 4,
            player_ids: vec![],
            players: vec![],
            current_player_index: -1,
            winner_id: None,
            extra: Map::new(),
        }
    }

    fn event(kind: EventKind, ns: &str, ordinal: u32) -> GameEvent {
        GameEvent::game(kind, snapshot(GameId::new(ns, ordinal)))
    }

    #[test]
    fn test_publish_delivers_to_matching_subscribers() {
        let mut bus = EventBus::new();
        let (_, mut all) = bus.subscribe(EventFilter::all());
        let (_, mut joins) = bus.subscribe(EventFilter::kind(EventKind::PlayerJoined));

        bus.publish(&event(EventKind::PlayerJoined, "g", 0));
        bus.publish(&event(EventKind::GameStarted, "g", 0));

        assert_eq!(all.try_recv().unwrap().kind, EventKind::PlayerJoined);
        assert_eq!(all.try_recv().unwrap().kind, EventKind::GameStarted);
        assert_eq!(joins.try_recv().unwrap().kind, EventKind::PlayerJoined);
        assert!(joins.try_recv().is_err());
    }

    #[test]
    fn test_game_id_filter_is_exact() {
        let mut bus = EventBus::new();
        let (_, mut only_g0) = bus.subscribe(EventFilter::game(GameId::new("g", 0)));

        bus.publish(&event(EventKind::PlayerJoined, "g", 1));
        bus.publish(&event(EventKind::PlayerJoined, "h", 0));
        bus.publish(&event(EventKind::PlayerJoined, "g", 0));

        let got = only_g0.try_recv().unwrap();
        assert_eq!(got.game_id, GameId::new("g", 0));
        assert!(only_g0.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let (id, mut mailbox) = bus.subscribe(EventFilter::all());
        bus.unsubscribe(id);
        bus.publish(&event(EventKind::PlayerJoined, "g", 0));
        assert!(mailbox.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_mailbox_is_pruned_on_publish() {
        let mut bus = EventBus::new();
        let (_, mailbox) = bus.subscribe(EventFilter::all());
        drop(mailbox);
        bus.publish(&event(EventKind::PlayerJoined, "g", 0));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_attached_mid_stream_sees_no_replay() {
        let mut bus = EventBus::new();
        bus.publish(&event(EventKind::PlayerJoined, "g", 0));
        let (_, mut late) = bus.subscribe(EventFilter::all());
        assert!(late.try_recv().is_err());
        bus.publish(&event(EventKind::GameStarted, "g", 0));
        assert_eq!(late.try_recv().unwrap().kind, EventKind::GameStarted);
    }
}
