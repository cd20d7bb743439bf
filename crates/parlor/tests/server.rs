//! End-to-end tests: real sockets, real rooms, a real game of
//! tic-tac-toe.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parlor::api;
use parlor::{GameServer, SharedCoordinator};
use parlor_engine::{EventKind, PlayerId};
use parlor_games::{ConnectFour, TikTakToe};
use parlor_protocol::{ClientMessage, CreateRoomRequest, ServerMessage};
use parlor_room::CoordinatorConfig;
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port; returns its address and the
/// coordinator handle the HTTP-style surface would use.
async fn start_server(config: CoordinatorConfig) -> (String, SharedCoordinator) {
    let server = GameServer::builder()
        .bind("127.0.0.1:0")
        .config(config)
        .game(TikTakToe::game_type())
        .game(ConnectFour::game_type())
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let coordinator = server.coordinator();

    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, coordinator)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

/// Receives the next server message, skipping transport frames.
async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("websocket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).expect("decode"),
            Message::Binary(bytes) => {
                return serde_json::from_slice(&bytes).expect("decode")
            }
            _ => continue,
        }
    }
}

/// Receives messages until the predicate matches one.
async fn recv_until<F>(ws: &mut ClientWs, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        let msg = recv(ws).await;
        if pred(&msg) {
            return msg;
        }
    }
}

async fn create_room(
    coordinator: &SharedCoordinator,
    namespace: &str,
    password: Option<&str>,
) -> String {
    api::create_room(
        coordinator,
        CreateRoomRequest {
            namespace: namespace.into(),
            has_password: password.is_some(),
            password: password.map(String::from),
        },
    )
    .await
    .expect("create room")
    .hash
}

/// Joins a room and waits for the accept; returns this client's player
/// id, learned from the player-data event unicast to it.
async fn join(ws: &mut ClientWs, name: &str, hash: &str, password: Option<&str>) -> PlayerId {
    send(
        ws,
        &ClientMessage::Join {
            name: name.into(),
            hash: hash.into(),
            password: password.map(String::from),
        },
    )
    .await;
    recv_until(ws, |m| matches!(m, ServerMessage::JoinAccept { .. })).await;
    let msg = recv_until(ws, |m| {
        matches!(
            m,
            ServerMessage::GameEvent { event } if event.kind == EventKind::PlayerDataChanged
        )
    })
    .await;
    match msg {
        ServerMessage::GameEvent { event } => event.player_id.expect("player-scoped event"),
        _ => unreachable!(),
    }
}

fn game_event_kind(msg: &ServerMessage, kind: EventKind) -> bool {
    matches!(msg, ServerMessage::GameEvent { event } if event.kind == kind)
}

// =========================================================================
// Rooms and the API surface
// =========================================================================

#[tokio::test]
async fn test_create_room_api_validation() {
    let (_, coordinator) = start_server(CoordinatorConfig::default()).await;

    let bad = api::create_room(
        &coordinator,
        CreateRoomRequest {
            namespace: "".into(),
            has_password: false,
            password: None,
        },
    )
    .await;
    assert_eq!(bad.unwrap_err().status(), 400);

    let bad = api::create_room(
        &coordinator,
        CreateRoomRequest {
            namespace: "tiktaktoe".into(),
            has_password: true,
            password: None,
        },
    )
    .await;
    assert_eq!(bad.unwrap_err().status(), 400);

    let bad = api::create_room(
        &coordinator,
        CreateRoomRequest {
            namespace: "chess".into(),
            has_password: false,
            password: None,
        },
    )
    .await;
    assert_eq!(bad.unwrap_err().status(), 400);

    let hash = create_room(&coordinator, "tiktaktoe", None).await;
    assert_eq!(hash.len(), 5);
    assert!(api::room_exists(&coordinator, &hash).await.is_ok());

    let needs = api::room_needs(&coordinator, &hash).await.unwrap();
    assert_eq!(needs.namespace, "tiktaktoe");
    assert!(!needs.password);

    assert_eq!(
        api::room_exists(&coordinator, "zzzzz")
            .await
            .unwrap_err()
            .status(),
        404
    );
    assert_eq!(
        api::room_needs(&coordinator, "zzzzz")
            .await
            .unwrap_err()
            .status(),
        404
    );
}

#[tokio::test]
async fn test_join_with_password_flow() {
    let (addr, coordinator) = start_server(CoordinatorConfig::default()).await;
    let hash = create_room(&coordinator, "tiktaktoe", Some("secret")).await;
    assert!(api::room_needs(&coordinator, &hash).await.unwrap().password);

    let mut ws = connect(&addr).await;
    send(
        &mut ws,
        &ClientMessage::Join {
            name: "ada".into(),
            hash: hash.clone(),
            password: None,
        },
    )
    .await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::JoinError { .. }));

    send(
        &mut ws,
        &ClientMessage::Join {
            name: "ada".into(),
            hash: hash.clone(),
            password: Some("wrong".into()),
        },
    )
    .await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::JoinError { .. }));

    send(
        &mut ws,
        &ClientMessage::Join {
            name: "ada".into(),
            hash: hash.clone(),
            password: Some("secret".into()),
        },
    )
    .await;
    let accept = recv(&mut ws).await;
    assert!(matches!(
        accept,
        ServerMessage::JoinAccept { room } if room == hash
    ));
    let system = recv(&mut ws).await;
    match system {
        ServerMessage::SystemEvent {
            event: parlor_protocol::SystemEvent::Youare { name, owner, id },
        } => {
            assert_eq!(name, "ada");
            assert!(owner);
            assert!(!id.is_empty());
        }
        other => panic!("expected youare, got {other:?}"),
    }
}

#[tokio::test]
async fn test_operations_outside_a_room_report_errors() {
    let (addr, _) = start_server(CoordinatorConfig::default()).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, &ClientMessage::Start).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::Error { .. }));

    send(
        &mut ws,
        &ClientMessage::Action {
            data: serde_json::json!({"x": 0, "y": 0}),
        },
    )
    .await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::Error { .. }));

    send(&mut ws, &ClientMessage::Leave).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::Error { .. }));
}

#[tokio::test]
async fn test_undecodable_frame_reports_error() {
    let (addr, _) = start_server(CoordinatorConfig::default()).await;
    let mut ws = connect(&addr).await;
    ws.send(Message::Text("not json".into())).await.unwrap();
    assert!(matches!(recv(&mut ws).await, ServerMessage::Error { .. }));
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test]
async fn test_chat_is_broadcast_with_pseudonymous_sender() {
    let (addr, coordinator) = start_server(CoordinatorConfig::default()).await;
    let hash = create_room(&coordinator, "tiktaktoe", None).await;

    let mut ada = connect(&addr).await;
    let mut bob = connect(&addr).await;
    join(&mut ada, "ada", &hash, None).await;
    join(&mut bob, "bob", &hash, None).await;

    send(
        &mut bob,
        &ClientMessage::Message {
            text: "good luck".into(),
        },
    )
    .await;

    for ws in [&mut ada, &mut bob] {
        let msg = recv_until(ws, |m| {
            matches!(m, ServerMessage::Message { sender, .. } if sender == "bob")
        })
        .await;
        match msg {
            ServerMessage::Message {
                sender_id, message, ..
            } => {
                assert_eq!(message, "good luck");
                // Pseudonymous, not the raw connection id.
                assert_eq!(sender_id.len(), 64);
            }
            _ => unreachable!(),
        }
    }
}

// =========================================================================
// A full game
// =========================================================================

#[tokio::test]
async fn test_full_tiktaktoe_game_over_the_wire() {
    let (addr, coordinator) = start_server(CoordinatorConfig::default()).await;
    let hash = create_room(&coordinator, "tiktaktoe", None).await;

    let mut ada = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let ada_id = join(&mut ada, "ada", &hash, None).await;
    let bob_id = join(&mut bob, "bob", &hash, None).await;

    // Owner starts; both clients observe GAME_STARTED then NEXT_TURN
    // with the opening player at index 0.
    send(&mut ada, &ClientMessage::Start).await;
    let started = recv_until(&mut ada, |m| game_event_kind(m, EventKind::GameStarted)).await;
    let order = match &started {
        ServerMessage::GameEvent { event } => {
            event.data.as_game().unwrap().player_ids.clone()
        }
        _ => unreachable!(),
    };
    let next = recv_until(&mut ada, |m| game_event_kind(m, EventKind::NextTurn)).await;
    match &next {
        ServerMessage::GameEvent { event } => {
            assert_eq!(event.data.as_game().unwrap().current_player_index, 0);
        }
        _ => unreachable!(),
    }
    recv_until(&mut bob, |m| game_event_kind(m, EventKind::NextTurn)).await;

    // The roster may be shuffled; sort the clients into turn order.
    let (first_ws, second_ws, first_id) = if order[0] == ada_id {
        (&mut ada, &mut bob, ada_id.clone())
    } else {
        assert_eq!(order[0], bob_id);
        (&mut bob, &mut ada, bob_id.clone())
    };

    // Alternating moves; the opening player takes the main diagonal.
    let moves = [(0u64, 0u64), (1, 0), (1, 1), (2, 0), (2, 2)];
    for (turn, (x, y)) in moves.iter().enumerate() {
        let ws: &mut ClientWs = if turn % 2 == 0 {
            &mut *first_ws
        } else {
            &mut *second_ws
        };
        send(
            ws,
            &ClientMessage::Action {
                data: serde_json::json!({"x": x, "y": y}),
            },
        )
        .await;
    }

    for ws in [first_ws, second_ws] {
        let ended = recv_until(ws, |m| game_event_kind(m, EventKind::GameEnded)).await;
        let data = match &ended {
            ServerMessage::GameEvent { event } => event.data.as_game().unwrap().clone(),
            _ => unreachable!(),
        };
        assert_eq!(data.winner_id.as_ref(), Some(&first_id));

        let board: Vec<Vec<Option<bool>>> =
            serde_json::from_value(data.extra["board"].clone()).unwrap();
        assert_eq!(board[0][0], Some(true));
        assert_eq!(board[1][0], Some(false));
        assert_eq!(board[1][1], Some(true));
        assert_eq!(board[2][0], Some(false));
        assert_eq!(board[2][2], Some(true));
        assert_eq!(
            board.iter().flatten().filter(|c| c.is_some()).count(),
            5
        );
    }
}

// =========================================================================
// Timers
// =========================================================================

#[tokio::test]
async fn test_unjoined_room_is_swept_after_grace() {
    let config = CoordinatorConfig {
        room_grace: Duration::from_millis(200),
        ..CoordinatorConfig::default()
    };
    let (_, coordinator) = start_server(config).await;
    let hash = create_room(&coordinator, "tiktaktoe", None).await;
    assert!(api::room_exists(&coordinator, &hash).await.is_ok());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        api::room_exists(&coordinator, &hash)
            .await
            .unwrap_err()
            .status(),
        404
    );
}

#[tokio::test]
async fn test_occupied_room_survives_grace_then_sweeps_on_disconnect() {
    let config = CoordinatorConfig {
        room_grace: Duration::from_millis(200),
        ..CoordinatorConfig::default()
    };
    let (addr, coordinator) = start_server(config).await;
    let hash = create_room(&coordinator, "tiktaktoe", None).await;

    let mut ws = connect(&addr).await;
    join(&mut ws, "ada", &hash, None).await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(api::room_exists(&coordinator, &hash).await.is_ok());

    // Last member drops: the disconnect path sweeps the room.
    drop(ws);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        api::room_exists(&coordinator, &hash)
            .await
            .unwrap_err()
            .status(),
        404
    );
}

#[tokio::test]
async fn test_idle_connection_is_closed_after_join_grace() {
    let config = CoordinatorConfig {
        join_grace: Duration::from_millis(200),
        ..CoordinatorConfig::default()
    };
    let (addr, _) = start_server(config).await;
    let mut ws = connect(&addr).await;

    // Send nothing; the server closes the connection.
    let closed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match ws.next().await {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection was not closed");
}
