//! Per-connection gateway: the sole translation point between the wire
//! and the coordinator.
//!
//! Each accepted socket gets one handler task. Inbound frames are
//! decoded into [`ClientMessage`]s and dispatched into the coordinator
//! under the shared lock; after every dispatch the coordinator is
//! pumped, which relays session events and publishes deferred next-turn
//! events. Outbound traffic flows through an unbounded mailbox drained
//! by a writer task, so coordinator code never awaits the socket.

use futures_util::{SinkExt, StreamExt};
use parlor_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage};
use parlor_room::{ClientSender, ConnectionId, JoinRequest, RoomError, RoomOutbound};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::server::SharedCoordinator;
use crate::ServerError;

/// Handles one connection from accept to close.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    conn_id: ConnectionId,
    state: SharedCoordinator,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut inbound) = ws.split();
    let codec = JsonCodec;

    // Outbound mailbox: the coordinator holds a clone of `out_tx` inside
    // the room membership; this task is the only writer to the socket.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RoomOutbound>();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = out_rx.recv().await {
            let message = ServerMessage::from(outbound);
            let Ok(bytes) = codec.encode(&message) else {
                continue;
            };
            let Ok(text) = String::from_utf8(bytes) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // A connection that joins no room within the grace period is closed.
    let join_grace = state.lock().await.config().join_grace;
    let grace = tokio::time::sleep(join_grace);
    tokio::pin!(grace);
    let mut grace_passed = false;

    loop {
        tokio::select! {
            _ = &mut grace, if !grace_passed => {
                grace_passed = true;
                if !state.lock().await.is_member(conn_id) {
                    tracing::debug!(%conn_id, "no room joined within grace, disconnecting");
                    break;
                }
            }
            frame = inbound.next() => {
                let data = match frame {
                    None | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(Message::Binary(bytes))) => bytes.into(),
                    Some(Ok(_)) => continue, // ping/pong/frame
                    Some(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "receive failed");
                        break;
                    }
                };

                let message: ClientMessage = match codec.decode(&data) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "undecodable frame");
                        let _ = out_tx.send(RoomOutbound::Error {
                            message: "invalid message".to_string(),
                        });
                        continue;
                    }
                };

                dispatch(conn_id, message, &state, &out_tx).await;
            }
        }
    }

    // Implicit leave plus the empty-room check, then release the writer
    // by dropping our sender (the coordinator dropped its clone above).
    {
        let mut coordinator = state.lock().await;
        coordinator.disconnect(conn_id);
        coordinator.pump();
    }
    drop(out_tx);
    let _ = writer.await;
    tracing::debug!(%conn_id, "connection closed");
    Ok(())
}

/// Runs one inbound message against the coordinator and pumps the
/// event relays. Operation failures go back to the initiator only.
async fn dispatch(
    conn_id: ConnectionId,
    message: ClientMessage,
    state: &SharedCoordinator,
    out_tx: &ClientSender,
) {
    let mut coordinator = state.lock().await;
    let result: Result<(), RoomError> = match message {
        ClientMessage::Join {
            name,
            hash,
            password,
        } => {
            coordinator.join(
                conn_id,
                out_tx.clone(),
                JoinRequest {
                    name,
                    hash,
                    password,
                },
            );
            Ok(())
        }
        ClientMessage::Action { data } => match data.as_object() {
            Some(action) => coordinator.action(conn_id, action),
            None => {
                let _ = out_tx.send(RoomOutbound::Error {
                    message: "action must be an object".to_string(),
                });
                Ok(())
            }
        },
        ClientMessage::Leave => coordinator.leave(conn_id),
        ClientMessage::Start => coordinator.start(conn_id),
        ClientMessage::Recreate => coordinator.recreate(conn_id),
        ClientMessage::Message { text } => coordinator.message(conn_id, &text),
    };

    if let Err(e) = result {
        let _ = out_tx.send(RoomOutbound::Error {
            message: e.to_string(),
        });
    }
    coordinator.pump();
}
