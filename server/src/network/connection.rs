// polypong/server/src/network/connection.rs
use super::protocol::{parse_client_message, ClientMessage, InitPayload, ServerMessage};
use crate::core::error::ServerError;
use crate::core::types::{MoveDirection, SocketId};
use crate::server::game_loop::RoomHandle;
use crate::server::instance::PolyPongServer;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

pub type OutboundSender = mpsc::UnboundedSender<Message>;

/// The connection's current room plus the task relaying that room's broadcasts.
struct Membership {
    room_id: String,
    handle: RoomHandle,
    relay: JoinHandle<()>,
}

enum Flow {
    Continue,
    Close,
}

pub async fn handle_connection(ws: WebSocket, server: Arc<PolyPongServer>) {
    let socket_id: SocketId = Arc::new(Uuid::new_v4().to_string());
    info!("[{}]: New WebSocket connection.", socket_id);

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let socket_id_fwd = socket_id.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let closing = msg.is_close();
            if ws_tx.send(msg).await.is_err() {
                warn!("[{}]: WebSocket send error, terminating forwarder.", socket_id_fwd);
                break;
            }
            if closing {
                break;
            }
        }
        debug!("[{}]: Forwarder task ended.", socket_id_fwd);
    });

    let mut membership: Option<Membership> = None;

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) => {
                if msg.is_close() {
                    info!("[{}]: WebSocket closed by client.", socket_id);
                    break;
                }
                let Ok(text) = msg.to_str() else {
                    debug!("[{}]: Ignoring non-text frame.", socket_id);
                    continue;
                };
                let flow = handle_text(text, &socket_id, &server, &outbound_tx, &mut membership).await;
                if let Flow::Close = flow {
                    break;
                }
            }
            Err(e) => {
                warn!("[{}]: WebSocket error: {}", socket_id, e);
                break;
            }
        }
    }

    cleanup_connection(&socket_id, membership.take());
    drop(outbound_tx);
    if let Err(e) = forwarder.await {
        error!("[{}]: Forwarder task failed: {}", socket_id, e);
    }
    info!("[{}]: Connection handler ending.", socket_id);
}

async fn handle_text(
    text: &str,
    socket_id: &SocketId,
    server: &Arc<PolyPongServer>,
    outbound: &OutboundSender,
    membership: &mut Option<Membership>,
) -> Flow {
    let message = match parse_client_message(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("[{}]: {}. Content: '{}'", socket_id, e, text);
            send(outbound, &ServerMessage::error(e.to_string()));
            return Flow::Continue;
        }
    };

    match message {
        ClientMessage::JoinRoom(payload) => {
            if let Err(ServerError::WrongInstance { expected, current }) = server.check_instance(payload.instance()) {
                warn!(
                    "[{}]: Join for instance {} reached {}, closing.",
                    socket_id, expected, current
                );
                send(outbound, &ServerMessage::wrong_instance(&expected, &current));
                let _ = outbound.send(Message::close());
                return Flow::Close;
            }

            // Switching rooms leaves the previous one first.
            cleanup_connection(socket_id, membership.take());

            let room_id = payload.room_id().to_string();
            match server.join_room(&room_id, socket_id.clone()).await {
                Ok(joined) => {
                    let outcome = joined.outcome;
                    if outcome.player_index < 0 {
                        info!("[{}]: Joined room {} as spectator.", socket_id, room_id);
                    } else {
                        info!("[{}]: Joined room {} on edge {}.", socket_id, room_id, outcome.player_index);
                    }
                    send(
                        outbound,
                        &ServerMessage::Init(InitPayload {
                            player_index: outcome.player_index,
                            sides: outcome.sides,
                            instance_id: server.instance_id().to_string(),
                        }),
                    );
                    let relay = spawn_relay(socket_id.clone(), outcome.events, outbound.clone());
                    *membership = Some(Membership {
                        room_id,
                        handle: joined.handle,
                        relay,
                    });
                }
                Err(e) => {
                    error!("[{}]: Failed to join room {}: {}", socket_id, room_id, e);
                    send(outbound, &ServerMessage::error(e.to_string()));
                }
            }
        }
        ClientMessage::Input(input) => {
            let Some(current) = membership.as_ref() else {
                send(outbound, &ServerMessage::error("Not in a room"));
                return Flow::Continue;
            };
            match MoveDirection::try_from(input.dir) {
                Ok(direction) => current.handle.input(socket_id.clone(), direction),
                Err(dir) => warn!("[{}]: Ignoring input with invalid dir {}.", socket_id, dir),
            }
        }
        ClientMessage::ToggleReady(ready) => match membership.as_ref() {
            Some(current) => current.handle.toggle_ready(socket_id.clone(), ready.is_ready),
            None => {
                send(outbound, &ServerMessage::error("Not in a room"));
            }
        },
        ClientMessage::RequestRestart => match membership.as_ref() {
            Some(current) => current.handle.toggle_ready(socket_id.clone(), true),
            None => {
                send(outbound, &ServerMessage::error("Not in a room"));
            }
        },
    }
    Flow::Continue
}

/// Copies room broadcasts onto this connection until the room or the socket goes away.
fn spawn_relay(
    socket_id: SocketId,
    mut events: broadcast::Receiver<ServerMessage>,
    outbound: OutboundSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(message) => {
                    if !send(&outbound, &message) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[{}]: Lagging behind room broadcasts, skipped {}.", socket_id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("[{}]: Room broadcast closed.", socket_id);
                    break;
                }
            }
        }
    })
}

/// Returns false once the connection's outbound side is gone.
fn send(outbound: &OutboundSender, message: &ServerMessage) -> bool {
    match message.to_json() {
        Ok(json) => outbound.send(Message::text(json)).is_ok(),
        Err(e) => {
            error!("{}", e);
            true
        }
    }
}

fn cleanup_connection(socket_id: &SocketId, membership: Option<Membership>) {
    let Some(membership) = membership else {
        return;
    };
    info!("[{}]: Leaving room {}.", socket_id, membership.room_id);
    membership.relay.abort();
    membership.handle.leave(socket_id.clone());
}
