//! One task per connected client. A websocket splits into a
//! reader, driven inline here, and a writer fed by an unbounded channel so
//! that handlers (and the round pacing task) can push to a session without
//! ever touching the socket directly.

use axum::extract::ws::{Message, WebSocket};
use dcnet_common::types::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Per-connection binding state.
#[derive(Default)]
struct SessionCtx {
    group: Option<String>,
    participant: Option<String>,
}

pub async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode outbound message: {e}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut ctx = SessionCtx::default();
    while let Some(Ok(message)) = ws_rx.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match parse_client_message(&text) {
            Ok(client_message) => {
                dispatch(&state, &mut ctx, client_message, &tx).await;
            }
            Err(description) => {
                let _ = tx.send(ServerMessage::error(description));
            }
        }
    }

    cleanup(&state, &ctx).await;
    writer.abort();
}

/// Distinguishes the protocol-format error classes so the client gets
/// an actionable description rather than a raw serde error for the common
/// cases.
fn parse_client_message(text: &str) -> Result<ClientMessage, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| "message must be valid JSON".to_string())?;
    if !value.is_object() {
        return Err("message must be an object".to_string());
    }
    if value.get("type").is_none() {
        return Err("message must specify its type".to_string());
    }
    serde_json::from_value(value).map_err(|e| format!("malformed message: {e}"))
}

async fn dispatch(
    state: &SharedState,
    ctx: &mut SessionCtx,
    message: ClientMessage,
    self_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    match message {
        ClientMessage::Join {
            group,
            participant,
            password,
        } => handle_join(state, ctx, group, participant, password, self_tx).await,
        ClientMessage::SendToPeer { participant, message } => {
            relay_to_peer(state, ctx, &participant, self_tx, message.into()).await
        }
        ClientMessage::SendToPeerSecretHandshake { participant, message } => {
            relay_to_peer(state, ctx, &participant, self_tx, message.into()).await
        }
        ClientMessage::SecretsGenerated {} => handle_secrets_generated(state, ctx, self_tx).await,
        ClientMessage::AnonymousBroadcast { index, message } => {
            handle_anonymous_broadcast(state, ctx, index, message, self_tx).await
        }
    }
}

async fn handle_join(
    state: &SharedState,
    ctx: &mut SessionCtx,
    group: String,
    participant: String,
    password: String,
    self_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    if ctx.participant.is_some() {
        let _ = self_tx.send(ServerMessage::error("you have already joined a group"));
        return;
    }
    let Some(group_config) = state.config.group(&group) else {
        let _ = self_tx.send(ServerMessage::error("unknown group"));
        return;
    };
    if group_config.password != password {
        let _ = self_tx.send(ServerMessage::error("wrong password"));
        return;
    }
    if !group_config.contains(&participant) {
        let _ = self_tx.send(ServerMessage::error("unknown participant"));
        return;
    }
    let roster = group_config.roster.clone();
    let group_lock = state.groups.get(&group).expect("group state must exist");
    let mut gs = group_lock.write().await;
    if gs.bindings.contains_key(&participant) {
        let _ = self_tx.send(ServerMessage::error("that participant has already joined"));
        return;
    }

    let previously_active = gs.active_participants(&roster);
    gs.bindings.insert(participant.clone(), self_tx.clone());
    ctx.group = Some(group.clone());
    ctx.participant = Some(participant.clone());
    let now_active = gs.active_participants(&roster);

    for name in &previously_active {
        if let Some(tx) = gs.bindings.get(name) {
            let _ = tx.send(ServerMessage::ActiveParticipantUpdate {
                active_participants: now_active.clone(),
            });
        }
    }
    let _ = self_tx.send(ServerMessage::Success {
        active_participants: Some(now_active),
        all_participants: Some(roster.clone()),
    });

    if gs.is_fully_bound(&roster) && !gs.handshake_triggered {
        gs.handshake_triggered = true;
        info!(group = %group, "roster fully present, starting handshake phase");
        gs.broadcast(&ServerMessage::GenerateSecrets {});
    }
}

/// The two relay message kinds carry either a free-form JSON value or a
/// handshake envelope; this lets `relay` stay generic over both without
/// duplicating the lookup/forward bookkeeping.
enum RelayPayload {
    Json(serde_json::Value),
    Handshake(dcnet_common::types::HandshakeEnvelope),
}

impl From<serde_json::Value> for RelayPayload {
    fn from(v: serde_json::Value) -> Self {
        RelayPayload::Json(v)
    }
}

impl From<dcnet_common::types::HandshakeEnvelope> for RelayPayload {
    fn from(v: dcnet_common::types::HandshakeEnvelope) -> Self {
        RelayPayload::Handshake(v)
    }
}

async fn relay_to_peer(
    state: &SharedState,
    ctx: &SessionCtx,
    peer: &str,
    self_tx: &mpsc::UnboundedSender<ServerMessage>,
    payload: RelayPayload,
) {
    let Some(group) = &ctx.group else {
        let _ = self_tx.send(ServerMessage::error("you have not joined a group"));
        return;
    };
    let me = ctx.participant.clone().expect("joined session must have a participant");
    let group_lock = state.groups.get(group).expect("group state must exist");
    let gs = group_lock.read().await;
    let Some(peer_tx) = gs.bindings.get(peer) else {
        let _ = self_tx.send(ServerMessage::error("that participant has not yet joined"));
        return;
    };
    let message = match payload {
        RelayPayload::Json(value) => ServerMessage::ReceiveFromPeer { from: me, message: value },
        RelayPayload::Handshake(envelope) => ServerMessage::ReceiveFromPeerSecretHandshake {
            from: me,
            message: envelope,
        },
    };
    let _ = peer_tx.send(message);
    drop(gs);
    let _ = self_tx.send(ServerMessage::success());
}

async fn handle_secrets_generated(
    state: &SharedState,
    ctx: &SessionCtx,
    self_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    let (Some(group), Some(participant)) = (&ctx.group, &ctx.participant) else {
        let _ = self_tx.send(ServerMessage::error("you have not joined a group"));
        return;
    };
    let group_lock = state.groups.get(group).expect("group state must exist");
    let mut gs = group_lock.write().await;
    gs.handshake_ready.insert(participant.clone());
    debug!(group = %group, participant = %participant, "handshake ready");
    let _ = self_tx.send(ServerMessage::success());
}

async fn handle_anonymous_broadcast(
    state: &SharedState,
    ctx: &SessionCtx,
    index: u64,
    message: dcnet_common::WireUint,
    self_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    let (Some(group), Some(participant)) = (&ctx.group, &ctx.participant) else {
        let _ = self_tx.send(ServerMessage::error("you have not joined a group"));
        return;
    };
    let roster_len = state
        .config
        .group(group)
        .expect("joined group must be configured")
        .roster
        .len();
    let group_lock = state.groups.get(group).expect("group state must exist");
    let mut gs = group_lock.write().await;
    let Some(slot) = gs.slots.get_mut(index as usize) else {
        let _ = self_tx.send(ServerMessage::error("invalid index"));
        return;
    };
    if slot.contains_key(participant) {
        let _ = self_tx.send(ServerMessage::error(
            "cannot submit multiple messages for the same slot",
        ));
        return;
    }
    slot.insert(participant.clone(), message);
    if slot.len() == roster_len {
        let messages = slot.clone();
        gs.broadcast(&ServerMessage::AnonymousBroadcast { index, messages });
    }
    let _ = self_tx.send(ServerMessage::success());
}

async fn cleanup(state: &SharedState, ctx: &SessionCtx) {
    let (Some(group), Some(participant)) = (&ctx.group, &ctx.participant) else {
        return;
    };
    let Some(group_lock) = state.groups.get(group) else {
        return;
    };
    let roster = state
        .config
        .group(group)
        .map(|g| g.roster.clone())
        .unwrap_or_default();
    let mut gs = group_lock.write().await;
    gs.bindings.remove(participant);
    gs.handshake_ready.remove(participant);
    gs.handshake_triggered = false;
    let now_active = gs.active_participants(&roster);
    gs.broadcast(&ServerMessage::ActiveParticipantUpdate {
        active_participants: now_active,
    });
    info!(group = %group, participant = %participant, "participant disconnected");
}
