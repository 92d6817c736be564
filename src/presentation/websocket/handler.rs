//! WebSocket Connection Handler
//!
//! Lifecycle of one socket: Hello, Identify (within the identify timeout),
//! Ready, then heartbeats and room frames until the client leaves or misses
//! its heartbeat deadline.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{stream::SplitStream, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use super::hub::{Connection, Hub};
use super::messages::{
    dispatch_frame, GatewayReceive, GatewaySend, IdentifyPayload, OpCode, ReadyPayload,
    RoomPayload, SendMessagePayload, MAX_MESSAGE_CHARS,
};
use super::session::SessionState;
use crate::application::services::auth_service::decode_access_token;
use crate::application::services::Broadcaster;
use crate::domain::{
    FriendshipRepository, HubEvent, HubGroup, PresenceEvent, RoomMembershipEvent,
    RoomMessageEvent, RoomName, RoomNameError, User, UserRepository, UserSummary,
};
use crate::infrastructure::cache::PresenceStore;
use crate::infrastructure::repositories::{PgFriendshipRepository, PgUserRepository};
use crate::shared::snowflake::SnowflakeGenerator;
use crate::startup::AppState;

/// Extra time allowed past the heartbeat interval before a connection is dropped.
const HEARTBEAT_GRACE: Duration = Duration::from_secs(10);

/// Why a client frame was refused. The connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Opcode {0} is not accepted here")]
    UnexpectedOp(u8),

    #[error(transparent)]
    InvalidRoom(#[from] RoomNameError),

    #[error("Not a member of room {0}")]
    NotInRoom(String),

    #[error("Message must be 1-{} characters", MAX_MESSAGE_CHARS)]
    InvalidContent,
}

/// What an identified connection acts with.
pub struct ClientContext<'a> {
    pub hub: &'a Hub,
    pub presence: &'a dyn PresenceStore,
    pub ids: &'a SnowflakeGenerator,
    pub connection: &'a Connection,
    pub user_id: i64,
    pub user: UserSummary,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_message_size = state.settings.hub.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection = state.hub.register(tx);
    let mut session = SessionState::new(connection.id.to_string());

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    connection.send_control(&GatewaySend::hello(state.hub.heartbeat_interval()));

    let Some(user) = identify(&state, &mut stream, &connection).await else {
        connection.send_control(&GatewaySend::invalid_session());
        state.hub.unregister(connection.id);
        drop(connection);
        // Let the writer flush InvalidSession, then give up on it.
        let _ = timeout(Duration::from_secs(1), writer).await;
        return;
    };

    session.user_id = Some(user.id);
    session.heartbeat();
    state.hub.identify(connection.id, user.id);

    let summary = UserSummary::from(&user);
    let ready = ReadyPayload {
        user: summary.clone(),
        session_id: session.session_id.clone(),
    };
    match serde_json::to_string(&ready) {
        Ok(payload) => {
            connection.send_text(dispatch_frame("Ready", connection.next_sequence(), &payload));
        }
        Err(e) => tracing::error!(error = %e, "Failed to encode Ready"),
    }

    let friendships = PgFriendshipRepository::new(state.db.clone());
    announce_presence(&state.hub, state.presence.as_ref(), &friendships, user.id, true).await;

    tracing::info!(user_id = user.id, session_id = %session.session_id, "User connected");

    let ctx = ClientContext {
        hub: &state.hub,
        presence: state.presence.as_ref(),
        ids: &state.snowflake,
        connection: &connection,
        user_id: user.id,
        user: summary,
    };

    let heartbeat_timeout = Duration::from_millis(state.hub.heartbeat_interval()) + HEARTBEAT_GRACE;
    let mut heartbeat_check = interval(heartbeat_timeout);
    heartbeat_check.tick().await;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let result = match serde_json::from_str::<GatewayReceive>(text.as_str()) {
                            Ok(frame) => handle_frame(&ctx, &mut session, frame).await,
                            Err(e) => Err(ProtocolError::Malformed(e.to_string())),
                        };
                        if let Err(e) = result {
                            tracing::debug!(session_id = %session.session_id, error = %e, "Frame refused");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session.session_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = heartbeat_check.tick() => {
                if !session.is_alive(heartbeat_timeout) {
                    tracing::info!(session_id = %session.session_id, "Heartbeat timeout, closing connection");
                    break;
                }
            }
        }
    }

    state.hub.unregister(connection.id);
    announce_presence(&state.hub, state.presence.as_ref(), &friendships, user.id, false).await;
    writer.abort();

    tracing::info!(user_id = user.id, session_id = %session.session_id, "User disconnected");
}

/// Wait for a valid Identify and load the user behind its token.
async fn identify(
    state: &AppState,
    stream: &mut SplitStream<WebSocket>,
    connection: &Connection,
) -> Option<User> {
    let deadline = Duration::from_secs(state.settings.hub.identify_timeout_secs);
    let token = match timeout(deadline, wait_for_identify(stream, connection)).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            tracing::debug!(connection_id = %connection.id, "Connection closed before Identify");
            return None;
        }
        Err(_) => {
            tracing::debug!(connection_id = %connection.id, "Identify timeout");
            return None;
        }
    };

    let user_id = match decode_access_token(&token, &state.settings.jwt.secret).and_then(|c| c.user_id()) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(connection_id = %connection.id, error = %e, "Identify rejected");
            return None;
        }
    };

    match PgUserRepository::new(state.db.clone()).find_by_id(user_id).await {
        Ok(Some(user)) => Some(user),
        Ok(None) => {
            tracing::debug!(connection_id = %connection.id, user_id, "Identify for unknown user");
            None
        }
        Err(e) => {
            tracing::error!(connection_id = %connection.id, error = %e, "Failed to load identifying user");
            None
        }
    }
}

async fn wait_for_identify(stream: &mut SplitStream<WebSocket>, connection: &Connection) -> Option<String> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(frame) = serde_json::from_str::<GatewayReceive>(text.as_str()) else {
                    continue;
                };
                match OpCode::from_u8(frame.op) {
                    Some(OpCode::Identify) => {
                        if let Ok(identify) = payload::<IdentifyPayload>(&frame) {
                            return Some(identify.token);
                        }
                    }
                    Some(OpCode::Heartbeat) => {
                        connection.send_control(&GatewaySend::heartbeat_ack());
                    }
                    _ => {}
                }
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => {}
        }
    }
    None
}

fn payload<T: DeserializeOwned>(frame: &GatewayReceive) -> Result<T, ProtocolError> {
    let d = frame
        .d
        .clone()
        .ok_or_else(|| ProtocolError::Malformed("missing d".into()))?;
    serde_json::from_value(d).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Handle one frame from an identified connection.
pub async fn handle_frame(
    ctx: &ClientContext<'_>,
    session: &mut SessionState,
    frame: GatewayReceive,
) -> Result<(), ProtocolError> {
    match OpCode::from_u8(frame.op) {
        Some(OpCode::Heartbeat) => {
            session.heartbeat();
            ctx.connection.send_control(&GatewaySend::heartbeat_ack());
            if let Err(e) = ctx.presence.refresh(ctx.user_id).await {
                tracing::warn!(user_id = ctx.user_id, error = %e, "Presence refresh failed");
            }
            Ok(())
        }

        Some(OpCode::JoinRoom) => {
            let room = RoomName::parse(payload::<RoomPayload>(&frame)?.room)?;
            let group = HubGroup::room(room.clone());
            if ctx.hub.join(ctx.connection.id, &group) {
                ctx.hub.broadcast(
                    &group,
                    &HubEvent::UserJoinedRoom(RoomMembershipEvent {
                        room: room.to_string(),
                        user: ctx.user.clone(),
                    }),
                );
            }
            Ok(())
        }

        Some(OpCode::LeaveRoom) => {
            let room = RoomName::parse(payload::<RoomPayload>(&frame)?.room)?;
            let group = HubGroup::room(room.clone());
            if ctx.hub.leave(ctx.connection.id, &group) {
                ctx.hub.broadcast(
                    &group,
                    &HubEvent::UserLeftRoom(RoomMembershipEvent {
                        room: room.to_string(),
                        user: ctx.user.clone(),
                    }),
                );
            }
            Ok(())
        }

        Some(OpCode::SendMessage) => {
            let message = payload::<SendMessagePayload>(&frame)?;
            let room = RoomName::parse(message.room)?;
            let group = HubGroup::room(room.clone());
            if !ctx.hub.is_member(ctx.connection.id, &group) {
                return Err(ProtocolError::NotInRoom(room.to_string()));
            }

            let length = message.content.chars().count();
            if message.content.trim().is_empty() || length > MAX_MESSAGE_CHARS {
                return Err(ProtocolError::InvalidContent);
            }

            ctx.hub.broadcast(
                &group,
                &HubEvent::ReceiveMessage(RoomMessageEvent {
                    id: ctx.ids.generate().to_string(),
                    room: room.to_string(),
                    author: ctx.user.clone(),
                    content: message.content,
                    timestamp: Utc::now().to_rfc3339(),
                }),
            );
            Ok(())
        }

        _ => Err(ProtocolError::UnexpectedOp(frame.op)),
    }
}

/// Mark a user online or offline and tell their friends when that flips.
pub async fn announce_presence<F: FriendshipRepository>(
    hub: &Hub,
    presence: &dyn PresenceStore,
    friendships: &F,
    user_id: i64,
    online: bool,
) {
    let flipped = if online {
        presence.connect(user_id).await
    } else {
        presence.disconnect(user_id).await
    };
    match flipped {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            tracing::warn!(user_id, online, error = %e, "Presence update failed");
            return;
        }
    }

    let friend_ids = match friendships.friend_ids(user_id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Failed to load friends for presence fan-out");
            return;
        }
    };

    let payload = PresenceEvent {
        user_id: user_id.to_string(),
    };
    let event = if online {
        HubEvent::FriendOnline(payload)
    } else {
        HubEvent::FriendOffline(payload)
    };
    for friend_id in friend_ids {
        hub.broadcast(&HubGroup::user(friend_id), &event);
    }
}
