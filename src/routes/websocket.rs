use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, Result},
    models::user::AuthUser,
    services::realtime::ConnectionHandle,
    state::AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/connect", get(websocket_handler))
}

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    token: Option<String>,
}

/// WebSocket连接处理器
///
/// The credential travels in the handshake query string, outside normal
/// message framing. Authentication happens before the upgrade: a missing or
/// invalid token, or an inactive account, refuses the connection and no
/// event is ever delivered to it.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<Response> {
    let user = authenticate_handshake(&state, query).await?;
    let connection_id = format!("conn_{}", uuid::Uuid::new_v4());

    info!(
        "WebSocket upgrade request from user: {} with connection: {}",
        user.id, connection_id
    );

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, user, connection_id)))
}

/// Refusal path of the handshake: no token, an invalid token, or an inactive
/// account never reaches the upgrade.
async fn authenticate_handshake(state: &AppState, query: ConnectQuery) -> Result<AuthUser> {
    let token = query
        .token
        .ok_or_else(|| AppError::unauthorized("Authentication error: No token provided"))?;

    state.auth_service.authenticate(&token).await
}

/// 处理已认证的WebSocket连接
async fn handle_connection(
    socket: WebSocket,
    state: Arc<AppState>,
    user: AuthUser,
    connection_id: String,
) {
    info!(
        "User connected: {} ({}) on connection: {}",
        user.username, user.id, connection_id
    );

    // Admission: the "all" broadcast group plus the private user:{id} group,
    // both tracked by the registry.
    let (tx, mut rx) = mpsc::channel::<Message>(state.config.ws_send_buffer);
    state.registry.add(ConnectionHandle::new(
        connection_id.clone(),
        user.id.clone(),
        user.username.clone(),
        tx,
    ));

    let (mut sink, mut stream) = socket.split();

    // Drain the registry channel into the peer.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    // Read side: clients send no domain messages; we only watch for close
    // and keep the protocol-level ping/pong flowing.
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(other) => {
                    debug!("Ignoring inbound frame: {:?}", other);
                }
                Err(e) => {
                    warn!("WebSocket read error: {}", e);
                    break;
                }
            }
        }
    });

    // Either side finishing tears the connection down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.remove(&connection_id);
    info!(
        "User disconnected: {} on connection: {}",
        user.username, connection_id
    );
}
