//! WebSocket gateway.
//!
//! Clients connect to `GET /ws?token=<jwt>`. Authentication happens before
//! the upgrade completes; a connection that fails it never enters the room
//! registry. After the upgrade, one writer task drains the connection's
//! outbound queue (preserving emission order) while the read loop parses
//! `{"type", "data"}` frames and dispatches them.
//!
//! Errors are answered with an `error {message}` event to the offending
//! connection only. A failed `task:move` is the exception: the room-wide
//! `task:move_failed` correction already reaches the initiator, so no extra
//! error frame is sent.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::access::has_access;
use crate::backend::auth::sessions::verify_token;
use crate::backend::auth::users::get_user_by_id;
use crate::backend::error::ApiError;
use crate::backend::realtime::registry::RoomMember;
use crate::backend::server::state::AppState;
use crate::shared::event::{ClientMessage, ServerEvent, SocketUser};

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    token: Option<String>,
}

/// Authenticate the bearer token and upgrade the connection.
pub async fn handle_socket_upgrade(
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.token else {
        return ApiError::AuthenticationRequired.into_response();
    };
    let claims = match verify_token(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("socket rejected: invalid token: {:?}", e);
            return ApiError::AuthenticationRequired.into_response();
        }
    };
    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return ApiError::AuthenticationRequired.into_response(),
    };

    // When a database is configured the user must still exist.
    if let Some(pool) = &state.db_pool {
        match get_user_by_id(pool, user_id).await {
            Ok(Some(_)) => {}
            _ => return ApiError::AuthenticationRequired.into_response(),
        }
    }

    let user = SocketUser {
        user_id,
        username: claims.username,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, user, state))
}

async fn handle_socket(socket: WebSocket, user: SocketUser, state: AppState) {
    let conn_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<String>>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                break;
            }
        }
    });

    tracing::info!(%conn_id, user = %user.username, "socket connected");

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch(&state, &tx, conn_id, &user, text.as_str()).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Implicit leave from whichever room the connection occupied; server-side
    // persistence of any in-flight mutation is not cancelled.
    let _ = state.rooms.disconnect(conn_id).await;
    writer.abort();
    tracing::info!(%conn_id, user = %user.username, "socket disconnected");
}

fn send_self(tx: &mpsc::UnboundedSender<Arc<String>>, event: &ServerEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        let _ = tx.send(Arc::new(json));
    }
}

async fn dispatch(
    state: &AppState,
    tx: &mpsc::UnboundedSender<Arc<String>>,
    conn_id: Uuid,
    user: &SocketUser,
    frame: &str,
) {
    let message: ClientMessage = match serde_json::from_str(frame) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "unparseable frame");
            send_self(tx, &ServerEvent::error("Invalid message format"));
            return;
        }
    };

    match message {
        ClientMessage::JoinBoard { board_id } => {
            match check_room_access(state, board_id, user.user_id).await {
                Ok(()) => {
                    let member = RoomMember::new(conn_id, user.clone(), tx.clone());
                    let _ = state.rooms.join(board_id, member).await;
                }
                Err(e) => send_self(tx, &ServerEvent::error(e.to_string())),
            }
        }
        ClientMessage::LeaveBoard { board_id } => {
            state.rooms.leave(board_id, conn_id).await;
        }
        ClientMessage::TaskCreate(req) => {
            if let Err(e) = state.broadcaster.create_task(user, req).await {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::TaskUpdate { task_id, updates } => {
            if let Err(e) = state.broadcaster.update_task(user, task_id, updates).await {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::TaskDelete { task_id } => {
            if let Err(e) = state.broadcaster.delete_task(user, task_id).await {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::TaskMove(req) => {
            // Errors surface to the whole room as task:move_failed.
            let _ = state.reconciler.move_task(Some(conn_id), user, req).await;
        }
        ClientMessage::SubtaskCreate {
            parent_task_id,
            subtask,
        } => {
            if let Err(e) = state
                .broadcaster
                .create_subtask(user, parent_task_id, subtask)
                .await
            {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::CollectionCreate(req) => {
            if let Err(e) = state.broadcaster.create_collection(user, req).await {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::CollectionUpdate {
            collection_id,
            updates,
        } => {
            if let Err(e) = state
                .broadcaster
                .update_collection(user, collection_id, updates)
                .await
            {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::CollectionDelete {
            collection_id,
            move_tasks_to_collection,
        } => {
            if let Err(e) = state
                .broadcaster
                .delete_collection(user, collection_id, move_tasks_to_collection)
                .await
            {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::CollectionReorder {
            project_id,
            collection_ids,
        } => {
            if let Err(e) = state
                .broadcaster
                .reorder_collections(user, project_id, collection_ids)
                .await
            {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
        ClientMessage::StartTyping { task_id } => {
            if let Some(room) = state.rooms.room_of(conn_id).await {
                state
                    .rooms
                    .emit(
                        room,
                        &ServerEvent::UserTyping {
                            user_id: user.user_id,
                            username: user.username.clone(),
                            task_id,
                            timestamp: Utc::now(),
                        },
                        Some(conn_id),
                    )
                    .await;
            }
        }
        ClientMessage::StopTyping { task_id } => {
            if let Some(room) = state.rooms.room_of(conn_id).await {
                state
                    .rooms
                    .emit(
                        room,
                        &ServerEvent::UserStopTyping {
                            user_id: user.user_id,
                            username: user.username.clone(),
                            task_id,
                            timestamp: Utc::now(),
                        },
                        Some(conn_id),
                    )
                    .await;
            }
        }
        ClientMessage::CursorMove { x, y, board_id } => {
            // Cursor traffic is scoped to the room actually joined; a stray
            // boardId from a stale client is ignored.
            if state.rooms.room_of(conn_id).await == Some(board_id) {
                state
                    .rooms
                    .emit(
                        board_id,
                        &ServerEvent::UserCursorMoved {
                            user_id: user.user_id,
                            username: user.username.clone(),
                            x,
                            y,
                            timestamp: Utc::now(),
                        },
                        Some(conn_id),
                    )
                    .await;
            }
        }
        ClientMessage::UpdateColumns { board_id, columns } => {
            if let Err(e) = state
                .broadcaster
                .update_board_columns(user, board_id, columns)
                .await
            {
                send_self(tx, &ServerEvent::error(e.to_string()));
            }
        }
    }
}

/// Resolve a room id for `join:board`: a board id (access-checked through
/// its project) or, for collection traffic, a project id directly.
async fn check_room_access(
    state: &AppState,
    room_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    if let Some(board) = state.store.board_by_id(room_id).await? {
        let project = state
            .store
            .project_by_id(board.project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
        if !has_access(user_id, &project) {
            return Err(ApiError::access_denied("board"));
        }
        return Ok(());
    }
    if let Some(project) = state.store.project_by_id(room_id).await? {
        if !has_access(user_id, &project) {
            return Err(ApiError::access_denied("project"));
        }
        return Ok(());
    }
    Err(ApiError::not_found("Board"))
}
