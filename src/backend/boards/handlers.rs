//! Board CRUD handlers.
//!
//! `PUT /api/boards/{id}/columns` routes through the mutation broadcaster so
//! drag-and-drop column edits made over REST reach socket clients too.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::access::{has_access, is_owner};
use crate::backend::error::ApiError;
use crate::backend::middleware::auth::AuthUser;
use crate::backend::realtime::MutationBroadcaster;
use crate::backend::response::ApiResponse;
use crate::backend::store::{BoardUpdate, Store};
use crate::shared::models::board::{validate_columns, Board, Column};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardRequest {
    pub name: String,
    pub project_id: Uuid,
    /// Defaults to To Do / In Progress / Done when omitted.
    pub columns: Option<Vec<Column>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardListQuery {
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateColumnsRequest {
    pub columns: Vec<Column>,
}

async fn accessible_board(
    store: &Arc<dyn Store>,
    board_id: Uuid,
    user_id: Uuid,
) -> Result<Board, ApiError> {
    let board = store
        .board_by_id(board_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Board"))?;
    let project = store
        .project_by_id(board.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !has_access(user_id, &project) {
        return Err(ApiError::access_denied("board"));
    }
    Ok(board)
}

/// GET /api/boards?projectId= - boards of one project, or of every project
/// the requester can access.
pub async fn get_boards(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Query(query): Query<BoardListQuery>,
) -> Result<Json<ApiResponse<Vec<Board>>>, ApiError> {
    if let Some(project_id) = query.project_id {
        let project = store
            .project_by_id(project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
        if !has_access(user.user_id, &project) {
            return Err(ApiError::access_denied("project"));
        }
        let boards = store.boards_for_project(project_id).await?;
        return Ok(Json(ApiResponse::data(boards)));
    }

    let mut boards = Vec::new();
    for project in store.projects_for_user(user.user_id).await? {
        boards.extend(store.boards_for_project(project.id).await?);
    }
    Ok(Json(ApiResponse::data(boards)))
}

/// POST /api/boards
pub async fn create_board(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Board>>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "Board name and project ID are required".to_string(),
        ));
    }
    if let Some(columns) = &request.columns {
        if validate_columns(columns).is_err() {
            return Err(ApiError::Validation(
                "A task may appear in at most one column".to_string(),
            ));
        }
    }
    let project = store
        .project_by_id(request.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !has_access(user.user_id, &project) {
        return Err(ApiError::access_denied("project"));
    }

    let board = store
        .create_board(Board::new(request.name, request.project_id, request.columns))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::data(board))))
}

/// GET /api/boards/{id}
pub async fn get_board(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Board>>, ApiError> {
    let board = accessible_board(&store, id, user.user_id).await?;
    Ok(Json(ApiResponse::data(board)))
}

/// PUT /api/boards/{id}
pub async fn update_board(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<BoardUpdate>,
) -> Result<Json<ApiResponse<Board>>, ApiError> {
    accessible_board(&store, id, user.user_id).await?;
    if let Some(columns) = &patch.columns {
        if let Err(task_id) = validate_columns(columns) {
            return Err(ApiError::Validation(format!(
                "Task {} appears in more than one column",
                task_id
            )));
        }
    }
    let updated = store
        .update_board(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Board"))?;
    Ok(Json(ApiResponse::data(updated)))
}

/// PUT /api/boards/{id}/columns - replace the column set and notify the
/// board room.
pub async fn update_board_columns(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateColumnsRequest>,
) -> Result<Json<ApiResponse<Board>>, ApiError> {
    let board = broadcaster
        .update_board_columns(&user.as_socket_user(), id, request.columns)
        .await?;
    Ok(Json(ApiResponse::data(board)))
}

/// DELETE /api/boards/{id} - project creator only.
pub async fn delete_board(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let board = store
        .board_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Board"))?;
    let project = store
        .project_by_id(board.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !is_owner(user.user_id, &project) {
        return Err(ApiError::AccessDenied(
            "Only project creator can delete boards".to_string(),
        ));
    }
    store.delete_board(id).await?;
    Ok(Json(ApiResponse::message("Board deleted successfully")))
}
