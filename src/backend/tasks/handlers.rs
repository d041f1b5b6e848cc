//! Task CRUD handlers.
//!
//! All mutations go through the shared mutation broadcaster/reconciler, so
//! REST-initiated changes produce the same room traffic as socket ones.
//! `PUT /api/tasks/{id}/move` is the REST entry point into the drag-and-drop
//! reconciler.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::error::ApiError;
use crate::backend::middleware::auth::AuthUser;
use crate::backend::realtime::{MoveReconciler, MutationBroadcaster};
use crate::backend::response::ApiResponse;
use crate::backend::store::{Store, TaskFilter};
use crate::shared::models::task::{
    CreateSubtaskRequest, CreateTaskRequest, MoveTaskRequest, Task, TaskUpdate,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub project_id: Option<Uuid>,
    pub board_id: Option<Uuid>,
    pub column_id: Option<Uuid>,
    pub collection_id: Option<Uuid>,
    #[serde(default)]
    pub include_subtasks: bool,
}

/// Body of `PUT /api/tasks/{id}/move`; the task id comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskBody {
    pub from_column_id: Uuid,
    pub to_column_id: Uuid,
    pub position: Option<usize>,
    pub board_id: Uuid,
}

/// GET /api/tasks - filtered task listing, ordered by `order` with creation
/// time as tie-break.
pub async fn get_tasks(
    State(store): State<Arc<dyn Store>>,
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    // Every filter scope resolves to a project for the access check.
    let project_id = if let Some(project_id) = query.project_id {
        Some(project_id)
    } else if let Some(board_id) = query.board_id {
        Some(
            store
                .board_by_id(board_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Board"))?
                .project_id,
        )
    } else if let Some(collection_id) = query.collection_id {
        Some(
            store
                .collection_by_id(collection_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Collection"))?
                .project_id,
        )
    } else {
        None
    };

    let filter = TaskFilter {
        project_id: query.project_id,
        board_id: query.board_id,
        column_id: query.column_id,
        collection_id: query.collection_id,
        parent_task_id: None,
        include_subtasks: query.include_subtasks,
    };

    match project_id {
        Some(project_id) => {
            broadcaster
                .accessible_project(project_id, user.user_id, "project")
                .await?;
            let tasks = store.tasks(filter).await?;
            Ok(Json(ApiResponse::data(tasks)))
        }
        None => {
            // Unscoped listing: everything in the requester's projects.
            let mut tasks = Vec::new();
            for project in store.projects_for_user(user.user_id).await? {
                let mut scoped = filter.clone();
                scoped.project_id = Some(project.id);
                tasks.extend(store.tasks(scoped).await?);
            }
            Ok(Json(ApiResponse::data(tasks)))
        }
    }
}

/// POST /api/tasks
pub async fn create_task(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::Validation("Task title is required".to_string()));
    }
    let task = broadcaster
        .create_task(&user.as_socket_user(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::data(task))))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = broadcaster.accessible_task(id, user.user_id).await?;
    Ok(Json(ApiResponse::data(task)))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskUpdate>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = broadcaster
        .update_task(&user.as_socket_user(), id, patch)
        .await?;
    Ok(Json(ApiResponse::data(task)))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    broadcaster
        .delete_task(&user.as_socket_user(), id)
        .await?;
    Ok(Json(ApiResponse::message("Task deleted successfully")))
}

/// PUT /api/tasks/{id}/move - REST entry into the drag-and-drop reconciler.
pub async fn move_task(
    State(reconciler): State<Arc<MoveReconciler>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MoveTaskBody>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = reconciler
        .move_task(
            None,
            &user.as_socket_user(),
            MoveTaskRequest {
                task_id: id,
                from_column_id: body.from_column_id,
                to_column_id: body.to_column_id,
                position: body.position,
                board_id: body.board_id,
            },
        )
        .await?;
    Ok(Json(ApiResponse::data(task)))
}

/// POST /api/tasks/{id}/subtasks
pub async fn create_subtask(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateSubtaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let subtask = broadcaster
        .create_subtask(&user.as_socket_user(), id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::data(subtask))))
}

/// GET /api/tasks/{id}/subtasks
pub async fn get_subtasks(
    State(store): State<Arc<dyn Store>>,
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    broadcaster.accessible_task(id, user.user_id).await?;
    let subtasks = store
        .tasks(TaskFilter {
            parent_task_id: Some(id),
            include_subtasks: true,
            ..TaskFilter::default()
        })
        .await?;
    Ok(Json(ApiResponse::data(subtasks)))
}
