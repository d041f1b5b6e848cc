//! Collection CRUD handlers.
//!
//! Mutations route through the mutation broadcaster so socket clients in the
//! project's room observe REST-initiated collection changes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::access::has_access;
use crate::backend::error::ApiError;
use crate::backend::middleware::auth::AuthUser;
use crate::backend::realtime::MutationBroadcaster;
use crate::backend::response::ApiResponse;
use crate::backend::store::{Store, TaskFilter};
use crate::shared::models::collection::{Collection, CollectionUpdate, CreateCollectionRequest};
use crate::shared::models::task::Task;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionListQuery {
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGetQuery {
    #[serde(default = "default_true")]
    pub include_tasks: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDeleteQuery {
    pub move_tasks_to_collection: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderCollectionsRequest {
    pub project_id: Uuid,
    pub collection_ids: Vec<Uuid>,
}

/// A collection with its tasks inlined, for `GET /api/collections/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionWithTasks {
    #[serde(flatten)]
    pub collection: Collection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_count: Option<usize>,
}

/// GET /api/collections?projectId=&includeArchived=
pub async fn get_collections(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Query(query): Query<CollectionListQuery>,
) -> Result<Json<ApiResponse<Vec<Collection>>>, ApiError> {
    if let Some(project_id) = query.project_id {
        let project = store
            .project_by_id(project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
        if !has_access(user.user_id, &project) {
            return Err(ApiError::access_denied("project"));
        }
        let collections = store
            .collections_for_project(project_id, query.include_archived)
            .await?;
        return Ok(Json(ApiResponse::data(collections)));
    }

    let mut collections = Vec::new();
    for project in store.projects_for_user(user.user_id).await? {
        collections.extend(
            store
                .collections_for_project(project.id, query.include_archived)
                .await?,
        );
    }
    Ok(Json(ApiResponse::data(collections)))
}

/// POST /api/collections
pub async fn create_collection(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Collection>>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "Name and project ID are required".to_string(),
        ));
    }
    let collection = broadcaster
        .create_collection(&user.as_socket_user(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::data(collection))))
}

/// GET /api/collections/{id}?includeTasks=
pub async fn get_collection(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<CollectionGetQuery>,
) -> Result<Json<ApiResponse<CollectionWithTasks>>, ApiError> {
    let collection = store
        .collection_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Collection"))?;
    let project = store
        .project_by_id(collection.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !has_access(user.user_id, &project) {
        return Err(ApiError::access_denied("collection"));
    }

    let tasks = if query.include_tasks {
        Some(store.tasks(TaskFilter::collection(id)).await?)
    } else {
        None
    };
    let task_count = tasks.as_ref().map(|t| t.len());

    Ok(Json(ApiResponse::data(CollectionWithTasks {
        collection,
        tasks,
        task_count,
    })))
}

/// PUT /api/collections/{id}
pub async fn update_collection(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<CollectionUpdate>,
) -> Result<Json<ApiResponse<Collection>>, ApiError> {
    let collection = broadcaster
        .update_collection(&user.as_socket_user(), id, patch)
        .await?;
    Ok(Json(ApiResponse::data(collection)))
}

/// DELETE /api/collections/{id}?moveTasksToCollection=
pub async fn delete_collection(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<CollectionDeleteQuery>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    broadcaster
        .delete_collection(
            &user.as_socket_user(),
            id,
            query.move_tasks_to_collection,
        )
        .await?;
    Ok(Json(ApiResponse::message("Collection deleted successfully")))
}

/// PUT /api/collections/reorder
pub async fn reorder_collections(
    State(broadcaster): State<Arc<MutationBroadcaster>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ReorderCollectionsRequest>,
) -> Result<Json<ApiResponse<Vec<Collection>>>, ApiError> {
    if request.collection_ids.is_empty() {
        return Err(ApiError::Validation(
            "Project ID and collection IDs array are required".to_string(),
        ));
    }
    let collections = broadcaster
        .reorder_collections(
            &user.as_socket_user(),
            request.project_id,
            request.collection_ids,
        )
        .await?;
    Ok(Json(ApiResponse::data(collections)))
}
