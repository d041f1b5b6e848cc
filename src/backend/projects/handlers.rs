//! Project CRUD handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::backend::access::{has_access, is_owner};
use crate::backend::error::ApiError;
use crate::backend::middleware::auth::AuthUser;
use crate::backend::response::ApiResponse;
use crate::backend::store::Store;
use crate::shared::models::project::{CreateProjectRequest, Project, ProjectUpdate};

/// GET /api/projects - projects the requester created or belongs to.
pub async fn get_projects(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = store.projects_for_user(user.user_id).await?;
    Ok(Json(ApiResponse::data(projects)))
}

/// POST /api/projects
pub async fn create_project(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Project>>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation("Project name is required".to_string()));
    }
    let project = store
        .create_project(Project::new(
            request.name,
            request.description,
            request.color,
            user.user_id,
        ))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::data(project))))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Project>>, ApiError> {
    let project = store
        .project_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !has_access(user.user_id, &project) {
        return Err(ApiError::access_denied("project"));
    }
    Ok(Json(ApiResponse::data(project)))
}

/// PUT /api/projects/{id}
pub async fn update_project(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProjectUpdate>,
) -> Result<Json<ApiResponse<Project>>, ApiError> {
    let project = store
        .project_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !has_access(user.user_id, &project) {
        return Err(ApiError::access_denied("project"));
    }
    let updated = store
        .update_project(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    Ok(Json(ApiResponse::data(updated)))
}

/// DELETE /api/projects/{id} - project creator only.
pub async fn delete_project(
    State(store): State<Arc<dyn Store>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let project = store
        .project_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    if !is_owner(user.user_id, &project) {
        return Err(ApiError::AccessDenied(
            "Only project creator can delete this project".to_string(),
        ));
    }
    store.delete_project(id).await?;
    Ok(Json(ApiResponse::message("Project deleted successfully")))
}
