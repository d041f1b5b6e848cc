//! Persistence Gateway
//!
//! The [`Store`] trait is the seam between the application and durable
//! storage: create/find/update/delete per entity, filtered queries sorted by
//! numeric order with creation time as the stable tie-break. `PgStore` is the
//! production implementation; `MemoryStore` backs tests and servers started
//! without a `DATABASE_URL`.
//!
//! The gateway promises per-document atomicity only. Multi-document
//! sequences (moving a task id between column lists and updating the task
//! row) are the caller's compensation problem.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::shared::models::board::{Board, Column};
use crate::shared::models::collection::{Collection, CollectionUpdate};
use crate::shared::models::project::{Project, ProjectUpdate};
use crate::shared::models::task::{Task, TaskUpdate};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by the persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Filter for task queries. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub board_id: Option<Uuid>,
    pub column_id: Option<Uuid>,
    pub collection_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    /// When false, subtasks are excluded from the results.
    pub include_subtasks: bool,
}

impl TaskFilter {
    pub fn board(board_id: Uuid) -> Self {
        Self {
            board_id: Some(board_id),
            ..Self::default()
        }
    }

    pub fn collection(collection_id: Uuid) -> Self {
        Self {
            collection_id: Some(collection_id),
            ..Self::default()
        }
    }
}

/// Fields of a board that can change after creation.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdate {
    pub name: Option<String>,
    pub columns: Option<Vec<Column>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Projects
    async fn create_project(&self, project: Project) -> Result<Project, StoreError>;
    async fn project_by_id(&self, id: Uuid) -> Result<Option<Project>, StoreError>;
    async fn projects_for_user(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError>;
    async fn update_project(
        &self,
        id: Uuid,
        patch: ProjectUpdate,
    ) -> Result<Option<Project>, StoreError>;
    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError>;

    // Boards
    async fn create_board(&self, board: Board) -> Result<Board, StoreError>;
    async fn board_by_id(&self, id: Uuid) -> Result<Option<Board>, StoreError>;
    async fn boards_for_project(&self, project_id: Uuid) -> Result<Vec<Board>, StoreError>;
    async fn update_board(&self, id: Uuid, patch: BoardUpdate) -> Result<Option<Board>, StoreError>;
    /// Replace the board's column document in one atomic write.
    async fn set_board_columns(
        &self,
        board_id: Uuid,
        columns: Vec<Column>,
    ) -> Result<Option<Board>, StoreError>;
    async fn delete_board(&self, id: Uuid) -> Result<bool, StoreError>;

    // Tasks
    async fn create_task(&self, task: Task) -> Result<Task, StoreError>;
    async fn task_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError>;
    async fn tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError>;
    async fn update_task(&self, id: Uuid, patch: TaskUpdate) -> Result<Option<Task>, StoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    // Collections
    async fn create_collection(&self, collection: Collection) -> Result<Collection, StoreError>;
    async fn collection_by_id(&self, id: Uuid) -> Result<Option<Collection>, StoreError>;
    async fn collections_for_project(
        &self,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Collection>, StoreError>;
    async fn update_collection(
        &self,
        id: Uuid,
        patch: CollectionUpdate,
    ) -> Result<Option<Collection>, StoreError>;
    async fn delete_collection(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn set_collection_order(&self, id: Uuid, order: i32) -> Result<(), StoreError>;
    /// Repoint every task of `from` at `to`, or detach the reference when
    /// `to` is `None`. Returns the number of tasks touched.
    async fn reassign_collection_tasks(
        &self,
        from: Uuid,
        to: Option<Uuid>,
    ) -> Result<u64, StoreError>;
}

/// Apply a task patch in memory. Both store implementations funnel updates
/// through this so patch semantics cannot drift between them.
pub fn apply_task_update(task: &mut Task, patch: &TaskUpdate) {
    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(description) = &patch.description {
        task.description = Some(description.clone());
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(assignee) = patch.assignee {
        task.assignee = Some(assignee);
    }
    if let Some(column_id) = patch.column_id {
        task.column_id = Some(column_id);
    }
    if let Some(collection_id) = patch.collection_id {
        task.collection_id = Some(collection_id);
    }
    if let Some(labels) = &patch.labels {
        task.labels = labels.clone();
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = Some(due_date);
    }
    if let Some(subtasks) = &patch.subtasks {
        task.subtasks = subtasks.clone();
    }
    if let Some(time_tracked) = patch.time_tracked {
        task.time_tracked = time_tracked;
    }
    if let Some(dependencies) = &patch.dependencies {
        task.dependencies = dependencies.clone();
    }
    if let Some(order) = patch.order {
        task.order = order;
    }
    task.updated_at = chrono::Utc::now();
}

/// Apply a collection patch in memory.
pub fn apply_collection_update(collection: &mut Collection, patch: &CollectionUpdate) {
    if let Some(name) = &patch.name {
        collection.name = name.clone();
    }
    if let Some(description) = &patch.description {
        collection.description = Some(description.clone());
    }
    if let Some(color) = &patch.color {
        collection.color = color.clone();
    }
    if let Some(is_archived) = patch.is_archived {
        collection.is_archived = is_archived;
    }
    if let Some(order) = patch.order {
        collection.order = order;
    }
    collection.updated_at = chrono::Utc::now();
}

/// Apply a project patch in memory.
pub fn apply_project_update(project: &mut Project, patch: &ProjectUpdate) {
    if let Some(name) = &patch.name {
        project.name = name.clone();
    }
    if let Some(description) = &patch.description {
        project.description = Some(description.clone());
    }
    if let Some(color) = &patch.color {
        project.color = color.clone();
    }
    if let Some(members) = &patch.members {
        project.members = members.clone();
    }
    project.updated_at = chrono::Utc::now();
}
