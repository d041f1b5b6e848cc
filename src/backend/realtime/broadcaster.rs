//! Mutation Broadcaster
//!
//! Applies task/subtask/collection/column mutations and notifies the
//! affected room. The sequence is always access check → persist →
//! broadcast, so the room either sees the effect of a persisted write or
//! sees nothing. Access is re-checked on every call; membership can change
//! between requests.
//!
//! Task events go to the board's room, collection events to the project's
//! room. Both the socket dispatcher and the REST handlers call through the
//! same instance, so all clients converge regardless of the entry point.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::backend::access::has_access;
use crate::backend::error::ApiError;
use crate::backend::realtime::locks::BoardLocks;
use crate::backend::realtime::registry::RoomRegistry;
use crate::backend::store::Store;
use crate::shared::event::{DeletedCollection, DeletedTask, ServerEvent, SocketUser};
use crate::shared::models::board::{self, Board, Column};
use crate::shared::models::collection::{Collection, CollectionUpdate, CreateCollectionRequest};
use crate::shared::models::project::Project;
use crate::shared::models::task::{
    CreateSubtaskRequest, CreateTaskRequest, Task, TaskUpdate,
};

pub struct MutationBroadcaster {
    store: Arc<dyn Store>,
    rooms: Arc<RoomRegistry>,
    locks: Arc<BoardLocks>,
}

impl MutationBroadcaster {
    pub fn new(store: Arc<dyn Store>, rooms: Arc<RoomRegistry>, locks: Arc<BoardLocks>) -> Self {
        Self {
            store,
            rooms,
            locks,
        }
    }

    /// Look up a project and check membership, failing closed.
    pub async fn accessible_project(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        what: &str,
    ) -> Result<Project, ApiError> {
        let project = self
            .store
            .project_by_id(project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
        if !has_access(user_id, &project) {
            return Err(ApiError::access_denied(what));
        }
        Ok(project)
    }

    /// Look up a task and check access via its owning project.
    pub async fn accessible_task(&self, task_id: Uuid, user_id: Uuid) -> Result<Task, ApiError> {
        let task = self
            .store
            .task_by_id(task_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))?;
        self.accessible_project(task.project_id, user_id, "task")
            .await?;
        Ok(task)
    }

    /// Create a task and announce it to the board's room.
    ///
    /// When a target column is given, the new task id is appended to that
    /// column's list as a second persistence step; if that step fails the
    /// just-created task is deleted again so no half-created task becomes
    /// visible.
    pub async fn create_task(
        &self,
        by: &SocketUser,
        req: CreateTaskRequest,
    ) -> Result<Task, ApiError> {
        self.accessible_project(req.project_id, by.user_id, "project")
            .await?;
        let board = self
            .store
            .board_by_id(req.board_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Board"))?;
        if board.project_id != req.project_id {
            return Err(ApiError::Validation(
                "Board does not belong to this project".to_string(),
            ));
        }
        if let Some(column_id) = req.column_id {
            if board.column(column_id).is_none() {
                return Err(ApiError::not_found("Column"));
            }
        }

        let task = self.store.create_task(Task::from_request(req, by.user_id)).await?;

        if let Some(column_id) = task.column_id {
            let _guard = self.locks.acquire(task.board_id).await;
            if let Err(e) = self.append_to_column(task.board_id, column_id, task.id).await {
                // Roll the first write back rather than leave a task no
                // column references.
                if let Err(del) = self.store.delete_task(task.id).await {
                    tracing::error!(task_id = %task.id, error = %del, "failed to roll back task create");
                }
                return Err(e);
            }
        }

        self.rooms
            .emit(
                task.board_id,
                &ServerEvent::TaskCreated {
                    task: task.clone(),
                    created_by: by.clone(),
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(task)
    }

    /// Apply a task patch and announce it.
    ///
    /// A patch that retargets the column reference is a move: the task id
    /// changes column lists and the room hears `task:moved` instead of the
    /// generic `task:updated`.
    pub async fn update_task(
        &self,
        by: &SocketUser,
        task_id: Uuid,
        updates: TaskUpdate,
    ) -> Result<Task, ApiError> {
        let task = self.accessible_task(task_id, by.user_id).await?;

        let moved_to = match updates.column_id {
            Some(new_column) if task.column_id != Some(new_column) => Some(new_column),
            _ => None,
        };

        let Some(to_column) = moved_to else {
            let updated = self
                .store
                .update_task(task_id, updates.clone())
                .await?
                .ok_or_else(|| ApiError::not_found("Task"))?;
            self.rooms
                .emit(
                    updated.board_id,
                    &ServerEvent::TaskUpdated {
                        task: updated.clone(),
                        updated_by: by.clone(),
                        changes: updates,
                        timestamp: Utc::now(),
                    },
                    None,
                )
                .await;
            return Ok(updated);
        };

        let _guard = self.locks.acquire(task.board_id).await;
        let board = self
            .store
            .board_by_id(task.board_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Board"))?;
        let mut columns = board.columns;
        let from_column = board::remove_task(&mut columns, task.id);
        board::insert_task(&mut columns, to_column, task.id, None)
            .ok_or_else(|| ApiError::not_found("Column"))?;
        self.store.set_board_columns(board.id, columns).await?;
        let updated = self
            .store
            .update_task(task_id, updates)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))?;

        self.rooms
            .emit(
                updated.board_id,
                &ServerEvent::TaskMoved {
                    task: Some(updated.clone()),
                    task_id: updated.id,
                    from_column_id: from_column,
                    to_column_id: to_column,
                    position: None,
                    board_id: updated.board_id,
                    moved_by: by.clone(),
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(updated)
    }

    /// Delete a task, detaching it from its column list first.
    pub async fn delete_task(&self, by: &SocketUser, task_id: Uuid) -> Result<(), ApiError> {
        let task = self.accessible_task(task_id, by.user_id).await?;

        if task.column_id.is_some() {
            let _guard = self.locks.acquire(task.board_id).await;
            if let Some(board) = self.store.board_by_id(task.board_id).await? {
                let mut columns = board.columns;
                if board::remove_task(&mut columns, task.id).is_some() {
                    self.store.set_board_columns(board.id, columns).await?;
                }
            }
        }
        self.store.delete_task(task_id).await?;

        self.rooms
            .emit(
                task.board_id,
                &ServerEvent::TaskDeleted {
                    task_id,
                    task: DeletedTask {
                        title: task.title.clone(),
                    },
                    deleted_by: by.clone(),
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(())
    }

    /// Create a subtask under `parent_task_id` and announce it to the
    /// parent's board room. Subtasks never enter column lists.
    pub async fn create_subtask(
        &self,
        by: &SocketUser,
        parent_task_id: Uuid,
        req: CreateSubtaskRequest,
    ) -> Result<Task, ApiError> {
        let parent = self
            .store
            .task_by_id(parent_task_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Parent task"))?;
        self.accessible_project(parent.project_id, by.user_id, "task")
            .await?;

        let subtask = self
            .store
            .create_task(Task::subtask_of(&parent, req, by.user_id))
            .await?;

        self.rooms
            .emit(
                parent.board_id,
                &ServerEvent::SubtaskCreated {
                    task: subtask.clone(),
                    parent_task_id,
                    created_by: by.clone(),
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(subtask)
    }

    pub async fn create_collection(
        &self,
        by: &SocketUser,
        req: CreateCollectionRequest,
    ) -> Result<Collection, ApiError> {
        self.accessible_project(req.project_id, by.user_id, "project")
            .await?;
        let collection = self
            .store
            .create_collection(Collection::from_request(req, by.user_id))
            .await?;

        self.rooms
            .emit(
                collection.project_id,
                &ServerEvent::CollectionCreated {
                    collection: collection.clone(),
                    created_by: by.clone(),
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(collection)
    }

    pub async fn update_collection(
        &self,
        by: &SocketUser,
        collection_id: Uuid,
        updates: CollectionUpdate,
    ) -> Result<Collection, ApiError> {
        let collection = self
            .store
            .collection_by_id(collection_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Collection"))?;
        self.accessible_project(collection.project_id, by.user_id, "collection")
            .await?;

        let updated = self
            .store
            .update_collection(collection_id, updates.clone())
            .await?
            .ok_or_else(|| ApiError::not_found("Collection"))?;

        self.rooms
            .emit(
                updated.project_id,
                &ServerEvent::CollectionUpdated {
                    collection: updated.clone(),
                    updated_by: by.clone(),
                    changes: updates,
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(updated)
    }

    /// Delete a collection. Its tasks are either repointed at
    /// `move_tasks_to` or left in place with the reference cleared.
    pub async fn delete_collection(
        &self,
        by: &SocketUser,
        collection_id: Uuid,
        move_tasks_to: Option<Uuid>,
    ) -> Result<(), ApiError> {
        let collection = self
            .store
            .collection_by_id(collection_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Collection"))?;
        self.accessible_project(collection.project_id, by.user_id, "collection")
            .await?;
        if let Some(target) = move_tasks_to {
            self.store
                .collection_by_id(target)
                .await?
                .ok_or_else(|| ApiError::not_found("Target collection"))?;
        }

        self.store
            .reassign_collection_tasks(collection_id, move_tasks_to)
            .await?;
        self.store.delete_collection(collection_id).await?;

        self.rooms
            .emit(
                collection.project_id,
                &ServerEvent::CollectionDeleted {
                    collection_id,
                    collection: DeletedCollection {
                        name: collection.name.clone(),
                    },
                    deleted_by: by.clone(),
                    moved_to_collection: move_tasks_to,
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(())
    }

    /// Persist `ordered_ids` as the new 0-based collection order and
    /// announce the re-sorted list.
    pub async fn reorder_collections(
        &self,
        by: &SocketUser,
        project_id: Uuid,
        ordered_ids: Vec<Uuid>,
    ) -> Result<Vec<Collection>, ApiError> {
        self.accessible_project(project_id, by.user_id, "project")
            .await?;
        for (index, collection_id) in ordered_ids.iter().enumerate() {
            self.store
                .set_collection_order(*collection_id, index as i32)
                .await?;
        }
        let collections = self.store.collections_for_project(project_id, false).await?;

        self.rooms
            .emit(
                project_id,
                &ServerEvent::CollectionReordered {
                    project_id,
                    collections: collections.clone(),
                    reordered_by: by.clone(),
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(collections)
    }

    /// Replace a board's full column set (column rename/reorder/recolor from
    /// the board editor) and announce it.
    pub async fn update_board_columns(
        &self,
        by: &SocketUser,
        board_id: Uuid,
        columns: Vec<Column>,
    ) -> Result<Board, ApiError> {
        let board = self
            .store
            .board_by_id(board_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Board"))?;
        self.accessible_project(board.project_id, by.user_id, "board")
            .await?;
        if let Err(task_id) = board::validate_columns(&columns) {
            return Err(ApiError::Validation(format!(
                "Task {} appears in more than one column",
                task_id
            )));
        }

        let _guard = self.locks.acquire(board_id).await;
        let updated = self
            .store
            .set_board_columns(board_id, columns)
            .await?
            .ok_or_else(|| ApiError::not_found("Board"))?;

        self.rooms
            .emit(
                board_id,
                &ServerEvent::BoardColumnsUpdated {
                    board_id,
                    columns: updated.columns.clone(),
                    updated_by: by.clone(),
                    timestamp: Utc::now(),
                },
                None,
            )
            .await;
        Ok(updated)
    }

    async fn append_to_column(
        &self,
        board_id: Uuid,
        column_id: Uuid,
        task_id: Uuid,
    ) -> Result<(), ApiError> {
        let board = self
            .store
            .board_by_id(board_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Board"))?;
        let mut columns = board.columns;
        board::insert_task(&mut columns, column_id, task_id, None)
            .ok_or_else(|| ApiError::not_found("Column"))?;
        self.store.set_board_columns(board_id, columns).await?;
        Ok(())
    }
}
