//! In-memory persistence gateway.
//!
//! Used by the test suite and by servers started without a `DATABASE_URL`.
//! Writes can be failed on demand so the reconciler's revert path is
//! testable without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::backend::store::{
    apply_collection_update, apply_project_update, apply_task_update, BoardUpdate, Store,
    StoreError, TaskFilter,
};
use crate::shared::models::board::{Board, Column};
use crate::shared::models::collection::{Collection, CollectionUpdate};
use crate::shared::models::project::{Project, ProjectUpdate};
use crate::shared::models::task::{Task, TaskUpdate};

#[derive(Default)]
struct Inner {
    projects: HashMap<Uuid, Project>,
    boards: HashMap<Uuid, Board>,
    tasks: HashMap<Uuid, Task>,
    collections: HashMap<Uuid, Collection>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error. Reads keep
    /// working so access checks still pass before the failing write.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Backend("write failure injected".to_string()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn sort_by_order(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_project(&self, project: Project) -> Result<Project, StoreError> {
        self.check_write()?;
        self.lock().projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn project_by_id(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.lock().projects.get(&id).cloned())
    }

    async fn projects_for_user(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self
            .lock()
            .projects
            .values()
            .filter(|p| p.created_by == user_id || p.members.contains(&user_id))
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn update_project(
        &self,
        id: Uuid,
        patch: ProjectUpdate,
    ) -> Result<Option<Project>, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        Ok(inner.projects.get_mut(&id).map(|project| {
            apply_project_update(project, &patch);
            project.clone()
        }))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        let existed = inner.projects.remove(&id).is_some();
        if existed {
            inner.boards.retain(|_, b| b.project_id != id);
            inner.tasks.retain(|_, t| t.project_id != id);
            inner.collections.retain(|_, c| c.project_id != id);
        }
        Ok(existed)
    }

    async fn create_board(&self, board: Board) -> Result<Board, StoreError> {
        self.check_write()?;
        self.lock().boards.insert(board.id, board.clone());
        Ok(board)
    }

    async fn board_by_id(&self, id: Uuid) -> Result<Option<Board>, StoreError> {
        Ok(self.lock().boards.get(&id).cloned())
    }

    async fn boards_for_project(&self, project_id: Uuid) -> Result<Vec<Board>, StoreError> {
        let mut boards: Vec<Board> = self
            .lock()
            .boards
            .values()
            .filter(|b| b.project_id == project_id)
            .cloned()
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    async fn update_board(&self, id: Uuid, patch: BoardUpdate) -> Result<Option<Board>, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        Ok(inner.boards.get_mut(&id).map(|board| {
            if let Some(name) = patch.name {
                board.name = name;
            }
            if let Some(columns) = patch.columns {
                board.columns = columns;
            }
            board.updated_at = chrono::Utc::now();
            board.clone()
        }))
    }

    async fn set_board_columns(
        &self,
        board_id: Uuid,
        columns: Vec<Column>,
    ) -> Result<Option<Board>, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        Ok(inner.boards.get_mut(&board_id).map(|board| {
            board.columns = columns;
            board.updated_at = chrono::Utc::now();
            board.clone()
        }))
    }

    async fn delete_board(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        let existed = inner.boards.remove(&id).is_some();
        if existed {
            inner.tasks.retain(|_, t| t.board_id != id);
        }
        Ok(existed)
    }

    async fn create_task(&self, task: Task) -> Result<Task, StoreError> {
        self.check_write()?;
        self.lock().tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn task_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.lock().tasks.get(&id).cloned())
    }

    async fn tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .lock()
            .tasks
            .values()
            .filter(|t| {
                filter.project_id.is_none_or(|id| t.project_id == id)
                    && filter.board_id.is_none_or(|id| t.board_id == id)
                    && filter.column_id.is_none_or(|id| t.column_id == Some(id))
                    && filter
                        .collection_id
                        .is_none_or(|id| t.collection_id == Some(id))
                    && filter
                        .parent_task_id
                        .is_none_or(|id| t.parent_task_id == Some(id))
                    && (filter.include_subtasks
                        || filter.parent_task_id.is_some()
                        || !t.is_subtask)
            })
            .cloned()
            .collect();
        sort_by_order(&mut tasks);
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, patch: TaskUpdate) -> Result<Option<Task>, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        Ok(inner.tasks.get_mut(&id).map(|task| {
            apply_task_update(task, &patch);
            task.clone()
        }))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        let existed = inner.tasks.remove(&id).is_some();
        if existed {
            inner.tasks.retain(|_, t| t.parent_task_id != Some(id));
        }
        Ok(existed)
    }

    async fn create_collection(&self, collection: Collection) -> Result<Collection, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        let duplicate = inner.collections.values().any(|c| {
            c.project_id == collection.project_id && c.name == collection.name
        });
        if duplicate {
            return Err(StoreError::Conflict(
                "A collection with this name already exists in this project".to_string(),
            ));
        }
        inner.collections.insert(collection.id, collection.clone());
        Ok(collection)
    }

    async fn collection_by_id(&self, id: Uuid) -> Result<Option<Collection>, StoreError> {
        Ok(self.lock().collections.get(&id).cloned())
    }

    async fn collections_for_project(
        &self,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Collection>, StoreError> {
        let mut collections: Vec<Collection> = self
            .lock()
            .collections
            .values()
            .filter(|c| c.project_id == project_id && (include_archived || !c.is_archived))
            .cloned()
            .collect();
        collections.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(collections)
    }

    async fn update_collection(
        &self,
        id: Uuid,
        patch: CollectionUpdate,
    ) -> Result<Option<Collection>, StoreError> {
        self.check_write()?;
        let mut inner = self.lock();
        if let Some(new_name) = &patch.name {
            let target = match inner.collections.get(&id) {
                Some(c) => (c.project_id, c.name.clone()),
                None => return Ok(None),
            };
            let duplicate = inner.collections.values().any(|c| {
                c.id != id && c.project_id == target.0 && c.name == *new_name
            });
            if duplicate {
                return Err(StoreError::Conflict(
                    "A collection with this name already exists in this project".to_string(),
                ));
            }
        }
        Ok(inner.collections.get_mut(&id).map(|collection| {
            apply_collection_update(collection, &patch);
            collection.clone()
        }))
    }

    async fn delete_collection(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_write()?;
        Ok(self.lock().collections.remove(&id).is_some())
    }

    async fn set_collection_order(&self, id: Uuid, order: i32) -> Result<(), StoreError> {
        self.check_write()?;
        if let Some(collection) = self.lock().collections.get_mut(&id) {
            collection.order = order;
            collection.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn reassign_collection_tasks(
        &self,
        from: Uuid,
        to: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        self.check_write()?;
        let mut touched = 0;
        for task in self.lock().tasks.values_mut() {
            if task.collection_id == Some(from) {
                task.collection_id = to;
                task.updated_at = chrono::Utc::now();
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::task::CreateTaskRequest;

    fn task_in(project_id: Uuid, board_id: Uuid, order: i32) -> Task {
        let mut task = Task::from_request(
            CreateTaskRequest {
                title: format!("task-{}", order),
                description: None,
                priority: None,
                assignee: None,
                project_id,
                board_id,
                column_id: None,
                collection_id: None,
                labels: None,
                due_date: None,
                subtasks: None,
                order: Some(order),
            },
            Uuid::new_v4(),
        );
        task.created_at = chrono::Utc::now();
        task
    }

    #[tokio::test]
    async fn test_task_round_trip() {
        let store = MemoryStore::new();
        let task = task_in(Uuid::new_v4(), Uuid::new_v4(), 0);
        let created = store.create_task(task.clone()).await.unwrap();
        let fetched = store.task_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, task.title);
        assert_eq!(fetched.column_id, task.column_id);
        assert_eq!(fetched.collection_id, task.collection_id);
        assert_eq!(fetched.assignee, task.assignee);
    }

    #[tokio::test]
    async fn test_tasks_sorted_by_order_then_created_at() {
        let store = MemoryStore::new();
        let project = Uuid::new_v4();
        let board = Uuid::new_v4();
        for order in [2, 0, 1] {
            store.create_task(task_in(project, board, order)).await.unwrap();
        }
        let tasks = store.tasks(TaskFilter::board(board)).await.unwrap();
        let orders: Vec<i32> = tasks.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_duplicate_collection_name_conflicts() {
        let store = MemoryStore::new();
        let project_id = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let make = |name: &str| {
            Collection::from_request(
                crate::shared::models::collection::CreateCollectionRequest {
                    name: name.to_string(),
                    description: None,
                    color: None,
                    project_id,
                    order: None,
                },
                creator,
            )
        };
        store.create_collection(make("Sprint 1")).await.unwrap();
        let err = store.create_collection(make("Sprint 1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reassign_collection_tasks() {
        let store = MemoryStore::new();
        let project = Uuid::new_v4();
        let board = Uuid::new_v4();
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        for i in 0..3 {
            let mut task = task_in(project, board, i);
            task.collection_id = Some(from);
            store.create_task(task).await.unwrap();
        }

        let touched = store.reassign_collection_tasks(from, Some(to)).await.unwrap();
        assert_eq!(touched, 3);
        let remaining = store.tasks(TaskFilter::collection(from)).await.unwrap();
        assert!(remaining.is_empty());
        let moved = store.tasks(TaskFilter::collection(to)).await.unwrap();
        assert_eq!(moved.len(), 3);

        let detached = store.reassign_collection_tasks(to, None).await.unwrap();
        assert_eq!(detached, 3);
        assert!(store.tasks(TaskFilter::collection(to)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryStore::new();
        let task = task_in(Uuid::new_v4(), Uuid::new_v4(), 0);
        store.create_task(task.clone()).await.unwrap();

        store.set_fail_writes(true);
        assert!(store
            .update_task(task.id, TaskUpdate::default())
            .await
            .is_err());
        // Reads still work while writes fail.
        assert!(store.task_by_id(task.id).await.unwrap().is_some());

        store.set_fail_writes(false);
        assert!(store
            .update_task(task.id, TaskUpdate::default())
            .await
            .is_ok());
    }
}
