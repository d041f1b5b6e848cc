//! Drag-and-Drop Reconciler
//!
//! Makes interactive reordering feel instantaneous while keeping the
//! durable column state correct. Per move the states are
//! `Requested → Broadcast(optimistic) → Persisting → {Confirmed | Reverted}`:
//!
//! 1. the raw move is broadcast to the *other* room members before any
//!    persistence, so the rest of the room renders it with zero latency;
//! 2. the persisted column lists are then reordered under the board's
//!    mutation lock;
//! 3. on success a second `task:moved` carries the authoritative task to the
//!    whole room (the initiator included, since it must reconcile its
//!    optimistic local state); on any failure `task:move_failed` tells the
//!    whole room to roll the move back.
//!
//! Every move that reaches the optimistic broadcast is followed by exactly
//! one of the two signals; an optimistic broadcast with neither would leave
//! the room permanently inconsistent.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::backend::access::has_access;
use crate::backend::error::ApiError;
use crate::backend::realtime::locks::BoardLocks;
use crate::backend::realtime::registry::RoomRegistry;
use crate::backend::store::Store;
use crate::shared::event::{ServerEvent, SocketUser};
use crate::shared::models::board;
use crate::shared::models::task::{MoveTaskRequest, Task, TaskUpdate};

pub struct MoveReconciler {
    store: Arc<dyn Store>,
    rooms: Arc<RoomRegistry>,
    locks: Arc<BoardLocks>,
}

impl MoveReconciler {
    pub fn new(store: Arc<dyn Store>, rooms: Arc<RoomRegistry>, locks: Arc<BoardLocks>) -> Self {
        Self {
            store,
            rooms,
            locks,
        }
    }

    /// Run one move through the full state machine.
    ///
    /// `initiator` is the connection that reported the move; it is excluded
    /// from the optimistic broadcast (it already applied the move locally)
    /// but receives the confirmation or revert. REST-initiated moves pass
    /// `None`.
    pub async fn move_task(
        &self,
        initiator: Option<Uuid>,
        by: &SocketUser,
        req: MoveTaskRequest,
    ) -> Result<Task, ApiError> {
        // Broadcast(optimistic): the room renders the move before we touch
        // the store.
        self.rooms
            .emit(
                req.board_id,
                &ServerEvent::TaskMoved {
                    task: None,
                    task_id: req.task_id,
                    from_column_id: Some(req.from_column_id),
                    to_column_id: req.to_column_id,
                    position: req.position,
                    board_id: req.board_id,
                    moved_by: by.clone(),
                    timestamp: Utc::now(),
                },
                initiator,
            )
            .await;

        // Persisting, serialized per board.
        let result = {
            let _guard = self.locks.acquire(req.board_id).await;
            self.persist_move(by, &req).await
        };

        match result {
            Ok((task, position)) => {
                // Confirmed: authoritative object to the whole room.
                self.rooms
                    .emit(
                        req.board_id,
                        &ServerEvent::TaskMoved {
                            task: Some(task.clone()),
                            task_id: task.id,
                            from_column_id: Some(req.from_column_id),
                            to_column_id: req.to_column_id,
                            position: Some(position),
                            board_id: req.board_id,
                            moved_by: by.clone(),
                            timestamp: Utc::now(),
                        },
                        None,
                    )
                    .await;
                Ok(task)
            }
            Err(error) => {
                // Reverted: the optimistic placement must be rolled back
                // everywhere. Swallowing the failure here would leave the
                // room permanently inconsistent.
                self.rooms
                    .emit(
                        req.board_id,
                        &ServerEvent::TaskMoveFailed {
                            task_id: req.task_id,
                            error: error.to_string(),
                            timestamp: Utc::now(),
                        },
                        None,
                    )
                    .await;
                Err(error)
            }
        }
    }

    /// The durable half of a move. Returns the task after persistence along
    /// with the index it landed at in the destination column.
    async fn persist_move(
        &self,
        by: &SocketUser,
        req: &MoveTaskRequest,
    ) -> Result<(Task, usize), ApiError> {
        let task = self
            .store
            .task_by_id(req.task_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))?;
        // Access can have changed since the client loaded the board.
        let project = self
            .store
            .project_by_id(task.project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
        if !has_access(by.user_id, &project) {
            return Err(ApiError::access_denied("board"));
        }
        if task.board_id != req.board_id {
            return Err(ApiError::Validation(
                "Task does not belong to this board".to_string(),
            ));
        }

        let board = self
            .store
            .board_by_id(req.board_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Board"))?;
        if board.column(req.to_column_id).is_none() {
            return Err(ApiError::not_found("Column"));
        }

        let mut columns = board.columns;
        // Sweep the id from every list, not just `from_column_id`; the
        // client's idea of the source column may already be stale.
        board::remove_task(&mut columns, req.task_id);
        let position = board::insert_task(&mut columns, req.to_column_id, req.task_id, req.position)
            .ok_or_else(|| ApiError::not_found("Column"))?;
        self.store.set_board_columns(board.id, columns).await?;

        self.store
            .update_task(req.task_id, TaskUpdate::column(req.to_column_id))
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))?;

        // Re-fetch so the confirmation carries exactly what was persisted.
        let task = self
            .store
            .task_by_id(req.task_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))?;
        Ok((task, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::store::MemoryStore;
    use crate::shared::models::board::Board;
    use crate::shared::models::project::Project;
    use crate::shared::models::task::CreateTaskRequest;

    struct Fixture {
        store: Arc<MemoryStore>,
        rooms: Arc<RoomRegistry>,
        reconciler: MoveReconciler,
        member: SocketUser,
        board: Board,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(RoomRegistry::new());
        let locks = Arc::new(BoardLocks::new());
        let reconciler =
            MoveReconciler::new(store.clone() as Arc<dyn Store>, rooms.clone(), locks);

        let member = SocketUser {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
        };
        let project = store
            .create_project(Project::new("Apollo", None, None, member.user_id))
            .await
            .unwrap();
        let board = store
            .create_board(Board::new("Sprint", project.id, None))
            .await
            .unwrap();
        Fixture {
            store,
            rooms,
            reconciler,
            member,
            board,
        }
    }

    async fn seed_task(fx: &Fixture, column_index: usize) -> Task {
        let column_id = fx.board.columns[column_index].id;
        let task = fx
            .store
            .create_task(Task::from_request(
                CreateTaskRequest {
                    title: "seeded".to_string(),
                    description: None,
                    priority: None,
                    assignee: None,
                    project_id: fx.board.project_id,
                    board_id: fx.board.id,
                    column_id: Some(column_id),
                    collection_id: None,
                    labels: None,
                    due_date: None,
                    subtasks: None,
                    order: None,
                },
                fx.member.user_id,
            ))
            .await
            .unwrap();
        let mut board = fx.store.board_by_id(fx.board.id).await.unwrap().unwrap();
        board::insert_task(&mut board.columns, column_id, task.id, None);
        fx.store
            .set_board_columns(fx.board.id, board.columns)
            .await
            .unwrap();
        task
    }

    fn move_request(fx: &Fixture, task: &Task, to_index: usize, position: Option<usize>) -> MoveTaskRequest {
        MoveTaskRequest {
            task_id: task.id,
            from_column_id: task.column_id.unwrap(),
            to_column_id: fx.board.columns[to_index].id,
            position,
            board_id: fx.board.id,
        }
    }

    #[tokio::test]
    async fn test_move_lands_at_requested_position() {
        let fx = fixture().await;
        let task = seed_task(&fx, 0).await;
        seed_task(&fx, 1).await;
        seed_task(&fx, 1).await;

        let moved = fx
            .reconciler
            .move_task(None, &fx.member, move_request(&fx, &task, 1, Some(1)))
            .await
            .unwrap();

        assert_eq!(moved.column_id, Some(fx.board.columns[1].id));
        let board = fx.store.board_by_id(fx.board.id).await.unwrap().unwrap();
        assert_eq!(board.columns[1].task_ids.len(), 3);
        assert_eq!(board.columns[1].task_ids[1], task.id);
        assert!(board.columns[0].task_ids.is_empty());
        assert!(board::validate_columns(&board.columns).is_ok());
    }

    #[tokio::test]
    async fn test_out_of_range_position_clamps_to_append() {
        let fx = fixture().await;
        let task = seed_task(&fx, 0).await;
        seed_task(&fx, 1).await;

        fx.reconciler
            .move_task(None, &fx.member, move_request(&fx, &task, 1, Some(50)))
            .await
            .unwrap();

        let board = fx.store.board_by_id(fx.board.id).await.unwrap().unwrap();
        assert_eq!(*board.columns[1].task_ids.last().unwrap(), task.id);
    }

    #[tokio::test]
    async fn test_same_column_reorder() {
        let fx = fixture().await;
        let first = seed_task(&fx, 0).await;
        let second = seed_task(&fx, 0).await;

        fx.reconciler
            .move_task(None, &fx.member, move_request(&fx, &second, 0, Some(0)))
            .await
            .unwrap();

        let board = fx.store.board_by_id(fx.board.id).await.unwrap().unwrap();
        assert_eq!(board.columns[0].task_ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_non_member_move_is_reverted() {
        let fx = fixture().await;
        let task = seed_task(&fx, 0).await;
        let outsider = SocketUser {
            user_id: Uuid::new_v4(),
            username: "mallory".to_string(),
        };

        let err = fx
            .reconciler
            .move_task(None, &outsider, move_request(&fx, &task, 1, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AccessDenied(_)));
        let board = fx.store.board_by_id(fx.board.id).await.unwrap().unwrap();
        assert_eq!(board.columns[0].task_ids, vec![task.id]);
        assert!(board.columns[1].task_ids.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_moves_of_sibling_tasks_keep_invariant() {
        let fx = fixture().await;
        let fx = Arc::new(fx);
        let mut tasks = Vec::new();
        for _ in 0..4 {
            tasks.push(seed_task(&fx, 0).await);
        }

        let mut handles = Vec::new();
        for task in &tasks {
            let fx = fx.clone();
            let req = move_request(&fx, task, 1, Some(0));
            let member = fx.member.clone();
            handles.push(tokio::spawn(async move {
                fx.reconciler.move_task(None, &member, req).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let board = fx.store.board_by_id(fx.board.id).await.unwrap().unwrap();
        assert!(board.columns[0].task_ids.is_empty());
        assert_eq!(board.columns[1].task_ids.len(), 4);
        assert!(board::validate_columns(&board.columns).is_ok());
    }

    #[tokio::test]
    async fn test_persistence_failure_emits_move_failed() {
        let fx = fixture().await;
        let task = seed_task(&fx, 0).await;

        // A room member watches the traffic.
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = crate::backend::realtime::registry::RoomMember::new(
            Uuid::new_v4(),
            SocketUser {
                user_id: Uuid::new_v4(),
                username: "bob".to_string(),
            },
            tx,
        );
        let _ = fx.rooms.join(fx.board.id, watcher).await;

        fx.store.set_fail_writes(true);
        let err = fx
            .reconciler
            .move_task(None, &fx.member, move_request(&fx, &task, 1, None))
            .await
            .unwrap_err();
        fx.store.set_fail_writes(false);
        assert!(matches!(err, ApiError::Persistence(_)));

        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str::<serde_json::Value>(&frame).unwrap());
        }
        // Optimistic broadcast followed by the revert signal.
        assert!(events.iter().any(|e| e["type"] == "task:moved"));
        assert!(events
            .iter()
            .any(|e| e["type"] == "task:move_failed"
                && e["data"]["taskId"] == task.id.to_string()));

        // Nothing was left half-moved.
        let board = fx.store.board_by_id(fx.board.id).await.unwrap().unwrap();
        assert_eq!(board.columns[0].task_ids, vec![task.id]);
        assert!(board::validate_columns(&board.columns).is_ok());
    }
}
