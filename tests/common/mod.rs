//! Shared test fixtures.
//!
//! Builds an application state over the in-memory store with one project,
//! one board, and helpers for attaching observer connections to rooms.

use std::sync::Arc;

use flowboard::backend::realtime::registry::RoomMember;
use flowboard::backend::server::{build_state, AppState};
use flowboard::backend::store::{MemoryStore, Store};
use flowboard::shared::event::SocketUser;
use flowboard::shared::models::board::Board;
use flowboard::shared::models::project::Project;
use flowboard::shared::models::task::{CreateTaskRequest, Task};
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub owner: SocketUser,
    pub project: Project,
    pub board: Board,
}

pub async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = build_state(store.clone() as Arc<dyn Store>, None);

    let owner = SocketUser {
        user_id: Uuid::new_v4(),
        username: "alice".to_string(),
    };
    let project = store
        .create_project(Project::new("Apollo", None, None, owner.user_id))
        .await
        .unwrap();
    let board = store
        .create_board(Board::new("Sprint", project.id, None))
        .await
        .unwrap();

    TestApp {
        state,
        store,
        owner,
        project,
        board,
    }
}

impl TestApp {
    /// Add a member to the project so access checks pass for them.
    pub async fn add_member(&mut self, username: &str) -> SocketUser {
        let user = SocketUser {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
        };
        self.project.members.push(user.user_id);
        self.store
            .update_project(
                self.project.id,
                flowboard::shared::models::project::ProjectUpdate {
                    members: Some(self.project.members.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        user
    }

    /// Attach an observer connection to a room and return its frame stream.
    pub async fn observe(
        &self,
        room_id: Uuid,
        user: &SocketUser,
    ) -> (Uuid, mpsc::UnboundedReceiver<Arc<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        let _ = self
            .state
            .rooms
            .join(room_id, RoomMember::new(conn_id, user.clone(), tx))
            .await;
        (conn_id, rx)
    }

    pub fn create_task_request(&self, title: &str, column_id: Option<Uuid>) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.to_string(),
            description: None,
            priority: None,
            assignee: None,
            project_id: self.project.id,
            board_id: self.board.id,
            column_id,
            collection_id: None,
            labels: None,
            due_date: None,
            subtasks: None,
            order: None,
        }
    }

    pub async fn seed_task(&self, title: &str, column_index: usize) -> Task {
        self.state
            .broadcaster
            .create_task(
                &self.owner,
                self.create_task_request(title, Some(self.board.columns[column_index].id)),
            )
            .await
            .unwrap()
    }
}

/// Drain everything currently queued on an observer stream.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Arc<String>>) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        events.push(serde_json::from_str(&frame).unwrap());
    }
    events
}
