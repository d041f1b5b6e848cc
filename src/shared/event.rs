//! Real-time event vocabulary.
//!
//! One colon-namespaced event name per message, registered here once. Frames
//! are JSON objects of the form `{"type": <name>, "data": {...}}` in both
//! directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::models::board::Column;
use crate::shared::models::collection::{Collection, CollectionUpdate, CreateCollectionRequest};
use crate::shared::models::task::{
    CreateSubtaskRequest, CreateTaskRequest, MoveTaskRequest, Task, TaskUpdate,
};

/// The identity a connection authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketUser {
    pub user_id: Uuid,
    pub username: String,
}

/// Minimal identity of a deleted task, enough for clients to update their
/// UI without a refetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedTask {
    pub title: String,
}

/// Minimal identity of a deleted collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCollection {
    pub name: String,
}

/// Messages the server emits to room members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "user:joined", rename_all = "camelCase")]
    UserJoined {
        user_id: Uuid,
        username: String,
        board_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "user:left", rename_all = "camelCase")]
    UserLeft {
        user_id: Uuid,
        username: String,
        board_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "user:typing", rename_all = "camelCase")]
    UserTyping {
        user_id: Uuid,
        username: String,
        task_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "user:stop_typing", rename_all = "camelCase")]
    UserStopTyping {
        user_id: Uuid,
        username: String,
        task_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "user:cursor_moved", rename_all = "camelCase")]
    UserCursorMoved {
        user_id: Uuid,
        username: String,
        x: f64,
        y: f64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "task:created", rename_all = "camelCase")]
    TaskCreated {
        task: Task,
        created_by: SocketUser,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "task:updated", rename_all = "camelCase")]
    TaskUpdated {
        task: Task,
        updated_by: SocketUser,
        changes: TaskUpdate,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "task:deleted", rename_all = "camelCase")]
    TaskDeleted {
        task_id: Uuid,
        task: DeletedTask,
        deleted_by: SocketUser,
        timestamp: DateTime<Utc>,
    },
    /// Emitted twice per move: once optimistically (no `task` payload) and
    /// once carrying the authoritative task after persistence.
    /// `from_column_id` is absent when a column-changing update moved a task
    /// that was not in any column yet.
    #[serde(rename = "task:moved", rename_all = "camelCase")]
    TaskMoved {
        #[serde(skip_serializing_if = "Option::is_none")]
        task: Option<Task>,
        task_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_column_id: Option<Uuid>,
        to_column_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
        board_id: Uuid,
        moved_by: SocketUser,
        timestamp: DateTime<Utc>,
    },
    /// Correction signal: the optimistic `task:moved` did not persist and
    /// clients must roll the move back.
    #[serde(rename = "task:move_failed", rename_all = "camelCase")]
    TaskMoveFailed {
        task_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "subtask:created", rename_all = "camelCase")]
    SubtaskCreated {
        task: Task,
        parent_task_id: Uuid,
        created_by: SocketUser,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "collection:created", rename_all = "camelCase")]
    CollectionCreated {
        collection: Collection,
        created_by: SocketUser,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "collection:updated", rename_all = "camelCase")]
    CollectionUpdated {
        collection: Collection,
        updated_by: SocketUser,
        changes: CollectionUpdate,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "collection:deleted", rename_all = "camelCase")]
    CollectionDeleted {
        collection_id: Uuid,
        collection: DeletedCollection,
        deleted_by: SocketUser,
        #[serde(skip_serializing_if = "Option::is_none")]
        moved_to_collection: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "collection:reordered", rename_all = "camelCase")]
    CollectionReordered {
        project_id: Uuid,
        collections: Vec<Collection>,
        reordered_by: SocketUser,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "board:columns_updated", rename_all = "camelCase")]
    BoardColumnsUpdated {
        board_id: Uuid,
        columns: Vec<Column>,
        updated_by: SocketUser,
        timestamp: DateTime<Utc>,
    },
    /// Sent to the offending connection only, never to the room.
    #[serde(rename = "error", rename_all = "camelCase")]
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn user_joined(user: &SocketUser, board_id: Uuid) -> Self {
        ServerEvent::UserJoined {
            user_id: user.user_id,
            username: user.username.clone(),
            board_id,
            timestamp: Utc::now(),
        }
    }

    pub fn user_left(user: &SocketUser, board_id: Uuid) -> Self {
        ServerEvent::UserLeft {
            user_id: user.user_id,
            username: user.username.clone(),
            board_id,
            timestamp: Utc::now(),
        }
    }

    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserJoined { .. } => "user:joined",
            ServerEvent::UserLeft { .. } => "user:left",
            ServerEvent::UserTyping { .. } => "user:typing",
            ServerEvent::UserStopTyping { .. } => "user:stop_typing",
            ServerEvent::UserCursorMoved { .. } => "user:cursor_moved",
            ServerEvent::TaskCreated { .. } => "task:created",
            ServerEvent::TaskUpdated { .. } => "task:updated",
            ServerEvent::TaskDeleted { .. } => "task:deleted",
            ServerEvent::TaskMoved { .. } => "task:moved",
            ServerEvent::TaskMoveFailed { .. } => "task:move_failed",
            ServerEvent::SubtaskCreated { .. } => "subtask:created",
            ServerEvent::CollectionCreated { .. } => "collection:created",
            ServerEvent::CollectionUpdated { .. } => "collection:updated",
            ServerEvent::CollectionDeleted { .. } => "collection:deleted",
            ServerEvent::CollectionReordered { .. } => "collection:reordered",
            ServerEvent::BoardColumnsUpdated { .. } => "board:columns_updated",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Messages clients send over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "join:board", rename_all = "camelCase")]
    JoinBoard { board_id: Uuid },
    #[serde(rename = "leave:board", rename_all = "camelCase")]
    LeaveBoard { board_id: Uuid },
    #[serde(rename = "task:create")]
    TaskCreate(CreateTaskRequest),
    #[serde(rename = "task:update", rename_all = "camelCase")]
    TaskUpdate { task_id: Uuid, updates: TaskUpdate },
    #[serde(rename = "task:delete", rename_all = "camelCase")]
    TaskDelete { task_id: Uuid },
    #[serde(rename = "task:move")]
    TaskMove(MoveTaskRequest),
    #[serde(rename = "subtask:create", rename_all = "camelCase")]
    SubtaskCreate {
        parent_task_id: Uuid,
        #[serde(flatten)]
        subtask: CreateSubtaskRequest,
    },
    #[serde(rename = "collection:create")]
    CollectionCreate(CreateCollectionRequest),
    #[serde(rename = "collection:update", rename_all = "camelCase")]
    CollectionUpdate {
        collection_id: Uuid,
        updates: CollectionUpdate,
    },
    #[serde(rename = "collection:delete", rename_all = "camelCase")]
    CollectionDelete {
        collection_id: Uuid,
        #[serde(default)]
        move_tasks_to_collection: Option<Uuid>,
    },
    #[serde(rename = "collection:reorder", rename_all = "camelCase")]
    CollectionReorder {
        project_id: Uuid,
        collection_ids: Vec<Uuid>,
    },
    #[serde(rename = "user:start_typing", rename_all = "camelCase")]
    StartTyping { task_id: Uuid },
    #[serde(rename = "user:stop_typing", rename_all = "camelCase")]
    StopTyping { task_id: Uuid },
    #[serde(rename = "user:cursor_move", rename_all = "camelCase")]
    CursorMove { x: f64, y: f64, board_id: Uuid },
    #[serde(rename = "board:update_columns", rename_all = "camelCase")]
    UpdateColumns {
        board_id: Uuid,
        columns: Vec<Column>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_wire_name() {
        let user = SocketUser {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
        };
        let event = ServerEvent::user_joined(&user, Uuid::new_v4());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user:joined");
        assert_eq!(json["data"]["username"], "alice");
        assert!(json["data"]["boardId"].is_string());
    }

    #[test]
    fn test_optimistic_move_omits_task() {
        let user = SocketUser {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
        };
        let event = ServerEvent::TaskMoved {
            task: None,
            task_id: Uuid::new_v4(),
            from_column_id: Some(Uuid::new_v4()),
            to_column_id: Uuid::new_v4(),
            position: None,
            board_id: Uuid::new_v4(),
            moved_by: user,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task:moved");
        assert!(json["data"].get("task").is_none());
        assert!(json["data"].get("position").is_none());
        assert!(json["data"]["fromColumnId"].is_string());
    }

    #[test]
    fn test_client_message_join_board() {
        let board_id = Uuid::new_v4();
        let frame = format!(
            r#"{{"type":"join:board","data":{{"boardId":"{}"}}}}"#,
            board_id
        );
        let msg: ClientMessage = serde_json::from_str(&frame).unwrap();
        match msg {
            ClientMessage::JoinBoard { board_id: b } => assert_eq!(b, board_id),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_client_message_task_move() {
        let frame = serde_json::json!({
            "type": "task:move",
            "data": {
                "taskId": Uuid::new_v4(),
                "fromColumnId": Uuid::new_v4(),
                "toColumnId": Uuid::new_v4(),
                "boardId": Uuid::new_v4(),
            }
        });
        let msg: ClientMessage = serde_json::from_value(frame).unwrap();
        match msg {
            ClientMessage::TaskMove(req) => assert!(req.position.is_none()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let frame = r#"{"type":"task:explode","data":{}}"#;
        assert!(serde_json::from_str::<ClientMessage>(frame).is_err());
    }

    #[test]
    fn test_error_event_shape() {
        let json =
            serde_json::to_value(ServerEvent::error("Access denied to this board")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["message"], "Access denied to this board");
    }
}
