//! Task model and the request/patch payloads that mutate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// A name+color tag on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub name: String,
    pub color: String,
}

/// Embedded checklist item on a task. Distinct from subtask *tasks*, which
/// are full tasks carrying a `parent_task_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// A task. Belongs to exactly one board and one project; its column
/// reference is its status surrogate, and the owning column's task-id list
/// is the source of truth for its position on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub assignee: Option<Uuid>,
    pub reporter: Uuid,
    pub project_id: Uuid,
    pub board_id: Uuid,
    pub column_id: Option<Uuid>,
    pub collection_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub is_subtask: bool,
    pub order: i32,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<ChecklistItem>,
    pub time_tracked: i32,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn from_request(req: CreateTaskRequest, reporter: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            priority: req.priority.unwrap_or_default(),
            assignee: req.assignee,
            reporter,
            project_id: req.project_id,
            board_id: req.board_id,
            column_id: req.column_id,
            collection_id: req.collection_id,
            parent_task_id: None,
            is_subtask: false,
            order: req.order.unwrap_or(0),
            labels: req.labels.unwrap_or_default(),
            due_date: req.due_date,
            subtasks: req.subtasks.unwrap_or_default(),
            time_tracked: 0,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a subtask of `parent`. Subtasks live under their parent, not in
    /// any column list.
    pub fn subtask_of(parent: &Task, req: CreateSubtaskRequest, reporter: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            priority: req.priority.unwrap_or_default(),
            assignee: req.assignee,
            reporter,
            project_id: parent.project_id,
            board_id: parent.board_id,
            column_id: None,
            collection_id: parent.collection_id,
            parent_task_id: Some(parent.id),
            is_subtask: true,
            order: 0,
            labels: Vec::new(),
            due_date: req.due_date,
            subtasks: Vec::new(),
            time_tracked: 0,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload for creating a task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee: Option<Uuid>,
    pub project_id: Uuid,
    pub board_id: Uuid,
    pub column_id: Option<Uuid>,
    pub collection_id: Option<Uuid>,
    pub labels: Option<Vec<Label>>,
    pub due_date: Option<DateTime<Utc>>,
    pub subtasks: Option<Vec<ChecklistItem>>,
    pub order: Option<i32>,
}

/// Payload for creating a subtask under a parent task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubtaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Patch applied by `task:update`. Absent fields are left unchanged.
/// A present `column_id` that differs from the task's current column turns
/// the update into a move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Label>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<ChecklistItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_tracked: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl TaskUpdate {
    /// Patch that only retargets the column reference.
    pub fn column(column_id: Uuid) -> Self {
        Self {
            column_id: Some(column_id),
            ..Self::default()
        }
    }
}

/// A client-reported drag-and-drop move.
///
/// `from_column_id == to_column_id` is a same-column reorder. `position` is
/// the destination index; omitted or out-of-range positions append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskRequest {
    pub task_id: Uuid,
    pub from_column_id: Uuid,
    pub to_column_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub board_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trip() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::parse(p.as_str()), Some(p));
        }
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn test_priority_default_is_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_task_wire_shape_is_camel_case() {
        let req = CreateTaskRequest {
            title: "Ship it".to_string(),
            description: None,
            priority: None,
            assignee: None,
            project_id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            column_id: Some(Uuid::new_v4()),
            collection_id: None,
            labels: None,
            due_date: None,
            subtasks: None,
            order: None,
        };
        let task = Task::from_request(req, Uuid::new_v4());
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("projectId").is_some());
        assert!(json.get("boardId").is_some());
        assert!(json.get("columnId").is_some());
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["isSubtask"], false);
    }

    #[test]
    fn test_subtask_inherits_parent_scope() {
        let req = CreateTaskRequest {
            title: "Parent".to_string(),
            description: None,
            priority: Some(Priority::High),
            assignee: None,
            project_id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            column_id: Some(Uuid::new_v4()),
            collection_id: Some(Uuid::new_v4()),
            labels: None,
            due_date: None,
            subtasks: None,
            order: None,
        };
        let parent = Task::from_request(req, Uuid::new_v4());
        let sub = Task::subtask_of(
            &parent,
            CreateSubtaskRequest {
                title: "Child".to_string(),
                description: None,
                priority: None,
                assignee: None,
                due_date: None,
            },
            Uuid::new_v4(),
        );
        assert_eq!(sub.project_id, parent.project_id);
        assert_eq!(sub.board_id, parent.board_id);
        assert_eq!(sub.collection_id, parent.collection_id);
        assert_eq!(sub.parent_task_id, Some(parent.id));
        assert!(sub.is_subtask);
        assert!(sub.column_id.is_none());
    }

    #[test]
    fn test_move_request_accepts_camel_case() {
        let json = serde_json::json!({
            "taskId": Uuid::new_v4(),
            "fromColumnId": Uuid::new_v4(),
            "toColumnId": Uuid::new_v4(),
            "position": 2,
            "boardId": Uuid::new_v4(),
        });
        let req: MoveTaskRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.position, Some(2));
    }

    #[test]
    fn test_move_request_requires_both_columns() {
        let json = serde_json::json!({
            "taskId": Uuid::new_v4(),
            "toColumnId": Uuid::new_v4(),
            "boardId": Uuid::new_v4(),
        });
        assert!(serde_json::from_value::<MoveTaskRequest>(json).is_err());
    }
}
