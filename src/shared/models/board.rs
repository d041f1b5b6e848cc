//! Board and column models.
//!
//! A board owns an ordered list of columns; each column holds an ordered
//! list of task ids. A task's position on the board is encoded solely by its
//! membership and index within exactly one column's task-id list, so all
//! drag-and-drop reordering is surgery on these lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named lane on a board holding an ordered list of task ids.
///
/// Column membership doubles as a task's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub order: i32,
    #[serde(default)]
    pub task_ids: Vec<Uuid>,
}

impl Column {
    pub fn new(name: impl Into<String>, color: impl Into<String>, order: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color: color.into(),
            order,
            task_ids: Vec::new(),
        }
    }
}

/// A project's kanban surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    pub project_id: Uuid,
    pub columns: Vec<Column>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// Create a board. When `columns` is `None` the three default lanes are
    /// used.
    pub fn new(name: impl Into<String>, project_id: Uuid, columns: Option<Vec<Column>>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            project_id,
            columns: columns.unwrap_or_else(default_columns),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn column(&self, column_id: Uuid) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// The column currently holding `task_id`, if any.
    pub fn column_of_task(&self, task_id: Uuid) -> Option<&Column> {
        self.columns.iter().find(|c| c.task_ids.contains(&task_id))
    }
}

/// The default lanes a board is created with when the caller supplies none.
pub fn default_columns() -> Vec<Column> {
    vec![
        Column::new("To Do", "#EF4444", 0),
        Column::new("In Progress", "#F59E0B", 1),
        Column::new("Done", "#10B981", 2),
    ]
}

/// Remove `task_id` from every column list it appears in.
///
/// Returns the id of the column it was removed from, if any. A task id should
/// only ever appear once (see [`validate_columns`]), but removal sweeps all
/// lists so a previously corrupted board converges back to the invariant.
pub fn remove_task(columns: &mut [Column], task_id: Uuid) -> Option<Uuid> {
    let mut removed_from = None;
    for column in columns.iter_mut() {
        let before = column.task_ids.len();
        column.task_ids.retain(|id| *id != task_id);
        if column.task_ids.len() != before {
            removed_from.get_or_insert(column.id);
        }
    }
    removed_from
}

/// Insert `task_id` into the column `column_id` at `position`.
///
/// A `position` past the end of the list (or `None`) appends; a move never
/// fails on an out-of-range index. Returns the index the task landed at, or
/// `None` when the column does not exist.
pub fn insert_task(
    columns: &mut [Column],
    column_id: Uuid,
    task_id: Uuid,
    position: Option<usize>,
) -> Option<usize> {
    let column = columns.iter_mut().find(|c| c.id == column_id)?;
    let index = position
        .unwrap_or(column.task_ids.len())
        .min(column.task_ids.len());
    column.task_ids.insert(index, task_id);
    Some(index)
}

/// Check the board invariant: a task id appears in at most one column's list,
/// and at most once within that list.
pub fn validate_columns(columns: &[Column]) -> Result<(), Uuid> {
    let mut seen = std::collections::HashSet::new();
    for column in columns {
        for task_id in &column.task_ids {
            if !seen.insert(*task_id) {
                return Err(*task_id);
            }
        }
    }
    Ok(())
}
