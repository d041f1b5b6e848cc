//! PostgreSQL persistence gateway.
//!
//! Row mapping is explicit. Board columns live in a single JSONB document on
//! the board row, so every column-list mutation is one atomic row update.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{postgres::PgRow, PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::backend::store::{
    apply_collection_update, apply_project_update, apply_task_update, BoardUpdate, Store,
    StoreError, TaskFilter,
};
use crate::shared::models::board::{Board, Column};
use crate::shared::models::collection::{Collection, CollectionUpdate};
use crate::shared::models::project::{Project, ProjectUpdate};
use crate::shared::models::task::{ChecklistItem, Label, Priority, Task, TaskUpdate};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn project_from_row(row: &PgRow) -> Result<Project, sqlx::Error> {
    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        color: row.try_get("color")?,
        created_by: row.try_get("created_by")?,
        members: row.try_get("members")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn board_from_row(row: &PgRow) -> Result<Board, sqlx::Error> {
    let Json(columns): Json<Vec<Column>> = row.try_get("columns")?;
    Ok(Board {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        project_id: row.try_get("project_id")?,
        columns,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<Task, sqlx::Error> {
    let Json(labels): Json<Vec<Label>> = row.try_get("labels")?;
    let Json(subtasks): Json<Vec<ChecklistItem>> = row.try_get("subtasks")?;
    let priority: String = row.try_get("priority")?;
    Ok(Task {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        priority: Priority::parse(&priority).unwrap_or_default(),
        assignee: row.try_get("assignee")?,
        reporter: row.try_get("reporter")?,
        project_id: row.try_get("project_id")?,
        board_id: row.try_get("board_id")?,
        column_id: row.try_get("column_id")?,
        collection_id: row.try_get("collection_id")?,
        parent_task_id: row.try_get("parent_task_id")?,
        is_subtask: row.try_get("is_subtask")?,
        order: row.try_get("task_order")?,
        labels,
        due_date: row.try_get("due_date")?,
        subtasks,
        time_tracked: row.try_get("time_tracked")?,
        dependencies: row.try_get("dependencies")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collection_from_row(row: &PgRow) -> Result<Collection, sqlx::Error> {
    Ok(Collection {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        color: row.try_get("color")?,
        project_id: row.try_get("project_id")?,
        order: row.try_get("collection_order")?,
        is_archived: row.try_get("is_archived")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const TASK_COLUMNS: &str = "id, title, description, priority, assignee, reporter, project_id, \
     board_id, column_id, collection_id, parent_task_id, is_subtask, task_order, labels, \
     due_date, subtasks, time_tracked, dependencies, created_at, updated_at";

async fn write_task(pool: &PgPool, task: &Task) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET title = $2, description = $3, priority = $4, assignee = $5, column_id = $6,
            collection_id = $7, task_order = $8, labels = $9, due_date = $10, subtasks = $11,
            time_tracked = $12, dependencies = $13, updated_at = $14
        WHERE id = $1
        "#,
    )
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.priority.as_str())
    .bind(task.assignee)
    .bind(task.column_id)
    .bind(task.collection_id)
    .bind(task.order)
    .bind(Json(&task.labels))
    .bind(task.due_date)
    .bind(Json(&task.subtasks))
    .bind(task.time_tracked)
    .bind(&task.dependencies)
    .bind(task.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn create_project(&self, project: Project) -> Result<Project, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, description, color, created_by, members, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.color)
        .bind(project.created_by)
        .bind(&project.members)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(project)
    }

    async fn project_by_id(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| project_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn projects_for_user(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM projects
            WHERE created_by = $1 OR $1 = ANY(members)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(project_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn update_project(
        &self,
        id: Uuid,
        patch: ProjectUpdate,
    ) -> Result<Option<Project>, StoreError> {
        let Some(mut project) = self.project_by_id(id).await? else {
            return Ok(None);
        };
        apply_project_update(&mut project, &patch);
        sqlx::query(
            r#"
            UPDATE projects
            SET name = $2, description = $3, color = $4, members = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.color)
        .bind(&project.members)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(Some(project))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_board(&self, board: Board) -> Result<Board, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO boards (id, name, project_id, columns, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(board.id)
        .bind(&board.name)
        .bind(board.project_id)
        .bind(Json(&board.columns))
        .bind(board.created_at)
        .bind(board.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(board)
    }

    async fn board_by_id(&self, id: Uuid) -> Result<Option<Board>, StoreError> {
        let row = sqlx::query("SELECT * FROM boards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| board_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn boards_for_project(&self, project_id: Uuid) -> Result<Vec<Board>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM boards WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(board_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn update_board(&self, id: Uuid, patch: BoardUpdate) -> Result<Option<Board>, StoreError> {
        let Some(mut board) = self.board_by_id(id).await? else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            board.name = name;
        }
        if let Some(columns) = patch.columns {
            board.columns = columns;
        }
        board.updated_at = chrono::Utc::now();
        sqlx::query(
            "UPDATE boards SET name = $2, columns = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(board.id)
        .bind(&board.name)
        .bind(Json(&board.columns))
        .bind(board.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(Some(board))
    }

    async fn set_board_columns(
        &self,
        board_id: Uuid,
        columns: Vec<Column>,
    ) -> Result<Option<Board>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE boards SET columns = $2, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(board_id)
        .bind(Json(&columns))
        .bind(chrono::Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| board_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn delete_board(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_task(&self, task: Task) -> Result<Task, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, priority, assignee, reporter, project_id,
                board_id, column_id, collection_id, parent_task_id, is_subtask, task_order,
                labels, due_date, subtasks, time_tracked, dependencies, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20)
            "#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority.as_str())
        .bind(task.assignee)
        .bind(task.reporter)
        .bind(task.project_id)
        .bind(task.board_id)
        .bind(task.column_id)
        .bind(task.collection_id)
        .bind(task.parent_task_id)
        .bind(task.is_subtask)
        .bind(task.order)
        .bind(Json(&task.labels))
        .bind(task.due_date)
        .bind(Json(&task.subtasks))
        .bind(task.time_tracked)
        .bind(&task.dependencies)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(task)
    }

    async fn task_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| task_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM tasks WHERE TRUE", TASK_COLUMNS));
        if let Some(project_id) = filter.project_id {
            builder.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(board_id) = filter.board_id {
            builder.push(" AND board_id = ").push_bind(board_id);
        }
        if let Some(column_id) = filter.column_id {
            builder.push(" AND column_id = ").push_bind(column_id);
        }
        if let Some(collection_id) = filter.collection_id {
            builder.push(" AND collection_id = ").push_bind(collection_id);
        }
        if let Some(parent_task_id) = filter.parent_task_id {
            builder.push(" AND parent_task_id = ").push_bind(parent_task_id);
        } else if !filter.include_subtasks {
            builder.push(" AND is_subtask = FALSE");
        }
        builder.push(" ORDER BY task_order ASC, created_at ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(task_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn update_task(&self, id: Uuid, patch: TaskUpdate) -> Result<Option<Task>, StoreError> {
        let Some(mut task) = self.task_by_id(id).await? else {
            return Ok(None);
        };
        apply_task_update(&mut task, &patch);
        write_task(&self.pool, &task).await?;
        Ok(Some(task))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_collection(&self, collection: Collection) -> Result<Collection, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO collections (id, name, description, color, project_id, collection_order,
                is_archived, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(collection.id)
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(&collection.color)
        .bind(collection.project_id)
        .bind(collection.order)
        .bind(collection.is_archived)
        .bind(collection.created_by)
        .bind(collection.created_at)
        .bind(collection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict(
                "A collection with this name already exists in this project".to_string(),
            ),
            other => other,
        })?;
        Ok(collection)
    }

    async fn collection_by_id(&self, id: Uuid) -> Result<Option<Collection>, StoreError> {
        let row = sqlx::query("SELECT * FROM collections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| collection_from_row(&r))
            .transpose()
            .map_err(Into::into)
    }

    async fn collections_for_project(
        &self,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Collection>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM collections
            WHERE project_id = $1 AND (is_archived = FALSE OR $2)
            ORDER BY collection_order ASC, created_at ASC
            "#,
        )
        .bind(project_id)
        .bind(include_archived)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(collection_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn update_collection(
        &self,
        id: Uuid,
        patch: CollectionUpdate,
    ) -> Result<Option<Collection>, StoreError> {
        let Some(mut collection) = self.collection_by_id(id).await? else {
            return Ok(None);
        };
        apply_collection_update(&mut collection, &patch);
        sqlx::query(
            r#"
            UPDATE collections
            SET name = $2, description = $3, color = $4, collection_order = $5,
                is_archived = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(collection.id)
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(&collection.color)
        .bind(collection.order)
        .bind(collection.is_archived)
        .bind(collection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict(
                "A collection with this name already exists in this project".to_string(),
            ),
            other => other,
        })?;
        Ok(Some(collection))
    }

    async fn delete_collection(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_collection_order(&self, id: Uuid, order: i32) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE collections SET collection_order = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(order)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reassign_collection_tasks(
        &self,
        from: Uuid,
        to: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE tasks SET collection_id = $2, updated_at = $3 WHERE collection_id = $1",
        )
        .bind(from)
        .bind(to)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
