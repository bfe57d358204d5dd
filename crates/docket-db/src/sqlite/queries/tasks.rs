use chrono::Utc;
use rusqlite::{params, Row};

use docket_core::task::{CreateTask, Task, TaskFilter, TaskSort, UpdateTask};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category_id: row.get("category_id")?,
        tag_id: row.get("tag_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_task_sync(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tasks (id, title, description, category_id, tag_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    input.title,
                    input.description,
                    input.category_id,
                    input.tag_id,
                    now,
                    now,
                ],
            )
            .to_db()?;

            conn.query_row(
                "SELECT * FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .to_db()
        })
    }

    pub fn get_task_sync(&self, id: &str) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .map_err(|e| not_found_or(e, format!("task {id}")))
        })
    }

    pub fn list_tasks_sync(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(ref title) = filter.title {
                param_values.push(Box::new(title.clone()));
                sql.push_str(&format!(
                    " AND instr(lower(title), lower(?{})) > 0",
                    param_values.len()
                ));
            }
            if let Some(ref category_id) = filter.category_id {
                param_values.push(Box::new(category_id.clone()));
                sql.push_str(&format!(" AND category_id = ?{}", param_values.len()));
            }
            if let Some(ref tag_id) = filter.tag_id {
                param_values.push(Box::new(tag_id.clone()));
                sql.push_str(&format!(" AND tag_id = ?{}", param_values.len()));
            }

            match filter.sort {
                TaskSort::Created => sql.push_str(" ORDER BY created_at ASC, rowid ASC"),
                TaskSort::Title => sql.push_str(" ORDER BY title COLLATE NOCASE ASC, rowid ASC"),
            }

            if let Some(limit) = filter.limit {
                param_values.push(Box::new(limit));
                sql.push_str(&format!(" LIMIT ?{}", param_values.len()));
            }

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn.prepare(&sql).to_db()?;
            let tasks = stmt
                .query_map(params_ref.as_slice(), row_to_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(tasks)
        })
    }

    pub fn update_task_sync(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let mut sets = vec!["updated_at = ?1".to_string()];
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

            if let Some(ref title) = update.title {
                param_values.push(Box::new(title.clone()));
                sets.push(format!("title = ?{}", param_values.len()));
            }
            if let Some(ref description) = update.description {
                param_values.push(Box::new(description.clone()));
                sets.push(format!("description = ?{}", param_values.len()));
            }
            if let Some(ref category_id) = update.category_id {
                param_values.push(Box::new(category_id.clone()));
                sets.push(format!("category_id = ?{}", param_values.len()));
            }
            if let Some(ref tag_id) = update.tag_id {
                param_values.push(Box::new(tag_id.clone()));
                sets.push(format!("tag_id = ?{}", param_values.len()));
            }

            param_values.push(Box::new(id.to_string()));
            let id_param = param_values.len();

            let sql = format!(
                "UPDATE tasks SET {} WHERE id = ?{}",
                sets.join(", "),
                id_param
            );

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let changed = conn.execute(&sql, params_ref.as_slice()).to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }

            conn.query_row(
                "SELECT * FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .to_db()
        })
    }

    pub fn delete_task_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }
}
