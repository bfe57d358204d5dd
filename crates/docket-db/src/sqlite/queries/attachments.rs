use chrono::Utc;
use rusqlite::{params, Row};

use docket_core::attachment::{Attachment, NewAttachment};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        storage_path: row.get("storage_path")?,
        media_type: row.get("media_type")?,
        derived_from_id: row.get("derived_from_id")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_attachment_sync(&self, input: &NewAttachment) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO attachments (id, task_id, storage_path, media_type, derived_from_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    input.task_id,
                    input.storage_path,
                    input.media_type,
                    input.derived_from_id,
                    now,
                ],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .to_db()
        })
    }

    pub fn set_derived_from_sync(
        &self,
        id: &str,
        derived_from_id: &str,
    ) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE attachments SET derived_from_id = ?1 WHERE id = ?2",
                    params![derived_from_id, id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("attachment {id}")));
            }
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .to_db()
        })
    }

    pub fn list_attachments_sync(&self, task_id: &str) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments WHERE task_id = ?1
                     ORDER BY rowid ASC",
                )
                .to_db()?;
            let attachments = stmt
                .query_map(params![task_id], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    pub fn list_derived_attachments_sync(
        &self,
        derived_from_id: &str,
    ) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments WHERE derived_from_id = ?1
                     ORDER BY rowid ASC",
                )
                .to_db()?;
            let attachments = stmt
                .query_map(params![derived_from_id], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    pub fn get_attachment_sync(&self, id: &str) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .map_err(|e| not_found_or(e, format!("attachment {id}")))
        })
    }

    pub fn delete_attachment_sync(&self, id: &str) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            let attachment = conn
                .query_row(
                    "SELECT * FROM attachments WHERE id = ?1",
                    params![id],
                    row_to_attachment,
                )
                .map_err(|e| not_found_or(e, format!("attachment {id}")))?;
            conn.execute("DELETE FROM attachments WHERE id = ?1", params![id])
                .to_db()?;
            Ok(attachment)
        })
    }

    pub fn count_attachments_by_path_sync(
        &self,
        storage_path: &str,
        exclude_task_id: &str,
    ) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM attachments WHERE storage_path = ?1 AND task_id != ?2",
                params![storage_path, exclude_task_id],
                |row| row.get(0),
            )
            .to_db()
        })
    }
}
