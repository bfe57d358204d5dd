use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use docket_core::tag::{CreateTag, Tag, UpdateTag};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_tag_sync(&self, input: &CreateTag) -> Result<Tag, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tags (id, name, description, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, input.name, input.description, now],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM tags WHERE id = ?1",
                params![id],
                row_to_tag,
            )
            .to_db()
        })
    }

    pub fn get_tag_sync(&self, id: &str) -> Result<Tag, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM tags WHERE id = ?1",
                params![id],
                row_to_tag,
            )
            .map_err(|e| not_found_or(e, format!("tag {id}")))
        })
    }

    pub fn find_tag_by_name_sync(&self, name: &str) -> Result<Option<Tag>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM tags WHERE name = ?1",
                params![name],
                row_to_tag,
            )
            .optional()
            .to_db()
        })
    }

    pub fn list_tags_sync(&self) -> Result<Vec<Tag>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM tags ORDER BY name")
                .to_db()?;
            let tags = stmt
                .query_map([], row_to_tag)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(tags)
        })
    }

    pub fn update_tag_sync(
        &self,
        id: &str,
        update: &UpdateTag,
    ) -> Result<Tag, DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref name) = update.name {
                values.push(Box::new(name.clone()));
                sets.push(format!("name = ?{}", values.len()));
            }
            if let Some(ref description) = update.description {
                values.push(Box::new(description.clone()));
                sets.push(format!("description = ?{}", values.len()));
            }

            if !sets.is_empty() {
                values.push(Box::new(id.to_string()));
                let sql = format!(
                    "UPDATE tags SET {} WHERE id = ?{}",
                    sets.join(", "),
                    values.len()
                );
                let params_ref: Vec<&dyn rusqlite::ToSql> =
                    values.iter().map(|v| v.as_ref()).collect();
                let changed = conn.execute(&sql, params_ref.as_slice()).to_db()?;
                if changed == 0 {
                    return Err(DbError::NotFound(format!("tag {id}")));
                }
            }

            conn.query_row(
                "SELECT * FROM tags WHERE id = ?1",
                params![id],
                row_to_tag,
            )
            .map_err(|e| not_found_or(e, format!("tag {id}")))
        })
    }

    pub fn delete_tag_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM tags WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("tag {id}")));
            }
            Ok(())
        })
    }
}
