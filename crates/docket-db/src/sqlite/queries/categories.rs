use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use docket_core::category::{Category, CreateCategory, UpdateCategory};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_category_sync(&self, input: &CreateCategory) -> Result<Category, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO categories (id, name, description, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, input.name, input.description, now],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .to_db()
        })
    }

    pub fn get_category_sync(&self, id: &str) -> Result<Category, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .map_err(|e| not_found_or(e, format!("category {id}")))
        })
    }

    pub fn find_category_by_name_sync(&self, name: &str) -> Result<Option<Category>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM categories WHERE name = ?1",
                params![name],
                row_to_category,
            )
            .optional()
            .to_db()
        })
    }

    pub fn list_categories_sync(&self) -> Result<Vec<Category>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM categories ORDER BY name")
                .to_db()?;
            let categories = stmt
                .query_map([], row_to_category)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(categories)
        })
    }

    pub fn update_category_sync(
        &self,
        id: &str,
        update: &UpdateCategory,
    ) -> Result<Category, DbError> {
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
                    "UPDATE categories SET {} WHERE id = ?{}",
                    sets.join(", "),
                    values.len()
                );
                let params_ref: Vec<&dyn rusqlite::ToSql> =
                    values.iter().map(|v| v.as_ref()).collect();
                let changed = conn.execute(&sql, params_ref.as_slice()).to_db()?;
                if changed == 0 {
                    return Err(DbError::NotFound(format!("category {id}")));
                }
            }

            conn.query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .map_err(|e| not_found_or(e, format!("category {id}")))
        })
    }

    pub fn delete_category_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM categories WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("category {id}")));
            }
            Ok(())
        })
    }
}
