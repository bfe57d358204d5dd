pub(crate) mod migrations;
mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use docket_core::attachment::{Attachment, NewAttachment};
use docket_core::category::{Category, CreateCategory, UpdateCategory};
use docket_core::tag::{CreateTag, Tag, UpdateTag};
use docket_core::task::{CreateTask, Task, TaskFilter, UpdateTask};

use crate::{Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
///
/// Calling `.to_db()?` is the shortest way to map rusqlite errors inside the
/// query modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("docket.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        tracing::info!(path = %path.display(), "opened sqlite database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }

    /// Run a `*_sync` query on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError`. Unique violations become `Conflict`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, ref msg)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            DbError::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        other => DbError::Internal(other.to_string()),
    }
}

/// Map a single-row lookup error, turning "no rows" into `NotFound(what)`.
pub(crate) fn not_found_or(e: rusqlite::Error, what: String) -> DbError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what),
        other => map_sqlite_err(other),
    }
}


#[async_trait]
impl Database for SqliteDatabase {
    // -- Categories --
    async fn create_category(&self, input: &CreateCategory) -> Result<Category, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_category_sync(&input)).await
    }
    async fn get_category(&self, id: &str) -> Result<Category, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_category_sync(&id)).await
    }
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, DbError> {
        let name = name.to_string();
        self.blocking(move |db| db.find_category_by_name_sync(&name)).await
    }
    async fn list_categories(&self) -> Result<Vec<Category>, DbError> {
        self.blocking(|db| db.list_categories_sync()).await
    }
    async fn update_category(
        &self,
        id: &str,
        update: &UpdateCategory,
    ) -> Result<Category, DbError> {
        let id = id.to_string();
        let update = update.clone();
        self.blocking(move |db| db.update_category_sync(&id, &update))
            .await
    }
    async fn delete_category(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_category_sync(&id)).await
    }

    // -- Tags --
    async fn create_tag(&self, input: &CreateTag) -> Result<Tag, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_tag_sync(&input)).await
    }
    async fn get_tag(&self, id: &str) -> Result<Tag, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_tag_sync(&id)).await
    }
    async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>, DbError> {
        let name = name.to_string();
        self.blocking(move |db| db.find_tag_by_name_sync(&name)).await
    }
    async fn list_tags(&self) -> Result<Vec<Tag>, DbError> {
        self.blocking(|db| db.list_tags_sync()).await
    }
    async fn update_tag(&self, id: &str, update: &UpdateTag) -> Result<Tag, DbError> {
        let id = id.to_string();
        let update = update.clone();
        self.blocking(move |db| db.update_tag_sync(&id, &update)).await
    }
    async fn delete_tag(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_tag_sync(&id)).await
    }

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_task_sync(&input)).await
    }
    async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_task_sync(&id)).await
    }
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        let filter = filter.clone();
        self.blocking(move |db| db.list_tasks_sync(&filter)).await
    }
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        let id = id.to_string();
        let update = update.clone();
        self.blocking(move |db| db.update_task_sync(&id, &update)).await
    }
    async fn delete_task(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_task_sync(&id)).await
    }

    // -- Attachments --
    async fn create_attachment(&self, input: &NewAttachment) -> Result<Attachment, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_attachment_sync(&input)).await
    }
    async fn set_derived_from(
        &self,
        id: &str,
        derived_from_id: &str,
    ) -> Result<Attachment, DbError> {
        let id = id.to_string();
        let derived_from_id = derived_from_id.to_string();
        self.blocking(move |db| db.set_derived_from_sync(&id, &derived_from_id))
            .await
    }
    async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_attachment_sync(&id)).await
    }
    async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, DbError> {
        let task_id = task_id.to_string();
        self.blocking(move |db| db.list_attachments_sync(&task_id)).await
    }
    async fn list_derived_attachments(
        &self,
        derived_from_id: &str,
    ) -> Result<Vec<Attachment>, DbError> {
        let derived_from_id = derived_from_id.to_string();
        self.blocking(move |db| db.list_derived_attachments_sync(&derived_from_id))
            .await
    }
    async fn delete_attachment(&self, id: &str) -> Result<Attachment, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_attachment_sync(&id)).await
    }
    async fn count_attachments_by_path(
        &self,
        storage_path: &str,
        exclude_task_id: &str,
    ) -> Result<i64, DbError> {
        let storage_path = storage_path.to_string();
        let exclude_task_id = exclude_task_id.to_string();
        self.blocking(move |db| db.count_attachments_by_path_sync(&storage_path, &exclude_task_id))
            .await
    }
}
