mod sqlite;

pub use sqlite::SqliteDatabase;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use docket_core::attachment::{Attachment, NewAttachment};
use docket_core::category::{Category, CreateCategory, UpdateCategory};
use docket_core::tag::{CreateTag, Tag, UpdateTag};
use docket_core::task::{CreateTask, Task, TaskFilter, UpdateTask};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Record store for tasks, their categories and tags, and attachment metadata.
///
/// Ordering of every attachment listing is insertion order; page images
/// rely on it to come back in page order.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Categories --
    async fn create_category(&self, input: &CreateCategory) -> Result<Category, DbError>;
    async fn get_category(&self, id: &str) -> Result<Category, DbError>;
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, DbError>;
    async fn list_categories(&self) -> Result<Vec<Category>, DbError>;
    async fn update_category(
        &self,
        id: &str,
        update: &UpdateCategory,
    ) -> Result<Category, DbError>;
    async fn delete_category(&self, id: &str) -> Result<(), DbError>;

    // -- Tags --
    async fn create_tag(&self, input: &CreateTag) -> Result<Tag, DbError>;
    async fn get_tag(&self, id: &str) -> Result<Tag, DbError>;
    async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>, DbError>;
    async fn list_tags(&self) -> Result<Vec<Tag>, DbError>;
    async fn update_tag(&self, id: &str, update: &UpdateTag) -> Result<Tag, DbError>;
    async fn delete_tag(&self, id: &str) -> Result<(), DbError>;

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError>;
    async fn get_task(&self, id: &str) -> Result<Task, DbError>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError>;
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError>;
    async fn delete_task(&self, id: &str) -> Result<(), DbError>;

    // -- Attachments --
    async fn create_attachment(&self, input: &NewAttachment) -> Result<Attachment, DbError>;
    /// Second phase of creating an original upload: point it at its own id.
    async fn set_derived_from(
        &self,
        id: &str,
        derived_from_id: &str,
    ) -> Result<Attachment, DbError>;
    async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError>;
    async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, DbError>;
    async fn list_derived_attachments(
        &self,
        derived_from_id: &str,
    ) -> Result<Vec<Attachment>, DbError>;
    async fn delete_attachment(&self, id: &str) -> Result<Attachment, DbError>;
    /// Attachments outside `exclude_task_id` whose bytes live at `storage_path`.
    async fn count_attachments_by_path(
        &self,
        storage_path: &str,
        exclude_task_id: &str,
    ) -> Result<i64, DbError>;
}

/// Configuration for the record store.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Path to the SQLite file. Defaults to `<data_dir>/docket.db`.
    pub sqlite_path: Option<String>,
}

/// Base directory for docket's own files (`$XDG_DATA_HOME/docket`).
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("docket")
}
