use async_trait::async_trait;
use docket_core::attachment::Attachment;
use docket_core::category::{Category, CreateCategory, UpdateCategory};
use docket_core::tag::{CreateTag, Tag, UpdateTag};
use docket_core::task::{CreateTask, Task, TaskFilter, UpdateTask};
use docket_core::DocketError;
use docket_db::DbError;
use docket_store::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::attachments::{AttachmentError, Download, Upload};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid archive: {0}")]
    ArchiveFormat(String),

    #[error("derivation failed: {0}")]
    Derivation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            DbError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<DocketError> for ServiceError {
    fn from(e: DocketError) -> Self {
        match e {
            DocketError::NotFound(msg) => ServiceError::NotFound(msg),
            DocketError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            DocketError::Database(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::InvalidPath(msg) => ServiceError::InvalidInput(msg),
            StoreError::Internal(msg) => ServiceError::Storage(msg),
        }
    }
}

impl From<AttachmentError> for ServiceError {
    fn from(e: AttachmentError) -> Self {
        match e {
            AttachmentError::NotFound(msg) => ServiceError::NotFound(msg),
            AttachmentError::InvalidName(msg) => {
                ServiceError::InvalidInput(format!("invalid file name: {msg}"))
            }
            AttachmentError::Storage(msg) => ServiceError::Storage(msg),
            AttachmentError::Derivation(e) => ServiceError::Derivation(e.to_string()),
            AttachmentError::Internal(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<ArchiveError> for ServiceError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::Format(msg) => ServiceError::ArchiveFormat(msg),
            ArchiveError::Attachment(e) => e.into(),
            ArchiveError::Io(e) => ServiceError::Storage(e.to_string()),
            ArchiveError::Db(e) => e.into(),
        }
    }
}

/// A file that could not be attached, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub file_name: String,
    pub error: String,
}

/// Result of creating or updating a task together with uploads. Files
/// fail independently, so a saved task may come with failures.
#[derive(Debug, Clone, Serialize)]
pub struct SavedTask {
    pub task: Task,
    pub attachments: Vec<Attachment>,
    pub failures: Vec<UploadFailure>,
}

/// A zip spooled to a temp file, ready to stream.
#[derive(Debug)]
pub struct ArchiveFile {
    pub file_name: String,
    pub file: tokio::fs::File,
    pub len: u64,
}

/// Abstraction over task, category, tag and attachment operations.
///
/// The HTTP routes program against this trait; `LocalService` implements
/// it over a `Database` and the local storage root.
#[async_trait]
pub trait TaskService: Send + Sync {
    // -- Categories --
    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError>;
    async fn get_category(&self, id: &str) -> Result<Category, ServiceError>;
    async fn find_category_by_name(&self, name: &str) -> Result<Category, ServiceError>;
    async fn create_category(&self, input: &CreateCategory) -> Result<Category, ServiceError>;
    async fn update_category(
        &self,
        id: &str,
        update: &UpdateCategory,
    ) -> Result<Category, ServiceError>;
    async fn delete_category(&self, id: &str) -> Result<(), ServiceError>;

    // -- Tags --
    async fn list_tags(&self) -> Result<Vec<Tag>, ServiceError>;
    async fn get_tag(&self, id: &str) -> Result<Tag, ServiceError>;
    async fn find_tag_by_name(&self, name: &str) -> Result<Tag, ServiceError>;
    async fn create_tag(&self, input: &CreateTag) -> Result<Tag, ServiceError>;
    async fn update_tag(&self, id: &str, update: &UpdateTag) -> Result<Tag, ServiceError>;
    async fn delete_tag(&self, id: &str) -> Result<(), ServiceError>;

    // -- Tasks --
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ServiceError>;
    async fn search_tasks(&self, title: &str) -> Result<Vec<Task>, ServiceError>;
    async fn get_task(&self, id: &str) -> Result<Task, ServiceError>;
    async fn create_task(
        &self,
        input: &CreateTask,
        uploads: Vec<Upload>,
    ) -> Result<SavedTask, ServiceError>;
    async fn update_task(
        &self,
        id: &str,
        update: &UpdateTask,
        uploads: Vec<Upload>,
    ) -> Result<SavedTask, ServiceError>;
    async fn delete_task(&self, id: &str) -> Result<(), ServiceError>;

    // -- Attachments --
    async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, ServiceError>;
    async fn get_attachment(&self, id: &str) -> Result<Attachment, ServiceError>;
    async fn download_attachment(&self, id: &str) -> Result<Download, ServiceError>;

    // -- Archives --
    async fn export_task(&self, id: &str) -> Result<ArchiveFile, ServiceError>;
    async fn import_archive(&self, archive: std::fs::File) -> Result<Task, ServiceError>;
}
