use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use docket_core::attachment::Attachment;
use docket_core::category::{Category, CreateCategory, UpdateCategory};
use docket_core::tag::{CreateTag, Tag, UpdateTag};
use docket_core::task::{CreateTask, Task, TaskFilter, UpdateTask};
use docket_db::{Database, DbError};
use docket_store::LocalStore;

use crate::archive::{self, ArchiveImporter, EXPORT_FILE_NAME};
use crate::attachments::{AttachmentStore, Download, Upload};
use crate::render::{PageRasterizer, RenderPolicy};
use crate::{ArchiveFile, SavedTask, ServiceError, TaskService, UploadFailure};

/// Local implementation backed by a `Database` and the local storage root.
pub struct LocalService {
    db: Arc<dyn Database>,
    attachments: Arc<AttachmentStore>,
    importer: ArchiveImporter,
}

impl LocalService {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<LocalStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        policy: RenderPolicy,
    ) -> Self {
        let attachments = Arc::new(AttachmentStore::new(db.clone(), store, rasterizer, policy));
        let importer = ArchiveImporter::new(db.clone(), attachments.clone());
        Self {
            db,
            attachments,
            importer,
        }
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// A referenced category or tag must exist; a dangling id is bad input.
    async fn check_refs(
        &self,
        category_id: Option<&str>,
        tag_id: Option<&str>,
    ) -> Result<(), ServiceError> {
        if let Some(id) = category_id {
            self.db.get_category(id).await.map_err(|e| match e {
                DbError::NotFound(_) => ServiceError::InvalidInput(format!("unknown category {id}")),
                other => other.into(),
            })?;
        }
        if let Some(id) = tag_id {
            self.db.get_tag(id).await.map_err(|e| match e {
                DbError::NotFound(_) => ServiceError::InvalidInput(format!("unknown tag {id}")),
                other => other.into(),
            })?;
        }
        Ok(())
    }

    async fn attach(&self, task: Task, uploads: Vec<Upload>) -> Result<SavedTask, ServiceError> {
        let mut failures = Vec::new();
        for (file_name, result) in self.attachments.save_attachments(uploads, &task.id).await {
            if let Err(e) = result {
                failures.push(UploadFailure {
                    file_name,
                    error: ServiceError::from(e).to_string(),
                });
            }
        }
        let attachments = self.db.list_attachments(&task.id).await?;
        Ok(SavedTask {
            task,
            attachments,
            failures,
        })
    }
}

#[async_trait]
impl TaskService for LocalService {
    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.db.list_categories().await?)
    }

    async fn get_category(&self, id: &str) -> Result<Category, ServiceError> {
        Ok(self.db.get_category(id).await?)
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Category, ServiceError> {
        self.db
            .find_category_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("category {name}")))
    }

    async fn create_category(&self, input: &CreateCategory) -> Result<Category, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput("name must not be empty".into()));
        }
        Ok(self.db.create_category(input).await?)
    }

    async fn update_category(
        &self,
        id: &str,
        update: &UpdateCategory,
    ) -> Result<Category, ServiceError> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::InvalidInput("name must not be empty".into()));
        }
        Ok(self.db.update_category(id, update).await?)
    }

    async fn delete_category(&self, id: &str) -> Result<(), ServiceError> {
        Ok(self.db.delete_category(id).await?)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ServiceError> {
        Ok(self.db.list_tags().await?)
    }

    async fn get_tag(&self, id: &str) -> Result<Tag, ServiceError> {
        Ok(self.db.get_tag(id).await?)
    }

    async fn find_tag_by_name(&self, name: &str) -> Result<Tag, ServiceError> {
        self.db
            .find_tag_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("tag {name}")))
    }

    async fn create_tag(&self, input: &CreateTag) -> Result<Tag, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput("name must not be empty".into()));
        }
        Ok(self.db.create_tag(input).await?)
    }

    async fn update_tag(&self, id: &str, update: &UpdateTag) -> Result<Tag, ServiceError> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::InvalidInput("name must not be empty".into()));
        }
        Ok(self.db.update_tag(id, update).await?)
    }

    async fn delete_tag(&self, id: &str) -> Result<(), ServiceError> {
        Ok(self.db.delete_tag(id).await?)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ServiceError> {
        Ok(self.db.list_tasks(filter).await?)
    }

    async fn search_tasks(&self, title: &str) -> Result<Vec<Task>, ServiceError> {
        let filter = TaskFilter {
            title: Some(title.to_string()),
            ..Default::default()
        };
        Ok(self.db.list_tasks(&filter).await?)
    }

    async fn get_task(&self, id: &str) -> Result<Task, ServiceError> {
        Ok(self.db.get_task(id).await?)
    }

    async fn create_task(
        &self,
        input: &CreateTask,
        uploads: Vec<Upload>,
    ) -> Result<SavedTask, ServiceError> {
        input.validate()?;
        self.check_refs(input.category_id.as_deref(), input.tag_id.as_deref())
            .await?;
        let task = self.db.create_task(input).await?;
        info!(task_id = %task.id, title = %task.title, files = uploads.len(), "created task");
        self.attach(task, uploads).await
    }

    async fn update_task(
        &self,
        id: &str,
        update: &UpdateTask,
        uploads: Vec<Upload>,
    ) -> Result<SavedTask, ServiceError> {
        update.validate()?;
        self.check_refs(
            update.category_id.as_ref().and_then(|c| c.as_deref()),
            update.tag_id.as_ref().and_then(|t| t.as_deref()),
        )
        .await?;
        let task = self.db.update_task(id, update).await?;
        self.attach(task, uploads).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.db.get_task(id).await?;
        self.attachments.purge_task_files(id).await;
        self.db.delete_task(id).await?;
        info!(task_id = id, "deleted task");
        Ok(())
    }

    async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, ServiceError> {
        self.db.get_task(task_id).await?;
        Ok(self.attachments.list_attachments(task_id).await?)
    }

    async fn get_attachment(&self, id: &str) -> Result<Attachment, ServiceError> {
        self.attachments
            .find_attachment(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("attachment {id}")))
    }

    async fn download_attachment(&self, id: &str) -> Result<Download, ServiceError> {
        let attachment = self.get_attachment(id).await?;
        Ok(self.attachments.resolve_download(&attachment).await?)
    }

    async fn export_task(&self, id: &str) -> Result<ArchiveFile, ServiceError> {
        let task = self.db.get_task(id).await?;
        let category = match task.category_id.as_deref() {
            Some(cid) => Some(self.db.get_category(cid).await?),
            None => None,
        };
        let tag = match task.tag_id.as_deref() {
            Some(tid) => Some(self.db.get_tag(tid).await?),
            None => None,
        };
        let attachments = self.attachments.list_attachments(id).await?;

        let file = tokio::task::spawn_blocking(move || {
            let spool = tempfile::tempfile().map_err(archive::ArchiveError::from)?;
            let mut file = archive::export_task(
                &task,
                category.as_ref(),
                tag.as_ref(),
                &attachments,
                spool,
            )?;
            file.seek(SeekFrom::Start(0))
                .map_err(archive::ArchiveError::from)?;
            Ok::<_, archive::ArchiveError>(file)
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("export task: {e}")))??;

        let len = file
            .metadata()
            .map_err(|e| ServiceError::Storage(e.to_string()))?
            .len();
        info!(task_id = id, bytes = len, "exported task");
        Ok(ArchiveFile {
            file_name: EXPORT_FILE_NAME.to_string(),
            file: tokio::fs::File::from_std(file),
            len,
        })
    }

    async fn import_archive(&self, archive: std::fs::File) -> Result<Task, ServiceError> {
        Ok(self.importer.import_archive(archive).await?)
    }
}
