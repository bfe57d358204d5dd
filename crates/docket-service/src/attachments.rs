use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use docket_core::attachment::{Attachment, NewAttachment};
use docket_core::file_name::{base_name, converted_zip_name, page_file_name, sanitize_file_name};
use docket_core::media;
use docket_db::{Database, DbError};
use docket_store::{LocalStore, ObjectStore, StoreError};

use crate::render::{PageRasterizer, RenderError, RenderPolicy};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("derivation failed: {0}")]
    Derivation(#[from] RenderError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for AttachmentError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => AttachmentError::NotFound(msg),
            other => AttachmentError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for AttachmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => AttachmentError::NotFound(msg),
            StoreError::InvalidPath(msg) => AttachmentError::InvalidName(msg),
            StoreError::Internal(msg) => AttachmentError::Storage(msg),
        }
    }
}

impl From<std::io::Error> for AttachmentError {
    fn from(e: std::io::Error) -> Self {
        AttachmentError::Storage(e.to_string())
    }
}

/// One uploaded file: the client's name and media type plus its bytes.
pub struct Upload {
    pub file_name: String,
    pub media_type: String,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl Upload {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            reader: Box::new(reader),
        }
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(file_name, media_type, std::io::Cursor::new(bytes.into()))
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .finish_non_exhaustive()
    }
}

/// Body of an attachment download.
#[derive(Debug)]
pub enum Download {
    /// Page images of a PDF, zipped into a temp file.
    Zip {
        file_name: String,
        file: tokio::fs::File,
        len: u64,
    },
    /// The stored bytes, as is.
    File {
        file_name: String,
        media_type: String,
        file: tokio::fs::File,
        len: u64,
    },
}

impl Download {
    pub fn file_name(&self) -> &str {
        match self {
            Download::Zip { file_name, .. } | Download::File { file_name, .. } => file_name,
        }
    }

    pub fn media_type(&self) -> &str {
        match self {
            Download::Zip { .. } => media::ZIP,
            Download::File { media_type, .. } => media_type,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            Download::Zip { len, .. } | Download::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_file(self) -> tokio::fs::File {
        match self {
            Download::Zip { file, .. } | Download::File { file, .. } => file,
        }
    }
}

/// Maps uploaded bytes to files under the storage root and keeps the
/// attachment records, including PDF page derivations, in step with them.
pub struct AttachmentStore {
    db: Arc<dyn Database>,
    store: Arc<LocalStore>,
    rasterizer: Arc<dyn PageRasterizer>,
    policy: RenderPolicy,
}

impl AttachmentStore {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<LocalStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        policy: RenderPolicy,
    ) -> Self {
        Self {
            db,
            store,
            rasterizer,
            policy,
        }
    }

    /// Store one upload for `task_id` and return its root record.
    ///
    /// PDFs are not written themselves; each rendered page is stored as
    /// `<base>-page-<i>.png` with its own record pointing back at the PDF.
    pub async fn save_attachment(
        &self,
        mut upload: Upload,
        task_id: &str,
    ) -> Result<Attachment, AttachmentError> {
        let name = sanitize_file_name(&upload.file_name)
            .ok_or_else(|| AttachmentError::InvalidName(upload.file_name.clone()))?;
        self.db.get_task(task_id).await?;
        let path = self.store.resolve(&name)?;
        let media_type = if upload.media_type.trim().is_empty() {
            media::OCTET_STREAM.to_string()
        } else {
            upload.media_type.clone()
        };

        let record = self
            .db
            .create_attachment(&NewAttachment {
                task_id: task_id.to_string(),
                storage_path: path.to_string_lossy().to_string(),
                media_type,
                derived_from_id: None,
            })
            .await?;
        let record = self.db.set_derived_from(&record.id, &record.id).await?;

        if record.is_pdf() {
            let mut pdf = Vec::new();
            upload.reader.read_to_end(&mut pdf).await?;
            let pages = self.derive_pages(&record, &name, pdf).await?;
            info!(
                task_id,
                attachment_id = %record.id,
                file = %name,
                pages,
                "saved pdf attachment"
            );
        } else {
            let written = self.store.write_stream(&name, &mut upload.reader).await?;
            info!(
                task_id,
                attachment_id = %record.id,
                file = %name,
                bytes = written,
                "saved attachment"
            );
        }
        Ok(record)
    }

    /// Render `pdf` and store one PNG record per page. Returns the page count.
    async fn derive_pages(
        &self,
        pdf_record: &Attachment,
        pdf_name: &str,
        pdf: Vec<u8>,
    ) -> Result<usize, AttachmentError> {
        let rasterizer = self.rasterizer.clone();
        let rendered = tokio::task::spawn_blocking(move || rasterizer.render(&pdf))
            .await
            .map_err(|e| AttachmentError::Internal(format!("render task: {e}")))?;

        let pages = match rendered {
            Ok(pages) => pages,
            Err(e) => match self.policy {
                RenderPolicy::Lenient => {
                    warn!(
                        attachment_id = %pdf_record.id,
                        file = pdf_name,
                        error = %e,
                        "pdf rendering failed, keeping pdf without page images"
                    );
                    return Ok(0);
                }
                RenderPolicy::Strict => {
                    if let Err(del) = self.db.delete_attachment(&pdf_record.id).await {
                        warn!(attachment_id = %pdf_record.id, error = %del, "could not remove pdf record");
                    }
                    return Err(AttachmentError::Derivation(e));
                }
            },
        };

        let base = base_name(pdf_name);
        let count = pages.len();
        for (index, png) in pages.into_iter().enumerate() {
            let page_name = page_file_name(base, index);
            let page_path = self.store.resolve(&page_name)?;
            self.store.put(&page_name, Bytes::from(png)).await?;
            let page = self
                .db
                .create_attachment(&NewAttachment {
                    task_id: pdf_record.task_id.clone(),
                    storage_path: page_path.to_string_lossy().to_string(),
                    media_type: media::PNG.to_string(),
                    derived_from_id: Some(pdf_record.id.clone()),
                })
                .await?;
            debug!(attachment_id = %page.id, file = %page_name, "stored pdf page");
        }
        Ok(count)
    }

    /// Save several uploads; one failing file does not affect the others.
    pub async fn save_attachments(
        &self,
        uploads: Vec<Upload>,
        task_id: &str,
    ) -> Vec<(String, Result<Attachment, AttachmentError>)> {
        let mut results = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let name = upload.file_name.clone();
            let result = self.save_attachment(upload, task_id).await;
            if let Err(ref e) = result {
                warn!(task_id, file = %name, error = %e, "attachment upload failed");
            }
            results.push((name, result));
        }
        results
    }

    /// Open a stored file by leaf name.
    pub async fn load_attachment_bytes(
        &self,
        file_name: &str,
    ) -> Result<tokio::fs::File, AttachmentError> {
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| AttachmentError::InvalidName(file_name.to_string()))?;
        Ok(self.store.open_file(&name).await?)
    }

    pub async fn list_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, AttachmentError> {
        Ok(self.db.list_attachments(task_id).await?)
    }

    pub async fn find_attachment(&self, id: &str) -> Result<Option<Attachment>, AttachmentError> {
        match self.db.get_attachment(id).await {
            Ok(a) => Ok(Some(a)),
            Err(DbError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Page images rendered from the PDF `pdf_id`, in page order.
    pub async fn derived_images(&self, pdf_id: &str) -> Result<Vec<Attachment>, AttachmentError> {
        let derived = self.db.list_derived_attachments(pdf_id).await?;
        Ok(derived
            .into_iter()
            .filter(|a| a.id != pdf_id && !a.is_pdf())
            .collect())
    }

    pub async fn resolve_download(&self, attachment: &Attachment) -> Result<Download, AttachmentError> {
        if attachment.is_pdf() {
            let images = self.derived_images(&attachment.id).await?;
            let paths: Vec<(String, String)> = images
                .iter()
                .map(|a| (a.file_name(), a.storage_path.clone()))
                .collect();
            let spooled = tokio::task::spawn_blocking(move || zip_files(&paths))
                .await
                .map_err(|e| AttachmentError::Internal(format!("zip task: {e}")))??;
            let len = spooled.metadata()?.len();
            return Ok(Download::Zip {
                file_name: converted_zip_name(&attachment.file_name()),
                file: tokio::fs::File::from_std(spooled),
                len,
            });
        }

        let file = self
            .store
            .open_path(Path::new(&attachment.storage_path))
            .await?;
        let len = file.metadata().await?.len();
        Ok(Download::File {
            file_name: attachment.file_name(),
            media_type: attachment.media_type.clone(),
            file,
            len,
        })
    }

    /// Remove the stored bytes of every attachment of `task_id`.
    ///
    /// Files another task's records still point at are kept. Failures are
    /// logged and skipped; the records go with the task.
    pub async fn purge_task_files(&self, task_id: &str) {
        let attachments = match self.db.list_attachments(task_id).await {
            Ok(list) => list,
            Err(e) => {
                warn!(task_id, error = %e, "could not list attachments to purge");
                return;
            }
        };
        for attachment in attachments {
            // pdf bytes are never written, only their pages
            if attachment.is_pdf() {
                continue;
            }
            match self
                .db
                .count_attachments_by_path(&attachment.storage_path, task_id)
                .await
            {
                Ok(0) => {}
                Ok(users) => {
                    debug!(
                        task_id,
                        path = %attachment.storage_path,
                        users,
                        "file still used by another task, keeping it"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        task_id,
                        path = %attachment.storage_path,
                        error = %e,
                        "could not check file references, keeping it"
                    );
                    continue;
                }
            }
            if let Err(e) = self
                .store
                .remove_path(Path::new(&attachment.storage_path))
                .await
            {
                warn!(
                    task_id,
                    attachment_id = %attachment.id,
                    path = %attachment.storage_path,
                    error = %e,
                    "could not remove attachment file"
                );
            }
        }
    }
}

/// Write `(entry name, path)` pairs into an anonymous temp file as a zip,
/// rewound and ready to stream.
fn zip_files(entries: &[(String, String)]) -> Result<std::fs::File, AttachmentError> {
    let mut zip = ZipWriter::new(tempfile::tempfile()?);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, path) in entries {
        let mut source = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AttachmentError::NotFound(path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        zip.start_file(name.as_str(), options)
            .map_err(|e| AttachmentError::Storage(format!("zip entry {name}: {e}")))?;
        std::io::copy(&mut source, &mut zip)?;
    }
    let mut file = zip
        .finish()
        .map_err(|e| AttachmentError::Storage(format!("zip finish: {e}")))?;
    file.flush()?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}
