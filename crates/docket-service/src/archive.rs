//! Task archives: one zip holding `<title>.json` followed by the task's files.

use std::collections::HashSet;
use std::io::{Read, Seek, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use docket_core::attachment::Attachment;
use docket_core::category::Category;
use docket_core::file_name::sanitize_file_name;
use docket_core::media;
use docket_core::tag::Tag;
use docket_core::task::{CreateTask, Task};
use docket_db::{Database, DbError};

use crate::attachments::{AttachmentError, AttachmentStore, Upload};

/// Name of the archive served by the export endpoint.
pub const EXPORT_FILE_NAME: &str = "task.zip";

/// Upper bound on the task document; anything larger is not a task.
const MAX_DOCUMENT_BYTES: u64 = 1024 * 1024;

/// Bytes handed to content sniffing when guessing an entry's media type.
const SNIFF_BYTES: u64 = 8192;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive: {0}")]
    Format(String),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

impl From<ZipError> for ArchiveError {
    fn from(e: ZipError) -> Self {
        match e {
            ZipError::Io(io) => ArchiveError::Io(io),
            other => ArchiveError::Format(other.to_string()),
        }
    }
}

/// The JSON document at the head of an archive.
///
/// `id` is written for reference but never read back: importing always
/// creates a new task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    #[serde(skip_deserializing)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub tag: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_pages: Option<Vec<PdfPage>>,
}

/// A category or tag, referenced by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfPage {
    pub name_page: String,
}

impl TaskDocument {
    pub fn new(
        task: &Task,
        category: Option<&Category>,
        tag: Option<&Tag>,
        attachments: &[Attachment],
    ) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            creation_date: task.created_at.to_rfc3339(),
            category: category.map(|c| NamedRef {
                name: Some(c.name.clone()),
                description: Some(c.description.clone()),
            }),
            tag: tag.map(|t| NamedRef {
                name: Some(t.name.clone()),
                description: Some(t.description.clone()),
            }),
            pdf_pages: pdf_pages(attachments),
        }
    }

    /// Entry name of the document inside the archive.
    pub fn entry_name(&self) -> String {
        sanitize_file_name(&format!("{}.json", self.title)).unwrap_or_else(|| "task.json".into())
    }

    fn category_name(&self) -> Option<&str> {
        named(&self.category)
    }

    fn tag_name(&self) -> Option<&str> {
        named(&self.tag)
    }
}

fn named(r: &Option<NamedRef>) -> Option<&str> {
    r.as_ref()
        .and_then(|r| r.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

/// Every PDF and every page rendered from one, in list order. `None` when
/// the task has no PDF at all.
fn pdf_pages(attachments: &[Attachment]) -> Option<Vec<PdfPage>> {
    let pdf_ids: HashSet<&str> = attachments
        .iter()
        .filter(|a| a.is_pdf())
        .map(|a| a.id.as_str())
        .collect();
    if pdf_ids.is_empty() {
        return None;
    }
    let pages = attachments
        .iter()
        .filter(|a| {
            a.is_pdf()
                || (a.is_derived()
                    && a.derived_from_id
                        .as_deref()
                        .is_some_and(|parent| pdf_ids.contains(parent)))
        })
        .map(|a| PdfPage {
            name_page: a.file_name(),
        })
        .collect();
    Some(pages)
}

/// Write the archive for `task` into `writer` and return the writer.
///
/// The document comes first, then the bytes of every non-PDF attachment
/// in list order. PDFs are represented by their page images.
pub fn export_task<W: Write + Seek>(
    task: &Task,
    category: Option<&Category>,
    tag: Option<&Tag>,
    attachments: &[Attachment],
    writer: W,
) -> Result<W, ArchiveError> {
    let document = TaskDocument::new(task, category, tag, attachments);
    let json = serde_json::to_vec_pretty(&document)
        .map_err(|e| ArchiveError::Format(format!("serialize task document: {e}")))?;

    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let document_name = document.entry_name();
    zip.start_file(document_name.as_str(), options)?;
    zip.write_all(&json)?;

    let mut written: HashSet<String> = HashSet::new();
    for attachment in attachments.iter().filter(|a| !a.is_pdf()) {
        let name = attachment.file_name();
        if name == document_name {
            return Err(ArchiveError::Format(format!(
                "attachment {name} collides with the task document entry"
            )));
        }
        if !written.insert(name.clone()) {
            // same leaf name means the same file on disk
            continue;
        }
        let mut source = match std::fs::File::open(&attachment.storage_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AttachmentError::NotFound(attachment.storage_path.clone()).into())
            }
            Err(e) => return Err(e.into()),
        };
        zip.start_file(name.as_str(), options)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    Ok(zip.finish()?)
}

/// A file pulled out of an archive, waiting for its task to exist.
#[derive(Debug)]
struct PendingFile {
    name: String,
    media_type: String,
    path: PathBuf,
}

#[derive(Debug)]
struct Unpacked {
    document: TaskDocument,
    files: Vec<PendingFile>,
    // Removed (with the files in it) when dropped.
    _dir: tempfile::TempDir,
}

/// Walk the whole archive before anything is created: the document is
/// parsed and every other entry is copied into a temp dir.
fn unpack<R: Read + Seek>(reader: R) -> Result<Unpacked, ArchiveError> {
    let mut archive = ZipArchive::new(reader)?;
    let dir = tempfile::tempdir()?;
    let mut document: Option<TaskDocument> = None;
    let mut files: Vec<PendingFile> = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let raw_name = entry.name().to_string();
        let name = entry
            .enclosed_name()
            .and_then(|p| sanitize_file_name(&p.to_string_lossy()))
            .ok_or_else(|| ArchiveError::Format(format!("unsafe entry name {raw_name:?}")))?;

        if document.is_none() && name.to_lowercase().ends_with(".json") {
            let mut json = Vec::new();
            (&mut entry)
                .take(MAX_DOCUMENT_BYTES + 1)
                .read_to_end(&mut json)?;
            if json.len() as u64 > MAX_DOCUMENT_BYTES {
                return Err(ArchiveError::Format(format!("{name} is too large")));
            }
            let parsed: TaskDocument = serde_json::from_slice(&json)
                .map_err(|e| ArchiveError::Format(format!("{name}: {e}")))?;
            document = Some(parsed);
            continue;
        }

        let path = dir.path().join(&name);
        let mut out = std::fs::File::create(&path)?;
        std::io::copy(&mut entry, &mut out)?;
        drop(out);

        let mut head = Vec::new();
        std::fs::File::open(&path)?
            .take(SNIFF_BYTES)
            .read_to_end(&mut head)?;
        let media_type = media::sniff_media_type(&name, &head);

        // a repeated name overwrote the earlier copy; keep one queue slot
        if let Some(existing) = files.iter_mut().find(|f| f.name == name) {
            existing.media_type = media_type;
        } else {
            files.push(PendingFile {
                name,
                media_type,
                path,
            });
        }
    }

    let document =
        document.ok_or_else(|| ArchiveError::Format("archive has no task document".into()))?;
    Ok(Unpacked {
        document,
        files,
        _dir: dir,
    })
}

/// Rebuilds tasks from archives produced by [`export_task`].
pub struct ArchiveImporter {
    db: Arc<dyn Database>,
    attachments: Arc<AttachmentStore>,
}

impl ArchiveImporter {
    pub fn new(db: Arc<dyn Database>, attachments: Arc<AttachmentStore>) -> Self {
        Self { db, attachments }
    }

    /// Create a task and its attachments from an archive.
    ///
    /// Nothing is created unless the archive contains a valid task
    /// document, and a failure while saving files removes the new task.
    pub async fn import_archive<R>(&self, reader: R) -> Result<Task, ArchiveError>
    where
        R: Read + Seek + Send + 'static,
    {
        let unpacked = tokio::task::spawn_blocking(move || unpack(reader))
            .await
            .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))??;
        let document = &unpacked.document;

        let input = CreateTask {
            title: document.title.clone(),
            description: document.description.clone(),
            category_id: self.category_id(document.category_name()).await?,
            tag_id: self.tag_id(document.tag_name()).await?,
        };
        input
            .validate()
            .map_err(|e| ArchiveError::Format(format!("task document: {e}")))?;

        let task = self.db.create_task(&input).await?;
        for file in &unpacked.files {
            if let Err(e) = self.save_pending(file, &task.id).await {
                warn!(task_id = %task.id, file = %file.name, error = %e, "import failed, removing task");
                self.attachments.purge_task_files(&task.id).await;
                if let Err(del) = self.db.delete_task(&task.id).await {
                    warn!(task_id = %task.id, error = %del, "could not remove partially imported task");
                }
                return Err(e);
            }
        }

        info!(
            task_id = %task.id,
            title = %task.title,
            files = unpacked.files.len(),
            "imported task archive"
        );
        Ok(task)
    }

    async fn save_pending(&self, file: &PendingFile, task_id: &str) -> Result<(), ArchiveError> {
        let reader = tokio::fs::File::open(&file.path).await?;
        self.attachments
            .save_attachment(
                Upload::new(file.name.clone(), file.media_type.clone(), reader),
                task_id,
            )
            .await?;
        Ok(())
    }

    async fn category_id(&self, name: Option<&str>) -> Result<Option<String>, ArchiveError> {
        let Some(name) = name else { return Ok(None) };
        match self.db.find_category_by_name(name).await? {
            Some(category) => Ok(Some(category.id)),
            None => {
                warn!(category = name, "archive category not found, importing without it");
                Ok(None)
            }
        }
    }

    async fn tag_id(&self, name: Option<&str>) -> Result<Option<String>, ArchiveError> {
        let Some(name) = name else { return Ok(None) };
        match self.db.find_tag_by_name(name).await? {
            Some(tag) => Ok(Some(tag.id)),
            None => {
                warn!(tag = name, "archive tag not found, importing without it");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Cursor;

    fn task(title: &str) -> Task {
        Task {
            id: "t-1".into(),
            title: title.into(),
            description: "milk".into(),
            category_id: None,
            tag_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attachment(id: &str, path: &str, media_type: &str, parent: &str) -> Attachment {
        Attachment {
            id: id.into(),
            task_id: "t-1".into(),
            storage_path: path.into(),
            media_type: media_type.into(),
            derived_from_id: Some(parent.into()),
            created_at: Utc::now(),
        }
    }

    fn entry_names<R: Read + Seek>(reader: R) -> Vec<String> {
        let mut archive = ZipArchive::new(reader).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn pdf_pages_absent_without_pdf() {
        let list = vec![attachment("a", "/r/list.txt", "text/plain", "a")];
        assert!(pdf_pages(&list).is_none());
    }

    #[test]
    fn pdf_pages_classifies_each_attachment() {
        // a non-PDF first must not hide the PDF behind it
        let list = vec![
            attachment("n", "/r/notes.txt", "text/plain", "n"),
            attachment("p", "/r/report.pdf", media::PDF, "p"),
            attachment("i0", "/r/report-page-0.png", media::PNG, "p"),
            attachment("i1", "/r/report-page-1.png", media::PNG, "p"),
            attachment("x", "/r/photo.png", media::PNG, "x"),
        ];
        let names: Vec<String> = pdf_pages(&list)
            .unwrap()
            .into_iter()
            .map(|p| p.name_page)
            .collect();
        assert_eq!(
            names,
            vec!["report.pdf", "report-page-0.png", "report-page-1.png"]
        );
    }

    #[test]
    fn document_uses_wire_field_names() {
        let doc = TaskDocument::new(
            &task("Groceries"),
            None,
            None,
            &[attachment("p", "/r/a.pdf", media::PDF, "p")],
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["title"], "Groceries");
        assert!(value.get("creationDate").is_some());
        assert!(value["category"].is_null());
        assert_eq!(value["pdfPages"][0]["namePage"], "a.pdf");
    }

    #[test]
    fn entry_name_is_a_safe_leaf() {
        let name = |title: &str| TaskDocument::new(&task(title), None, None, &[]).entry_name();
        assert_eq!(name("Groceries"), "Groceries.json");
        assert_eq!(name("home/garden"), "garden.json");
        assert_eq!(name("Q1: plan"), "Q1_ plan.json");
    }

    #[test]
    fn document_accepts_foreign_ids_and_missing_refs() {
        let doc: TaskDocument = serde_json::from_str(
            r#"{"id": 42, "title": "Trip", "description": "pack",
                "creationDate": "2024-05-01",
                "category": {"name": "Travel", "description": null}}"#,
        )
        .unwrap();
        assert_eq!(doc.id, "");
        assert_eq!(doc.category_name(), Some("Travel"));
        assert_eq!(doc.tag_name(), None);
    }

    #[test]
    fn export_writes_document_then_non_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = dir.path().join("list.txt");
        std::fs::write(&list_path, b"eggs").unwrap();
        let attachments = vec![
            attachment("p", &dir.path().join("scan.pdf").to_string_lossy(), media::PDF, "p"),
            attachment("l", &list_path.to_string_lossy(), "text/plain", "l"),
        ];

        let out = export_task(&task("Groceries"), None, None, &attachments, Cursor::new(Vec::new()))
            .unwrap();
        assert_eq!(entry_names(out), vec!["Groceries.json", "list.txt"]);
    }

    #[test]
    fn export_fails_when_file_is_missing() {
        let attachments = vec![attachment("l", "/nonexistent/list.txt", "text/plain", "l")];
        let err = export_task(&task("T"), None, None, &attachments, Cursor::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Attachment(AttachmentError::NotFound(_))
        ));
    }

    #[test]
    fn unpack_requires_document() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("list.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"eggs").unwrap();
        let bytes = zip.finish().unwrap();

        let err = unpack(bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::Format(_)));
    }

    #[test]
    fn unpack_accepts_document_after_files() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("list.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"eggs").unwrap();
        zip.start_file("Groceries.json", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(br#"{"title": "Groceries"}"#).unwrap();
        let bytes = zip.finish().unwrap();

        let unpacked = unpack(bytes).unwrap();
        assert_eq!(unpacked.document.title, "Groceries");
        assert_eq!(unpacked.files.len(), 1);
        assert_eq!(unpacked.files[0].name, "list.txt");
        assert_eq!(unpacked.files[0].media_type, "text/plain");
        assert_eq!(std::fs::read(&unpacked.files[0].path).unwrap(), b"eggs");
    }

    #[test]
    fn unpack_rejects_invalid_json_and_traversal() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("task.json", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"{not json").unwrap();
        let bytes = zip.finish().unwrap();
        assert!(matches!(unpack(bytes), Err(ArchiveError::Format(_))));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("../evil.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        let bytes = zip.finish().unwrap();
        assert!(matches!(unpack(bytes), Err(ArchiveError::Format(_))));
    }
}
