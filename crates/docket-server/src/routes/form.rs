//! Multipart request bodies.
//!
//! File parts are spooled chunk by chunk into anonymous temp files so a
//! task's text fields can be read (and the task created) before any file
//! is stored, whatever order the client sent the parts in.

use std::collections::HashMap;
use std::io::SeekFrom;

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::Json;
use docket_core::media;
use docket_service::{ServiceError, Upload};
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use super::{to_error, ApiError};

/// Name of the repeated file part on task create/update.
pub const FILES_FIELD: &str = "files";

/// Name of the archive part on import.
pub const ARCHIVE_FIELD: &str = "file";

/// Text fields plus spooled file parts of a task form.
#[derive(Debug, Default)]
pub struct TaskForm {
    pub fields: HashMap<String, String>,
    pub uploads: Vec<Upload>,
}

impl TaskForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = TaskForm::default();
        while let Some(field) = next_field(&mut multipart).await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILES_FIELD || field.file_name().is_some() {
                let file_name = field.file_name().unwrap_or_default().to_string();
                if file_name.is_empty() {
                    // Browsers send an empty part when no file was picked.
                    continue;
                }
                let media_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| media::sniff_media_type(&file_name, &[]));
                let (file, len) = spool(field).await?;
                debug!(file = %file_name, bytes = len, "spooled upload");
                form.uploads.push(Upload::new(file_name, media_type, file));
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// A text field, `None` when the client did not send it.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    /// A reference field where an empty value clears the reference.
    pub fn reference(&self, name: &str) -> Option<Option<String>> {
        self.fields.get(name).map(|v| {
            let v = v.trim();
            if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            }
        })
    }
}

/// Spool the part named `field_name` to a temp file and return it as a
/// blocking file positioned at the start.
pub async fn read_archive(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<std::fs::File, ApiError> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() == Some(field_name) {
            let (file, len) = spool(field).await?;
            debug!(bytes = len, "spooled archive");
            return Ok(file.into_std().await);
        }
    }
    Err(bad_request(format!("missing multipart field {field_name}")))
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, ApiError> {
    multipart.next_field().await.map_err(multipart_error)
}

async fn spool(mut field: Field<'_>) -> Result<(File, u64), ApiError> {
    let std_file = tempfile::tempfile().map_err(storage)?;
    let mut file = File::from_std(std_file);
    let mut len = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await.map_err(storage)?;
        len += chunk.len() as u64;
    }
    file.flush().await.map_err(storage)?;
    file.seek(SeekFrom::Start(0)).await.map_err(storage)?;
    Ok((file, len))
}

/// Keeps the status axum assigns; an oversized body stays a 413.
fn multipart_error(e: MultipartError) -> ApiError {
    (e.status(), Json(json!({ "error": e.body_text() })))
}

fn bad_request(msg: String) -> ApiError {
    to_error(ServiceError::InvalidInput(msg))
}

fn storage(e: std::io::Error) -> ApiError {
    to_error(ServiceError::Storage(format!("spool upload: {e}")))
}
