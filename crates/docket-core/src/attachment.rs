use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media;

/// A stored file owned by exactly one task.
///
/// Originals are their own derivation root (`derived_from_id == id`).
/// Page images rasterized from a PDF point at the PDF's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub task_id: String,
    pub storage_path: String,
    pub media_type: String,
    pub derived_from_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// Leaf name of the stored file, used for zip entries and downloads.
    pub fn file_name(&self) -> String {
        Path::new(&self.storage_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_pdf(&self) -> bool {
        media::is_pdf(&self.media_type)
    }

    pub fn is_derivation_root(&self) -> bool {
        self.derived_from_id.as_deref() == Some(self.id.as_str())
    }

    /// True for page images produced from another attachment.
    pub fn is_derived(&self) -> bool {
        matches!(self.derived_from_id.as_deref(), Some(parent) if parent != self.id)
    }
}

/// Input for inserting an attachment record. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub task_id: String,
    pub storage_path: String,
    pub media_type: String,
    /// `None` for an original upload; the store links it to itself afterwards.
    pub derived_from_id: Option<String>,
}
