mod local;

pub use local::LocalStore;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// A store for opaque blobs keyed by leaf file names.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (create or overwrite) an object.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;
}

// -- Configuration --

/// Configuration for the attachment storage root.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Directory all attachment bytes are written under. When `None`,
    /// `$XDG_DATA_HOME/docket/uploads` is used.
    pub storage_root: Option<String>,
}

impl StoreConfig {
    pub fn root_dir(&self) -> PathBuf {
        self.storage_root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir().join("uploads"))
    }
}

/// Reproduce the same default data directory logic as `docket_db::data_dir()`
/// without taking a dependency on the db crate.
fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("docket")
}
