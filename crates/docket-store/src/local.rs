use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::{ObjectStore, StoreConfig, StoreError};

/// Attachment bytes on the local filesystem, rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create the root directory if needed and return a store bound to it.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|e| StoreError::Internal(format!("mkdir {}: {e}", root.display())))?;
        let root = root
            .canonicalize()
            .map_err(|e| StoreError::Internal(format!("canonicalize {}: {e}", root.display())))?;
        tracing::debug!(root = %root.display(), "opened storage root");
        Ok(Self { root })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open(config.root_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `name` onto the root. Absolute names, `..` and anything that
    /// would land outside the root are rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidPath("empty name".into()));
        }
        let mut path = self.root.clone();
        for component in Path::new(name).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StoreError::InvalidPath(name.to_string()));
                }
            }
        }
        if path == self.root || !path.starts_with(&self.root) {
            return Err(StoreError::InvalidPath(name.to_string()));
        }
        Ok(path)
    }

    /// Copy `reader` into `name`, replacing any existing file. Returns the
    /// number of bytes written.
    pub async fn write_stream<R>(&self, name: &str, reader: &mut R) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let path = self.resolve(name)?;
        ensure_parent(&path).await?;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StoreError::Internal(format!("create {}: {e}", path.display())))?;
        let written = tokio::io::copy(reader, &mut file)
            .await
            .map_err(|e| StoreError::Internal(format!("write {}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| StoreError::Internal(format!("flush {}: {e}", path.display())))?;
        Ok(written)
    }

    /// Open `name` for streaming reads.
    pub async fn open_file(&self, name: &str) -> Result<tokio::fs::File, StoreError> {
        let path = self.resolve(name)?;
        open_existing(&path).await
    }

    /// Open an absolute path, which must live under the root.
    pub async fn open_path(&self, path: &Path) -> Result<tokio::fs::File, StoreError> {
        self.check_inside(path)?;
        open_existing(path).await
    }

    /// Remove a file by absolute path. Missing files are not an error.
    pub async fn remove_path(&self, path: &Path) -> Result<(), StoreError> {
        self.check_inside(path)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Internal(format!(
                "delete {}: {e}",
                path.display()
            ))),
        }
    }

    fn check_inside(&self, path: &Path) -> Result<(), StoreError> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) || path == self.root {
            return Err(StoreError::InvalidPath(path.display().to_string()));
        }
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Internal(format!("mkdir: {e}")))?;
    }
    Ok(())
}

async fn open_existing(path: &Path) -> Result<tokio::fs::File, StoreError> {
    match tokio::fs::File::open(path).await {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(StoreError::Internal(format!(
            "open {}: {e}",
            path.display()
        ))),
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        ensure_parent(&path).await?;
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Internal(format!("write {}: {e}", path.display())))
    }
}
