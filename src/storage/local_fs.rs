//! Local filesystem storage implementation using OpenDAL.
//!
//! Files live under a root directory. Writes are staged in a hidden
//! directory inside the root and renamed into place on commit, so readers
//! never observe a half-written file.

use async_lock::{Mutex, OnceCell};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::AsyncRead;
use opendal::layers::LoggingLayer;
use opendal::services::Fs;
use opendal::Operator;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::{Result, StorageError};
use super::ops;
use super::path::normalize_path;
use super::traits::{BoxedFileReader, BoxedStorageBackend, StorageBackend};
use super::types::StorageDriver;

/// Directory inside the root used to stage writes before they are renamed
/// into place. Never reported by listings.
pub const STAGING_DIR: &str = ".filestore-staging";

/// Local filesystem storage backend.
///
/// The operator is built on first use, so constructing the backend never
/// touches the disk; a missing or unreadable root surfaces on the first
/// operation instead.
pub struct LocalFsStorage {
    root: PathBuf,
    operator: OnceCell<Operator>,
    append_lock: Mutex<()>,
}

impl LocalFsStorage {
    /// Create a backend rooted at `root`. An empty path means the current
    /// directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut root = root.into();
        if root.as_os_str().is_empty() {
            root = PathBuf::from(".");
        }
        Self {
            root,
            operator: OnceCell::new(),
            append_lock: Mutex::new(()),
        }
    }

    /// Create a boxed local filesystem backend.
    pub fn boxed(root: impl Into<PathBuf>) -> BoxedStorageBackend {
        Box::new(Self::new(root))
    }

    /// The configured root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the OpenDAL operator.
    fn build_operator(&self) -> Result<Operator> {
        let root = path_str(&self.root)?;
        let staging = self.root.join(STAGING_DIR);
        let staging = path_str(&staging)?;

        let builder = Fs::default().root(root).atomic_write_dir(staging);

        let op = Operator::new(builder)
            .map_err(|e| StorageError::connection("local", e))?
            .layer(LoggingLayer::default())
            .finish();

        debug!(root = %self.root.display(), "initialized local storage");
        Ok(op)
    }

    /// Get the operator, building it on first use.
    async fn get_operator(&self) -> Result<&Operator> {
        self.operator
            .get_or_try_init(|| async { self.build_operator() })
            .await
    }

    /// Remove a file or a whole directory tree, ignoring missing paths.
    async fn remove_path(path: &Path) -> std::io::Result<()> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };

        match result {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Empty the root directory, keeping the staging directory.
    async fn clear_root(&self) -> std::io::Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == STAGING_DIR {
                continue;
            }
            Self::remove_path(&entry.path()).await?;
        }
        Ok(())
    }
}

/// Reject logical paths that point into the staging directory.
fn resolve(path: &str) -> Result<&str> {
    let relative = normalize_path(path)?;
    if relative.split('/').next() == Some(STAGING_DIR) {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(path)
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))
}

#[async_trait]
impl StorageBackend for LocalFsStorage {
    fn driver(&self) -> StorageDriver {
        StorageDriver::Local
    }

    async fn test_connection(&self) -> Result<()> {
        let op = self.get_operator().await?;
        ops::check(op)
            .await
            .map_err(|e| StorageError::connection("local", e))
    }

    async fn open_reader(&self, path: &str) -> Result<BoxedFileReader> {
        ops::open_reader(self.get_operator().await?, resolve(path)?).await
    }

    async fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        ops::read_all(self.get_operator().await?, resolve(path)?).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        ops::exists(self.get_operator().await?, resolve(path)?).await
    }

    async fn size(&self, path: &str) -> Result<u64> {
        ops::size(self.get_operator().await?, resolve(path)?).await
    }

    async fn mod_time(&self, path: &str) -> Result<DateTime<Utc>> {
        ops::mod_time(self.get_operator().await?, resolve(path)?).await
    }

    async fn copy(&self, old_path: &str, new_path: &str) -> Result<()> {
        ops::copy(
            self.get_operator().await?,
            resolve(old_path)?,
            resolve(new_path)?,
        )
        .await
    }

    async fn move_file(&self, old_path: &str, new_path: &str) -> Result<()> {
        ops::move_file(
            self.get_operator().await?,
            resolve(old_path)?,
            resolve(new_path)?,
        )
        .await
    }

    async fn write(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        path: &str,
    ) -> Result<u64> {
        ops::write(self.get_operator().await?, reader, resolve(path)?).await
    }

    async fn append(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        path: &str,
    ) -> Result<u64> {
        ops::append(
            self.get_operator().await?,
            &self.append_lock,
            reader,
            resolve(path)?,
        )
        .await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        ops::remove(self.get_operator().await?, resolve(path)?).await?;
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        ops::list_directory(
            self.get_operator().await?,
            resolve(path)?,
            Some(STAGING_DIR),
        )
        .await
    }

    async fn list_directory_recursive(&self, path: &str) -> Result<Vec<String>> {
        ops::list_directory_recursive(
            self.get_operator().await?,
            resolve(path)?,
            Some(STAGING_DIR),
        )
        .await
    }

    async fn remove_directory(&self, path: &str) -> Result<()> {
        let relative = normalize_path(resolve(path)?)?;

        let result = if relative.is_empty() {
            self.clear_root().await
        } else {
            Self::remove_path(&self.root.join(&relative)).await
        };
        result.map_err(|e| StorageError::io("remove directory", relative.as_str(), e))?;

        debug!(path = %relative, "removed directory");
        Ok(())
    }
}
