//! Storage backend traits.
//!
//! This module defines the contract every storage backend implements.
//! Callers hold a [`BoxedStorageBackend`] and never need to know which
//! medium sits underneath.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::{AsyncRead, AsyncSeek};
use std::pin::Pin;

use super::error::Result;
use super::types::StorageDriver;

/// A readable, seekable handle to a stored file.
///
/// The handle is owned by whoever opened it and released when dropped.
pub trait FileReader: AsyncRead + AsyncSeek + Send {}

impl<T: AsyncRead + AsyncSeek + Send + ?Sized> FileReader for T {}

/// A boxed file reader returned by [`StorageBackend::open_reader`].
pub type BoxedFileReader = Pin<Box<dyn FileReader>>;

/// Core trait for storage backends.
///
/// All paths are logical, slash-separated and relative to the backend root
/// (a local directory, or a bucket plus key prefix). Paths that would
/// escape the root are rejected with `StorageError::InvalidPath`.
///
/// A single backend is safe to share between tasks. Operations on the same
/// path from different callers are not ordered against each other.
///
/// # Example
///
/// ```ignore
/// use filestore::storage::{StorageFactory, StorageSettings};
///
/// let backend = StorageFactory::create(StorageSettings::local("./data"), false).await?;
///
/// let mut body = futures::io::Cursor::new(b"hello".to_vec());
/// backend.write(&mut body, "greetings/hello.txt").await?;
///
/// assert_eq!(backend.read_all("greetings/hello.txt").await?, b"hello");
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// The driver this backend implements.
    fn driver(&self) -> StorageDriver;

    /// Verify the medium is reachable.
    ///
    /// Fails with `ConnectionFailure` otherwise. Never modifies stored data.
    async fn test_connection(&self) -> Result<()>;

    /// Open a file for sequential reads and seeks.
    ///
    /// Fails with `NotFound` if the file does not exist.
    async fn open_reader(&self, path: &str) -> Result<BoxedFileReader>;

    /// Read a whole file into memory.
    ///
    /// No size limit is applied; meant for small files.
    async fn read_all(&self, path: &str) -> Result<Vec<u8>>;

    /// Check whether a file exists.
    ///
    /// An absent path is `Ok(false)`, never an error.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Size of a file in bytes.
    async fn size(&self, path: &str) -> Result<u64>;

    /// Last modification time of a file.
    async fn mod_time(&self, path: &str) -> Result<DateTime<Utc>>;

    /// Copy a file.
    ///
    /// Either `new_path` ends up a complete copy or the call fails.
    async fn copy(&self, old_path: &str, new_path: &str) -> Result<()>;

    /// Move a file.
    ///
    /// On success `old_path` is gone and `new_path` holds its content. On
    /// failure both paths are left as they were.
    async fn move_file(&self, old_path: &str, new_path: &str) -> Result<()>;

    /// Stream `reader` into `path`, replacing any existing file.
    ///
    /// Returns the number of bytes written.
    async fn write(&self, reader: &mut (dyn AsyncRead + Unpin + Send), path: &str)
        -> Result<u64>;

    /// Append the bytes of `reader` to `path`, creating it if absent.
    ///
    /// Returns the number of bytes appended by this call. A failed append
    /// leaves the previous content in place.
    async fn append(&self, reader: &mut (dyn AsyncRead + Unpin + Send), path: &str)
        -> Result<u64>;

    /// Delete a file. Deleting a missing file succeeds.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Names of the immediate entries of a directory, sorted.
    ///
    /// Sub-directories are listed by name without a trailing slash. A
    /// missing or empty directory yields an empty list.
    async fn list_directory(&self, path: &str) -> Result<Vec<String>>;

    /// Root-relative paths of every file below a directory, sorted.
    async fn list_directory_recursive(&self, path: &str) -> Result<Vec<String>>;

    /// Delete everything below a directory. Succeeds if it is already gone.
    async fn remove_directory(&self, path: &str) -> Result<()>;
}

/// A boxed storage backend for dynamic dispatch.
pub type BoxedStorageBackend = Box<dyn StorageBackend>;
