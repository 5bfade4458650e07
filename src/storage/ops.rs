//! Operations shared by the OpenDAL-backed storage implementations.
//!
//! Both backends resolve their own `Operator` and then delegate here, so
//! path normalization, error mapping and the staged write/append logic
//! behave identically on every medium.

use async_lock::Mutex;
use chrono::{DateTime, Utc};
use futures::io::{AsyncRead, AsyncReadExt};
use opendal::{ErrorKind, Metadata, Operator, Writer};
use tracing::{debug, warn};

use super::error::{Result, StorageError};
use super::path::{entry_name, normalize_dir_path, normalize_file_path};
use super::traits::BoxedFileReader;

/// Size of the chunks read from a caller's source.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Size of the parts the writer flushes; S3 needs at least 5 MiB per part.
const WRITE_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Stat a path that must be a file.
async fn stat_file(op: &Operator, path: &str) -> Result<Metadata> {
    let metadata = op
        .stat(path)
        .await
        .map_err(|e| StorageError::from_opendal("stat", path, e))?;
    if metadata.is_dir() {
        return Err(StorageError::NotFound(path.to_string()));
    }
    Ok(metadata)
}

pub(crate) async fn check(op: &Operator) -> std::result::Result<(), opendal::Error> {
    op.check().await
}

pub(crate) async fn open_reader(op: &Operator, path: &str) -> Result<BoxedFileReader> {
    let path = normalize_file_path(path)?;
    let metadata = stat_file(op, &path).await?;

    let reader = op
        .reader(&path)
        .await
        .map_err(|e| StorageError::from_opendal("open", &path, e))?;
    let reader = reader
        .into_futures_async_read(0..metadata.content_length())
        .await
        .map_err(|e| StorageError::from_opendal("open", &path, e))?;

    debug!(path = %path, size = metadata.content_length(), "opened reader");
    Ok(Box::pin(reader))
}

pub(crate) async fn read_all(op: &Operator, path: &str) -> Result<Vec<u8>> {
    let path = normalize_file_path(path)?;
    let data = op
        .read(&path)
        .await
        .map_err(|e| StorageError::from_opendal("read", &path, e))?;
    Ok(data.to_vec())
}

pub(crate) async fn exists(op: &Operator, path: &str) -> Result<bool> {
    let path = normalize_file_path(path)?;
    match op.stat(&path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::io("stat", path, e)),
    }
}

pub(crate) async fn size(op: &Operator, path: &str) -> Result<u64> {
    let path = normalize_file_path(path)?;
    Ok(stat_file(op, &path).await?.content_length())
}

pub(crate) async fn mod_time(op: &Operator, path: &str) -> Result<DateTime<Utc>> {
    let path = normalize_file_path(path)?;
    let metadata = stat_file(op, &path).await?;
    metadata
        .last_modified()
        .ok_or_else(|| StorageError::io("stat", path, "modification time not reported"))
}

pub(crate) async fn copy(op: &Operator, old_path: &str, new_path: &str) -> Result<()> {
    let old_path = normalize_file_path(old_path)?;
    let new_path = normalize_file_path(new_path)?;
    if old_path == new_path {
        stat_file(op, &old_path).await?;
        return Ok(());
    }

    op.copy(&old_path, &new_path)
        .await
        .map_err(|e| StorageError::from_opendal("copy", &old_path, e))?;

    debug!(from = %old_path, to = %new_path, "copied file");
    Ok(())
}

/// Move a file, renaming natively when the medium supports it.
///
/// Without native rename the file is copied and the source deleted; if the
/// delete fails the destination is put back the way it was (its previous
/// content, or absent) so neither side changes.
pub(crate) async fn move_file(op: &Operator, old_path: &str, new_path: &str) -> Result<()> {
    let old_path = normalize_file_path(old_path)?;
    let new_path = normalize_file_path(new_path)?;
    if old_path == new_path {
        stat_file(op, &old_path).await?;
        return Ok(());
    }

    if op.info().full_capability().rename {
        op.rename(&old_path, &new_path)
            .await
            .map_err(|e| StorageError::from_opendal("move", &old_path, e))?;
    } else {
        stat_file(op, &old_path).await?;
        let previous = match op.read(&new_path).await {
            Ok(data) => Some(data.to_vec()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StorageError::io("move", new_path, e)),
        };

        op.copy(&old_path, &new_path)
            .await
            .map_err(|e| StorageError::from_opendal("move", &old_path, e))?;

        if let Err(e) = op.delete(&old_path).await {
            if let Err(rollback) = restore_destination(op, &new_path, previous).await {
                warn!(path = %new_path, error = %rollback, "failed to roll back copy of moved file");
            }
            return Err(StorageError::io("move", old_path, e));
        }
    }

    debug!(from = %old_path, to = %new_path, "moved file");
    Ok(())
}

/// Put `path` back to its state before a move: its previous content, or
/// nothing at all.
async fn restore_destination(op: &Operator, path: &str, previous: Option<Vec<u8>>) -> Result<()> {
    if let Some(data) = previous {
        op.write(path, data)
            .await
            .map_err(|e| StorageError::io("restore", path, e))?;
    } else {
        op.delete(path)
            .await
            .map_err(|e| StorageError::io("restore", path, e))?;
    }
    Ok(())
}

async fn open_writer(op: &Operator, path: &str) -> Result<Writer> {
    op.writer_with(path)
        .chunk(WRITE_CHUNK_SIZE)
        .await
        .map_err(|e| StorageError::from_opendal("write", path, e))
}

/// Copy everything from `reader` into `writer`, returning the byte count.
async fn pump(
    reader: &mut (dyn AsyncRead + Unpin + Send),
    writer: &mut Writer,
    path: &str,
) -> Result<u64> {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| StorageError::io("read source for", path, e))?;
        if n == 0 {
            break;
        }
        writer
            .write(buf[..n].to_vec())
            .await
            .map_err(|e| StorageError::io("write", path, e))?;
        written += n as u64;
    }

    Ok(written)
}

/// Commit the writer when `outcome` succeeded, abort it otherwise.
async fn finish(mut writer: Writer, path: &str, outcome: Result<u64>) -> Result<u64> {
    match outcome {
        Ok(written) => {
            writer
                .close()
                .await
                .map_err(|e| StorageError::io("write", path, e))?;
            Ok(written)
        }
        Err(err) => {
            if let Err(e) = writer.abort().await {
                warn!(path = %path, error = %e, "failed to abort write");
            }
            Err(err)
        }
    }
}

pub(crate) async fn write(
    op: &Operator,
    reader: &mut (dyn AsyncRead + Unpin + Send),
    path: &str,
) -> Result<u64> {
    let path = normalize_file_path(path)?;
    let mut writer = open_writer(op, &path).await?;
    let outcome = pump(reader, &mut writer, &path).await;
    let written = finish(writer, &path, outcome).await?;

    debug!(path = %path, bytes = written, "wrote file");
    Ok(written)
}

/// Append by rewriting the file with the new bytes after the old ones.
///
/// The rewrite goes through the same staged writer as [`write`], so the old
/// content stays visible until the new content is committed. `lock`
/// serializes appends made through one backend.
pub(crate) async fn append(
    op: &Operator,
    lock: &Mutex<()>,
    reader: &mut (dyn AsyncRead + Unpin + Send),
    path: &str,
) -> Result<u64> {
    let path = normalize_file_path(path)?;
    let _guard = lock.lock().await;

    let existing = match op.read(&path).await {
        Ok(data) => data.to_vec(),
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(StorageError::io("append", path, e)),
    };

    let mut writer = open_writer(op, &path).await?;
    let outcome = async {
        if !existing.is_empty() {
            writer
                .write(existing)
                .await
                .map_err(|e| StorageError::io("append", &path, e))?;
        }
        pump(reader, &mut writer, &path).await
    }
    .await;
    let appended = finish(writer, &path, outcome).await?;

    debug!(path = %path, bytes = appended, "appended to file");
    Ok(appended)
}

pub(crate) async fn remove(op: &Operator, path: &str) -> Result<String> {
    let path = normalize_file_path(path)?;
    op.delete(&path)
        .await
        .map_err(|e| StorageError::io("remove", &path, e))?;

    debug!(path = %path, "removed file");
    Ok(path)
}

/// List the immediate entries of a directory.
///
/// `hidden` names an entry of the root that is never reported.
pub(crate) async fn list_directory(
    op: &Operator,
    path: &str,
    hidden: Option<&str>,
) -> Result<Vec<String>> {
    let dir = normalize_dir_path(path)?;
    let entries = match op.list(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io("list", dir, e)),
    };

    let is_root = dir == "/";
    let mut names: Vec<String> = entries
        .iter()
        .filter(|entry| entry.path() != dir && !entry.path().is_empty() && entry.path() != "/")
        .map(|entry| entry_name(entry.path()).to_string())
        .filter(|name| !(is_root && hidden == Some(name.as_str())))
        .collect();

    names.sort();
    names.dedup();
    Ok(names)
}

/// List every file below a directory, as root-relative paths.
pub(crate) async fn list_directory_recursive(
    op: &Operator,
    path: &str,
    hidden: Option<&str>,
) -> Result<Vec<String>> {
    let dir = normalize_dir_path(path)?;
    let entries = match op.list_with(&dir).recursive(true).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io("list", dir, e)),
    };

    let hidden_prefix = hidden.map(|h| format!("{}/", h));
    let mut paths: Vec<String> = entries
        .into_iter()
        .filter(|entry| entry.metadata().is_file())
        .map(|entry| entry.path().trim_start_matches('/').to_string())
        .filter(|p| match &hidden_prefix {
            Some(prefix) => !p.starts_with(prefix.as_str()),
            None => true,
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Check that a deleted file no longer resolves.
pub(crate) async fn confirm_removed(op: &Operator, path: &str) -> Result<()> {
    match op.stat(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io("confirm removal of", path, e)),
        Ok(_) => Err(StorageError::io(
            "remove",
            path,
            "object still present after delete",
        )),
    }
}

/// Check that nothing is left below a deleted directory.
pub(crate) async fn confirm_directory_removed(op: &Operator, dir: &str) -> Result<()> {
    let remaining = list_directory_recursive(op, dir, None).await?;
    if !remaining.is_empty() {
        return Err(StorageError::io(
            "remove directory",
            dir,
            format!("{} objects still present after delete", remaining.len()),
        ));
    }
    Ok(())
}

pub(crate) async fn remove_directory(op: &Operator, path: &str) -> Result<String> {
    let dir = normalize_dir_path(path)?;
    match op.remove_all(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(StorageError::io("remove directory", dir, e)),
    }

    debug!(path = %dir, "removed directory");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendal::services::Fs;
    use tempfile::TempDir;

    fn operator() -> (TempDir, Operator) {
        let dir = TempDir::new().unwrap();
        let builder = Fs::default().root(dir.path().to_str().unwrap());
        let op = Operator::new(builder).unwrap().finish();
        (dir, op)
    }

    #[tokio::test]
    async fn test_copy_onto_itself_requires_source() {
        let (_dir, op) = operator();

        let err = copy(&op, "missing.txt", "missing.txt").await.unwrap_err();
        assert!(err.is_not_found());

        op.write("here.txt", b"x".to_vec()).await.unwrap();
        copy(&op, "here.txt", "/here.txt").await.unwrap();
        assert_eq!(read_all(&op, "here.txt").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_restore_destination_puts_back_previous_content() {
        let (_dir, op) = operator();
        op.write("dst.txt", b"copied over".to_vec()).await.unwrap();

        restore_destination(&op, "dst.txt", Some(b"original".to_vec()))
            .await
            .unwrap();
        assert_eq!(read_all(&op, "dst.txt").await.unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_restore_destination_removes_new_copy() {
        let (_dir, op) = operator();
        op.write("dst.txt", b"copied over".to_vec()).await.unwrap();

        restore_destination(&op, "dst.txt", None).await.unwrap();
        assert!(!exists(&op, "dst.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_removed() {
        let (_dir, op) = operator();
        op.write("kept.txt", b"k".to_vec()).await.unwrap();

        confirm_removed(&op, "never-was.txt").await.unwrap();

        let err = confirm_removed(&op, "kept.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::IoFailure { op: "remove", .. }));
        assert!(err.to_string().contains("still present"));
    }

    #[tokio::test]
    async fn test_confirm_directory_removed() {
        let (_dir, op) = operator();
        op.write("logs/a.txt", b"a".to_vec()).await.unwrap();
        op.write("logs/deep/b.txt", b"b".to_vec()).await.unwrap();

        let err = confirm_directory_removed(&op, "logs/").await.unwrap_err();
        assert!(err.to_string().contains("2 objects still present"));

        remove_directory(&op, "logs").await.unwrap();
        confirm_directory_removed(&op, "logs/").await.unwrap();
        confirm_directory_removed(&op, "empty/").await.unwrap();
    }
}
