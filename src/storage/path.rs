//! Logical path handling.
//!
//! Logical paths are slash-separated and always relative to the backend
//! root. Normalization happens once here so the backends never see `..`,
//! backslashes or empty segments.

use super::error::{Result, StorageError};

/// Normalize a logical file path.
///
/// Leading slashes, `.` segments and repeated slashes are dropped. The
/// result is empty for the root.
pub fn normalize_path(path: &str) -> Result<String> {
    if path.contains('\\') || path.contains('\0') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StorageError::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }

    Ok(segments.join("/"))
}

/// Normalize a path that must name a file (not the root).
pub fn normalize_file_path(path: &str) -> Result<String> {
    let normalized = normalize_path(path)?;
    if normalized.is_empty() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}

/// Normalize a directory path into OpenDAL's form: `""` stays the root
/// (`"/"`), anything else gets a trailing slash.
pub fn normalize_dir_path(path: &str) -> Result<String> {
    let normalized = normalize_path(path)?;
    if normalized.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("{}/", normalized))
    }
}

/// Last segment of an entry path, without a trailing slash.
pub fn entry_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
