//! Atomic JSON file persistence.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use casitas_core::error::AppError;
use casitas_core::result::AppResult;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `value` as pretty JSON, replacing `path` atomically.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        AppError::storage(format!("Failed to replace {}: {e}", path.display()))
    })
}

/// Read a JSON document, returning `None` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_replaces_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        write_json_atomic(&path, &vec![1, 2]).await.unwrap();
        write_json_atomic(&path, &vec![3]).await.unwrap();

        let read: Option<Vec<i32>> = read_json(&path).await.unwrap();
        assert_eq!(read, Some(vec![3]));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let read: Option<Vec<i32>> = read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(read.is_none());
    }
}
