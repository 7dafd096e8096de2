//! Filesystem-backed storage

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::io;
use std::path::Path;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use cas_core::{Error, ReadableStorage, Result, WritableStorage};

/// Storage over the real filesystem.
///
/// Paths are interpreted relative to the process working directory, with
/// `/` separators; that keeps the keys identical to the relative paths a
/// build tool passes in and to the keys artifacts are stored under.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn not_found_or_io(err: io::Error, path: &str, operation: &str) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::not_found(path)
    } else {
        Error::io(err, path, operation)
    }
}

#[async_trait]
impl ReadableStorage for FileStore {
    #[instrument(skip(self))]
    async fn list_files(&self, base: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(base) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map_or_else(|| base.to_string(), |p| p.display().to_string());
                match e.into_io_error() {
                    Some(io_err) => not_found_or_io(io_err, &path, "list"),
                    None => Error::configuration(format!("file tree loop under {path}")),
                }
            })?;

            if entry.file_type().is_dir() {
                continue;
            }

            files.push(entry.path().to_string_lossy().replace('\\', "/"));
        }

        files.sort();

        debug!(base, files_found = files.len(), "listed files");

        Ok(files)
    }

    #[instrument(skip(self))]
    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| not_found_or_io(e, path, "read"))?;

        Ok(Bytes::from(content))
    }
}

#[async_trait]
impl WritableStorage for FileStore {
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    async fn write_file(&self, path: &str, mtime: DateTime<Utc>, content: Bytes) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(e, parent, "create_dir_all"))?;
            }
        }

        tokio::fs::write(path, &content)
            .await
            .map_err(|e| Error::io(e, path, "write"))?;

        let stamp = FileTime::from_unix_time(mtime.timestamp(), mtime.timestamp_subsec_nanos());
        filetime::set_file_times(path, stamp, stamp).map_err(|e| Error::io(e, path, "set_times"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn in_dir(dir: &TempDir, rel: &str) -> String {
        dir.path().join(rel).to_string_lossy().replace('\\', "/")
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new();
        let path = in_dir(&dir, "out/dist/bin");
        let ts = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();

        store
            .write_file(&path, ts, Bytes::from_static(b"this is a test"))
            .await
            .unwrap();

        let content = store.read_file(&path).await.unwrap();
        assert_eq!(content, Bytes::from_static(b"this is a test"));

        let meta = std::fs::metadata(&path).unwrap();
        let mtime = FileTime::from_last_modification_time(&meta);
        assert_eq!(mtime.unix_seconds(), ts.timestamp());
    }

    #[tokio::test]
    async fn write_overwrites_and_restamps() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new();
        let path = in_dir(&dir, "file.txt");

        let first = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2022, 2, 2, 0, 0, 0).unwrap();

        store
            .write_file(&path, first, Bytes::from_static(b"one"))
            .await
            .unwrap();
        store
            .write_file(&path, second, Bytes::from_static(b"two"))
            .await
            .unwrap();

        assert_eq!(
            store.read_file(&path).await.unwrap(),
            Bytes::from_static(b"two")
        );
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta).unix_seconds(),
            second.timestamp()
        );
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new();
        let path = in_dir(&dir, "missing");

        let err = store.read_file(&path).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_is_recursive_sorted_and_keeps_the_base_prefix() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new();
        let ts = Utc::now();

        for rel in ["tree/b.txt", "tree/a.txt", "tree/child/c.txt"] {
            store
                .write_file(&in_dir(&dir, rel), ts, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let base = in_dir(&dir, "tree");
        let files = store.list_files(&base).await.unwrap();

        assert_eq!(
            files,
            vec![
                format!("{base}/a.txt"),
                format!("{base}/b.txt"),
                format!("{base}/child/c.txt"),
            ]
        );
    }
}
