//! In-memory storage for tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use cas_core::{Error, ReadableStorage, Result, WritableStorage};

#[derive(Debug, Clone)]
struct MemoryFile {
    modified: DateTime<Utc>,
    content: Bytes,
}

/// Storage held entirely in memory.
///
/// Used as the test double for the filesystem store; the extra accessors
/// let tests assert on stored content and modification times directly.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, MemoryFile>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored content of `path`, if present.
    #[must_use]
    pub fn content(&self, path: &str) -> Option<Bytes> {
        self.files
            .lock()
            .expect("memory storage lock poisoned")
            .get(path)
            .map(|f| f.content.clone())
    }

    /// The stored modification time of `path`, if present.
    #[must_use]
    pub fn modified(&self, path: &str) -> Option<DateTime<Utc>> {
        self.files
            .lock()
            .expect("memory storage lock poisoned")
            .get(path)
            .map(|f| f.modified)
    }

    /// Every stored path, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .expect("memory storage lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReadableStorage for MemoryStorage {
    async fn list_files(&self, base: &str) -> Result<Vec<String>> {
        let prefix = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };

        Ok(self
            .files
            .lock()
            .expect("memory storage lock poisoned")
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        self.files
            .lock()
            .expect("memory storage lock poisoned")
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| Error::not_found(path))
    }
}

#[async_trait]
impl WritableStorage for MemoryStorage {
    async fn write_file(&self, path: &str, mtime: DateTime<Utc>, content: Bytes) -> Result<()> {
        self.files
            .lock()
            .expect("memory storage lock poisoned")
            .insert(
                path.to_string(),
                MemoryFile {
                    modified: mtime,
                    content,
                },
            );

        Ok(())
    }
}
