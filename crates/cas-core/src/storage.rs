//! Local storage capability traits
//!
//! Storage is addressed by forward-slash string paths, relative to whatever
//! root the implementation chooses (the filesystem store resolves against
//! the working directory). Writes carry the modification time to stamp on
//! the file, because build drivers compare mtimes rather than content.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::Result;

/// Read side of a local storage
#[async_trait]
pub trait ReadableStorage: Send + Sync {
    /// List every file reachable below `base`, recursively.
    ///
    /// Returned paths keep the `base` prefix and are lexicographically
    /// sorted. Directories themselves are not listed.
    async fn list_files(&self, base: &str) -> Result<Vec<String>>;

    /// Read the full content of `path`. A missing path is `NotFound`.
    async fn read_file(&self, path: &str) -> Result<Bytes>;
}

/// Write side of a local storage
#[async_trait]
pub trait WritableStorage: Send + Sync {
    /// Write `content` to `path`, creating parent directories as needed and
    /// truncating any existing file, then stamp the file's modification and
    /// access times with `mtime`.
    async fn write_file(&self, path: &str, mtime: DateTime<Utc>, content: Bytes) -> Result<()>;
}

/// Full read/write storage
pub trait Storage: ReadableStorage + WritableStorage {}

impl<T: ReadableStorage + WritableStorage + ?Sized> Storage for T {}

#[async_trait]
impl<T: ReadableStorage + ?Sized> ReadableStorage for &T {
    async fn list_files(&self, base: &str) -> Result<Vec<String>> {
        (**self).list_files(base).await
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        (**self).read_file(path).await
    }
}

#[async_trait]
impl<T: WritableStorage + ?Sized> WritableStorage for &T {
    async fn write_file(&self, path: &str, mtime: DateTime<Utc>, content: Bytes) -> Result<()> {
        (**self).write_file(path, mtime, content).await
    }
}

/// Join two storage path segments with a single `/`.
#[must_use]
pub fn join_path(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    if base.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

/// The final segment of a storage path.
#[must_use]
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the final segment, without the trailing `/`.
///
/// A path with no separator has an empty parent.
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_inserts_single_separator() {
        assert_eq!(join_path("a", "b"), "a/b");
        assert_eq!(join_path("a/", "/b"), "a/b");
        assert_eq!(join_path("", "b"), "b");
        assert_eq!(join_path("a", ""), "a");
        assert_eq!(join_path(".cas/state", "abc123"), ".cas/state/abc123");
    }

    #[test]
    fn base_name_returns_final_segment() {
        assert_eq!(base_name("test/.archive"), ".archive");
        assert_eq!(base_name("dist/bin/test"), "test");
        assert_eq!(base_name("plain"), "plain");
    }

    #[test]
    fn parent_dir_strips_final_segment() {
        assert_eq!(parent_dir("test/.archive"), "test");
        assert_eq!(parent_dir("dist/bin/test"), "dist/bin");
        assert_eq!(parent_dir("plain"), "");
    }
}
