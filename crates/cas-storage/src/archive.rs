//! Archive decorator
//!
//! Wraps any storage and interposes on one magic basename, the marker
//! (default `.archive`). Reading `D/.archive` yields a TAR of the files
//! under `D`; writing a TAR stream to `D/.archive` unpacks it into `D`.
//! Build drivers get a single sentinel-like path per rule while every
//! file stays individually present and timestamped on disk, and the blob
//! stays inspectable with stock `tar xf`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::Component;
use tracing::{debug, instrument};

use cas_core::{
    Error, ReadableStorage, Result, Storage, WritableStorage, base_name, join_path, parent_dir,
};

const DEFAULT_MARKER: &str = ".archive";

/// Storage decorator that packs and unpacks a directory through a marker
/// file.
#[derive(Debug)]
pub struct ArchiveDecorator<S> {
    wrapped: S,
    marker: String,
}

impl<S> ArchiveDecorator<S> {
    /// Decorate `wrapped` with the default `.archive` marker.
    pub fn new(wrapped: S) -> Self {
        Self::with_marker(wrapped, DEFAULT_MARKER)
    }

    /// Decorate `wrapped` with a custom marker basename.
    pub fn with_marker(wrapped: S, marker: impl Into<String>) -> Self {
        Self {
            wrapped,
            marker: marker.into(),
        }
    }

    fn is_marker(&self, path: &str) -> bool {
        base_name(path) == self.marker
    }
}

/// Build a TAR stream out of (relative name, content) pairs.
///
/// Entries are regular files with zero mtime and mode, so the archive
/// bytes depend only on names and contents.
fn build_archive(files: &[(String, Bytes)]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());

    for (name, content) in files {
        let mut header = tar::Header::new_ustar();
        header.set_size(content.len() as u64);
        header.set_mode(0);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);

        builder
            .append_data(&mut header, name, content.as_ref())
            .map_err(|e| Error::io(e, name, "pack"))?;
    }

    builder
        .into_inner()
        .map_err(|e| Error::io_no_path(e, "pack"))
}

/// Read every regular-file entry out of a TAR stream.
///
/// Entry names must stay inside the directory being unpacked: absolute
/// names and `..` components are rejected rather than resolved.
fn extract_entries(archive: &[u8]) -> Result<Vec<(String, Bytes)>> {
    let mut archive = tar::Archive::new(archive);
    let mut files = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| Error::io_no_path(e, "unpack"))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::io_no_path(e, "unpack"))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = safe_entry_name(&entry)?;

        let mut content = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::io(e, &name, "unpack"))?;

        files.push((name, Bytes::from(content)));
    }

    Ok(files)
}

fn safe_entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
    let path = entry
        .path()
        .map_err(|_| Error::invalid_path(raw.clone()))?
        .into_owned();

    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => {
                segments.push(segment.to_string_lossy().into_owned());
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::invalid_path(raw));
            }
        }
    }

    if segments.is_empty() {
        return Err(Error::invalid_path(raw));
    }

    Ok(segments.join("/"))
}

#[async_trait]
impl<S: Storage> ReadableStorage for ArchiveDecorator<S> {
    async fn list_files(&self, base: &str) -> Result<Vec<String>> {
        self.wrapped.list_files(base).await
    }

    #[instrument(skip(self), fields(marker = %self.marker))]
    async fn read_file(&self, path: &str) -> Result<Bytes> {
        if !self.is_marker(path) {
            return self.wrapped.read_file(path).await;
        }

        let dir = parent_dir(path);
        let listed = self.wrapped.list_files(dir).await?;

        let mut files = Vec::with_capacity(listed.len());
        for file in listed {
            // A marker left behind by an earlier pack must not end up
            // inside the next one.
            if base_name(&file) == self.marker {
                continue;
            }

            let content = self.wrapped.read_file(&file).await?;
            let name = trim_dir_prefix(&file, dir).to_string();
            files.push((name, content));
        }

        debug!(directory = dir, files_packed = files.len(), "packing archive");

        let archive = Bytes::from(build_archive(&files)?);

        // Persist the archive at the marker path so repeated reads see the
        // same bytes without re-packing on the remote side.
        self.wrapped
            .write_file(path, Utc::now(), archive.clone())
            .await?;

        Ok(archive)
    }
}

#[async_trait]
impl<S: Storage> WritableStorage for ArchiveDecorator<S> {
    #[instrument(skip(self, content), fields(marker = %self.marker, bytes = content.len()))]
    async fn write_file(&self, path: &str, mtime: DateTime<Utc>, content: Bytes) -> Result<()> {
        if !self.is_marker(path) {
            return self.wrapped.write_file(path, mtime, content).await;
        }

        let dir = parent_dir(path);
        let entries = extract_entries(&content)?;

        debug!(directory = dir, files_unpacked = entries.len(), "unpacking archive");

        for (name, bytes) in entries {
            self.wrapped
                .write_file(&join_path(dir, &name), mtime, bytes)
                .await?;
        }

        // The marker itself must exist afterwards so plain existence checks
        // on the path a build driver asked for still pass.
        self.wrapped.write_file(path, mtime, Bytes::new()).await
    }
}

fn trim_dir_prefix<'a>(file: &'a str, dir: &str) -> &'a str {
    if dir.is_empty() {
        return file;
    }
    file.strip_prefix(dir)
        .map_or(file, |rest| rest.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    async fn seed(store: &MemoryStorage, files: &[(&str, &str)]) {
        for (path, content) in files {
            store
                .write_file(path, Utc::now(), Bytes::from(content.to_string()))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn archive_round_trip_reproduces_the_tree() {
        let source = MemoryStorage::new();
        seed(
            &source,
            &[
                ("test/one.md", "first file"),
                ("test/two.md", "second file"),
                ("test/child/readme.md", "child file"),
                ("test/child/grand/note.md", "grandchild file"),
            ],
        )
        .await;

        let packed = ArchiveDecorator::new(&source)
            .read_file("test/.archive")
            .await
            .unwrap();

        let dest = MemoryStorage::new();
        let unpack_time = Utc::now();
        ArchiveDecorator::new(&dest)
            .write_file("test/.archive", unpack_time, packed)
            .await
            .unwrap();

        assert_eq!(
            dest.content("test/one.md"),
            Some(Bytes::from_static(b"first file"))
        );
        assert_eq!(
            dest.content("test/two.md"),
            Some(Bytes::from_static(b"second file"))
        );
        assert_eq!(
            dest.content("test/child/readme.md"),
            Some(Bytes::from_static(b"child file"))
        );
        assert_eq!(
            dest.content("test/child/grand/note.md"),
            Some(Bytes::from_static(b"grandchild file"))
        );
        assert_eq!(dest.modified("test/one.md"), Some(unpack_time));

        // The marker file itself exists in the destination.
        assert!(dest.content("test/.archive").is_some());
    }

    #[tokio::test]
    async fn reading_the_marker_twice_is_idempotent() {
        let source = MemoryStorage::new();
        seed(&source, &[("test/one.md", "first file")]).await;

        let decorator = ArchiveDecorator::new(&source);
        let first = decorator.read_file("test/.archive").await.unwrap();
        let second = decorator.read_file("test/.archive").await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_directory_packs_to_an_empty_archive() {
        let source = MemoryStorage::new();

        let packed = ArchiveDecorator::new(&source)
            .read_file("empty/.archive")
            .await
            .unwrap();

        let dest = MemoryStorage::new();
        ArchiveDecorator::new(&dest)
            .write_file("empty/.archive", Utc::now(), packed)
            .await
            .unwrap();

        assert_eq!(dest.paths(), vec!["empty/.archive"]);
    }

    #[tokio::test]
    async fn non_marker_paths_pass_through() {
        let store = MemoryStorage::new();
        let decorator = ArchiveDecorator::new(&store);
        let ts = Utc::now();

        decorator
            .write_file("plain.txt", ts, Bytes::from_static(b"plain"))
            .await
            .unwrap();

        assert_eq!(
            decorator.read_file("plain.txt").await.unwrap(),
            Bytes::from_static(b"plain")
        );
        assert_eq!(store.content("plain.txt"), Some(Bytes::from_static(b"plain")));
    }

    #[tokio::test]
    async fn custom_marker_is_honoured() {
        let source = MemoryStorage::new();
        seed(&source, &[("dir/file.txt", "content")]).await;

        let decorator = ArchiveDecorator::with_marker(&source, ".bundle");

        // The default marker name is now an ordinary file.
        assert!(decorator.read_file("dir/.archive").await.is_err());

        let packed = decorator.read_file("dir/.bundle").await.unwrap();
        assert!(!packed.is_empty());
    }

    /// A TAR with an arbitrary raw name, bypassing the path validation
    /// `tar::Builder` applies on the write side.
    fn raw_archive(name: &[u8], content: &[u8]) -> Bytes {
        let mut header = tar::Header::new_ustar();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(content.len() as u64);
        header.set_mode(0);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();

        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(content);
        bytes.resize(bytes.len().div_ceil(512) * 512, 0);
        bytes.extend_from_slice(&[0u8; 1024]);
        Bytes::from(bytes)
    }

    #[tokio::test]
    async fn traversal_entries_are_rejected_on_unpack() {
        let dest = MemoryStorage::new();
        let err = ArchiveDecorator::new(&dest)
            .write_file(
                "test/.archive",
                Utc::now(),
                raw_archive(b"../evil.txt", b"boom"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidPath { .. }));
        assert!(dest.paths().is_empty());
    }

    #[tokio::test]
    async fn absolute_entries_are_rejected_on_unpack() {
        let dest = MemoryStorage::new();
        let err = ArchiveDecorator::new(&dest)
            .write_file(
                "test/.archive",
                Utc::now(),
                raw_archive(b"/etc/evil", b"boom"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidPath { .. }));
        assert!(dest.paths().is_empty());
    }
}
