//! The artifact command: upload local files as the artifacts of a hash.

use std::sync::Arc;
use tracing::instrument;

use cas_backend::Backend;
use cas_core::Storage;

/// Upload local paths under a fingerprint
pub struct Artifact<S> {
    pub storage: S,
    pub backend: Arc<dyn Backend>,
    pub state_path: String,
}

impl<S: Storage> Artifact<S> {
    /// Store `paths` under the hash named by `target` and return the hash
    /// together with the uploaded paths.
    ///
    /// `target` may be the fingerprint itself or the sentinel path emitted
    /// by fetch, so a makefile rule can pass `$<` straight through.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn run(&self, target: &str, paths: &[String]) -> miette::Result<(String, Vec<String>)> {
        let hash = strip_state_path(target, &self.state_path);

        let written = self
            .backend
            .store_artifacts(&self.storage, hash, paths)
            .await?;

        Ok((hash.to_string(), written))
    }
}

fn strip_state_path<'a>(target: &'a str, state_path: &str) -> &'a str {
    target
        .strip_prefix(state_path)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Fetch, InputSource};
    use bytes::Bytes;
    use cas_backend::ObjectStoreBackend;
    use cas_core::Algorithm;
    use cas_core::WritableStorage;
    use cas_storage::MemoryStorage;
    use chrono::Utc;
    use object_store::memory::InMemory;

    fn test_backend() -> Arc<ObjectStoreBackend> {
        Arc::new(ObjectStoreBackend::new(Arc::new(InMemory::new()), "tests"))
    }

    #[test]
    fn sentinel_paths_reduce_to_their_hash() {
        assert_eq!(strip_state_path("somehash", ".cas/state"), "somehash");
        assert_eq!(strip_state_path(".cas/state/somehash", ".cas/state"), "somehash");
        assert_eq!(strip_state_path("other/dir/somehash", ".cas/state"), "other/dir/somehash");
    }

    #[tokio::test]
    async fn stored_artifacts_come_back_on_fetch() {
        let backend = test_backend();
        let now = Utc::now();

        let source = MemoryStorage::new();
        source
            .write_file(
                "dist/bin/test",
                now,
                Bytes::from_static(b"this is a test"),
            )
            .await
            .unwrap();

        let artifact = Artifact {
            storage: &source,
            backend: backend.clone(),
            state_path: ".cas/state".to_string(),
        };

        let (hash, written) = artifact
            .run("somehash", &["dist/bin/test".to_string()])
            .await
            .unwrap();
        assert_eq!(hash, "somehash");
        assert_eq!(written, vec!["dist/bin/test"]);

        // Read back through a fetch into a fresh store.
        let dest = MemoryStorage::new();
        let fetch = Fetch {
            storage: &dest,
            backend: backend.clone(),
            state_path: ".cas/state".to_string(),
            algorithm: Algorithm::Sha256,
            debug: false,
            hash_override: Some("somehash".to_string()),
        };
        fetch
            .run(InputSource::Literal(String::new()))
            .await
            .unwrap();

        assert_eq!(
            dest.content("dist/bin/test"),
            Some(Bytes::from_static(b"this is a test"))
        );

        // Restored artifacts and the sentinel share the entry's timestamp.
        let restored = dest.modified("dist/bin/test").unwrap();
        assert!((now - restored).num_seconds().abs() <= 10);
        assert_eq!(dest.modified(".cas/state/somehash"), Some(restored));
    }

    #[tokio::test]
    async fn uploading_via_the_sentinel_path_targets_the_hash() {
        let backend = test_backend();

        let source = MemoryStorage::new();
        source
            .write_file("out/file", Utc::now(), Bytes::from_static(b"content"))
            .await
            .unwrap();

        let artifact = Artifact {
            storage: &source,
            backend: backend.clone(),
            state_path: ".cas/state".to_string(),
        };

        let (hash, _) = artifact
            .run(".cas/state/somehash", &["out/file".to_string()])
            .await
            .unwrap();

        assert_eq!(hash, "somehash");
        assert!(
            cas_backend::read_timestamp(backend.as_ref(), "somehash")
                .await
                .unwrap()
                .is_some()
        );
    }
}
