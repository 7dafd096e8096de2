//! The fetch command: resolve a fingerprint to a state sentinel, creating
//! the cache entry or restoring its artifacts.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use cas_backend::{
    Backend, DEBUG_HASHES_KEY, TimestampedSink, create_entry, now_seconds, read_timestamp,
};
use cas_core::{Algorithm, HashOutput, Hasher, Storage, join_path};

use super::InputSource;

/// Fetch state and artifacts for a set of input files
pub struct Fetch<S> {
    pub storage: S,
    pub backend: Arc<dyn Backend>,
    pub state_path: String,
    pub algorithm: Algorithm,
    /// Record the per-file digests under `@debug/hashes`
    pub debug: bool,
    /// Skip hashing and use this fingerprint directly (tests)
    pub hash_override: Option<String>,
}

impl<S: Storage> Fetch<S> {
    /// Run the fetch flow and return the sentinel path to print.
    #[instrument(skip_all, fields(state_path = %self.state_path, algorithm = %self.algorithm))]
    pub async fn run(&self, input: InputSource) -> miette::Result<String> {
        let output = self.resolve_hash(input).await?;
        let hash = &output.hash;

        let recorded = read_timestamp(self.backend.as_ref(), hash).await?;
        let exists = recorded.is_some();
        let ts = recorded.unwrap_or_else(now_seconds);

        debug!(hash, existing_hash = exists, timestamp = ts.timestamp(), "resolved entry");

        if !exists {
            create_entry(self.backend.as_ref(), hash, ts).await?;
        }

        if self.debug && !output.file_hashes.is_empty() {
            let data = HashMap::from([(
                DEBUG_HASHES_KEY.to_string(),
                output.file_hashes.concat(),
            )]);
            self.backend.write_metadata(hash, data).await?;
        }

        // The sentinel is what the build driver stats; it carries the
        // entry's creation time, not the time of this run.
        let sentinel = join_path(&self.state_path, hash);
        self.storage.write_file(&sentinel, ts, Bytes::new()).await?;

        if exists {
            let sink = TimestampedSink::new(&self.storage, ts);
            self.backend
                .fetch_artifacts(hash, &self.storage, &sink)
                .await?;
        }

        Ok(sentinel)
    }

    async fn resolve_hash(&self, input: InputSource) -> miette::Result<HashOutput> {
        if let Some(hash) = &self.hash_override {
            return Ok(HashOutput {
                hash: hash.clone(),
                file_hashes: Vec::new(),
            });
        }

        let text = input.read(&self.storage).await?;
        let output = Hasher::new(self.algorithm).hash(&text, &self.storage).await?;
        Ok(output)
    }
}
