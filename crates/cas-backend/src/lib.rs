//! Remote backend protocol for the cas artifact cache.
//!
//! A [`Backend`] stores two things per fingerprint: string metadata keyed
//! by name (where the reserved `@timestamp` key defines the entry's
//! existence), and artifact blobs keyed by relative path. The concrete
//! [`ObjectStoreBackend`] lays both out under an S3-compatible object
//! store; other realizations plug in behind the same trait.

mod config;
mod error;
mod object;

pub use config::S3Config;
pub use error::{BackendError, Result};
pub use object::ObjectStoreBackend;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use cas_core::{ReadableStorage, WritableStorage};

/// Metadata key holding an entry's creation time as decimal epoch seconds.
///
/// Its presence defines the entry's existence; it is written once and
/// never rewritten by readers.
pub const TIMESTAMP_KEY: &str = "@timestamp";

/// Metadata key holding the newline-joined per-file digest lines, written
/// only when debugging fingerprints.
pub const DEBUG_HASHES_KEY: &str = "@debug/hashes";

/// Remote store for cache entries, addressed by fingerprint
#[async_trait]
pub trait Backend: Send + Sync {
    /// Store each pair under the entry, synthesizing `@timestamp` when the
    /// entry has none and the input does not supply one. Returns the subset
    /// of pairs actually written.
    async fn write_metadata(
        &self,
        hash: &str,
        data: HashMap<String, String>,
    ) -> Result<HashMap<String, String>>;

    /// Read metadata values. Empty `keys` means every key under the entry;
    /// otherwise exactly the named keys that exist. Missing keys are
    /// silently omitted; only transport failures surface.
    async fn read_metadata(
        &self,
        hash: &str,
        keys: &[String],
    ) -> Result<HashMap<String, String>>;

    /// Upload `paths` from the given local storage as the entry's
    /// artifacts, ensuring `@timestamp` exists first. Returns the paths
    /// whose uploads succeeded.
    async fn store_artifacts(
        &self,
        storage: &dyn ReadableStorage,
        hash: &str,
        paths: &[String],
    ) -> Result<Vec<String>>;

    /// Deliver every artifact under the entry through `sink`, skipping
    /// artifacts whose local copy (read via `local`) already matches the
    /// remote content hash.
    async fn fetch_artifacts(
        &self,
        hash: &str,
        local: &dyn ReadableStorage,
        sink: &dyn ArtifactSink,
    ) -> Result<()>;
}

/// Write direction for fetched artifacts, injected at call time.
///
/// The backend never owns a writable storage; orchestrators bind whatever
/// destination and modification time they want behind this seam.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Deliver one artifact.
    async fn write(&self, path: &str, content: Bytes) -> cas_core::Result<()>;
}

/// An [`ArtifactSink`] that writes through a local storage with a fixed
/// modification time, so every restored artifact of an entry carries the
/// entry's original timestamp.
pub struct TimestampedSink<'a, S> {
    storage: &'a S,
    mtime: DateTime<Utc>,
}

impl<'a, S> TimestampedSink<'a, S> {
    pub fn new(storage: &'a S, mtime: DateTime<Utc>) -> Self {
        Self { storage, mtime }
    }
}

#[async_trait]
impl<S: WritableStorage> ArtifactSink for TimestampedSink<'_, S> {
    async fn write(&self, path: &str, content: Bytes) -> cas_core::Result<()> {
        self.storage.write_file(path, self.mtime, content).await
    }
}

/// Read an entry's creation time, `None` when the entry does not exist.
pub async fn read_timestamp(
    backend: &dyn Backend,
    hash: &str,
) -> Result<Option<DateTime<Utc>>> {
    let meta = backend
        .read_metadata(hash, &[TIMESTAMP_KEY.to_string()])
        .await?;

    let Some(raw) = meta.get(TIMESTAMP_KEY) else {
        return Ok(None);
    };

    let seconds: i64 = raw
        .trim()
        .parse()
        .map_err(|_| BackendError::invalid_timestamp(hash, raw))?;

    let ts = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| BackendError::invalid_timestamp(hash, raw))?;

    Ok(Some(ts))
}

/// Create an entry by recording its `@timestamp`.
pub async fn create_entry(
    backend: &dyn Backend,
    hash: &str,
    ts: DateTime<Utc>,
) -> Result<()> {
    let data = HashMap::from([(TIMESTAMP_KEY.to_string(), ts.timestamp().to_string())]);
    backend.write_metadata(hash, data).await.map(|_| ())
}

/// The current time truncated to whole seconds, the resolution the wire
/// format stores.
#[must_use]
pub fn now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

/// Resolve a backend by name.
///
/// The `s3` backend reads its connection settings from the environment;
/// unknown names fail with the supported set in the error.
pub fn from_name(name: &str) -> Result<Arc<dyn Backend>> {
    match name.to_ascii_lowercase().as_str() {
        "s3" => {
            let config = S3Config::from_env();
            Ok(Arc::new(ObjectStoreBackend::from_s3_config(&config)?))
        }
        other => Err(BackendError::unsupported_backend(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_name_is_rejected() {
        let err = match from_name("carrier-pigeon") {
            Err(err) => err,
            Ok(_) => panic!("expected an unsupported backend error"),
        };
        assert!(matches!(err, BackendError::UnsupportedBackend { name } if name == "carrier-pigeon"));
    }

    #[test]
    fn now_seconds_has_no_subsecond_part() {
        assert_eq!(now_seconds().timestamp_subsec_nanos(), 0);
    }
}
