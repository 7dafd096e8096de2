//! Object-store realization of the backend protocol
//!
//! Entries live under two fixed key spaces below the configured prefix:
//!
//! ```text
//! <prefix>/meta/<hash>/<key>           metadata value, raw bytes
//! <prefix>/artifact/<hash>/<relPath>   artifact blob, metadata sha1=<hex>
//! ```
//!
//! Every operation fans its per-key or per-path requests out concurrently
//! and settles them all before returning; partial successes are reported
//! through the aggregate error alongside the failures.

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use futures::TryStreamExt;
use futures::stream;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, ObjectStore, PutOptions, PutPayload,
};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use async_trait::async_trait;

use crate::{
    ArtifactSink, Backend, BackendError, Result, S3Config, TIMESTAMP_KEY,
};
use cas_core::ReadableStorage;

/// Upper bound on in-flight requests per operation
const MAX_CONCURRENT_REQUESTS: usize = 16;

/// Object metadata key carrying an artifact's content digest.
///
/// Always sha1, independent of the fingerprint algorithm: the tag is part
/// of the wire contract, and changing the fingerprint algorithm must not
/// invalidate skip detection for existing entries.
const SHA1_ATTRIBUTE: &str = "sha1";

/// Backend over any `object_store` implementation
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreBackend {
    /// Wrap an object store, scoping all keys below `prefix`.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Connect to an S3-compatible store described by `config`.
    pub fn from_s3_config(config: &S3Config) -> Result<Self> {
        use object_store::aws::AmazonS3Builder;

        let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);

        if !config.region.is_empty() {
            builder = builder.with_region(&config.region);
        }
        if !config.endpoint.is_empty() {
            builder = builder
                .with_endpoint(&config.endpoint)
                .with_allow_http(config.endpoint.starts_with("http://"));
        }
        if !config.access_key.is_empty() {
            builder = builder.with_access_key_id(&config.access_key);
        }
        if !config.secret_key.is_empty() {
            builder = builder.with_secret_access_key(&config.secret_key);
        }

        let store = builder
            .build()
            .map_err(|e| BackendError::configuration(e.to_string()))?;

        Ok(Self::new(Arc::new(store), config.path_prefix.clone()))
    }

    fn scoped(&self, rest: String) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(rest)
        } else {
            ObjectPath::from(format!("{}/{rest}", self.prefix))
        }
    }

    fn metadata_prefix(&self, hash: &str) -> ObjectPath {
        self.scoped(format!("meta/{hash}"))
    }

    fn metadata_path(&self, hash: &str, key: &str) -> ObjectPath {
        self.scoped(format!("meta/{hash}/{key}"))
    }

    fn artifact_prefix(&self, hash: &str) -> ObjectPath {
        self.scoped(format!("artifact/{hash}"))
    }

    fn artifact_path(&self, hash: &str, rel_path: &str) -> ObjectPath {
        self.scoped(format!("artifact/{hash}/{rel_path}"))
    }

    async fn has_metadata(&self, hash: &str, key: &str) -> Result<bool> {
        let location = self.metadata_path(hash, key);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(BackendError::transport("head", location.to_string(), e)),
        }
    }

    #[instrument(skip(self))]
    async fn list_metadata_keys(&self, hash: &str) -> Result<Vec<String>> {
        let prefix = self.metadata_prefix(hash);
        let mut objects = self.store.list(Some(&prefix));

        let mut keys = Vec::new();
        while let Some(meta) = objects
            .try_next()
            .await
            .map_err(|e| BackendError::transport("list", prefix.to_string(), e))?
        {
            if let Some(name) = meta.location.filename() {
                keys.push(name.to_string());
            }
        }

        debug!(hash, keys_found = keys.len(), "listed metadata keys");

        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn list_artifact_paths(&self, hash: &str) -> Result<Vec<String>> {
        let prefix = self.artifact_prefix(hash);
        let mut objects = self.store.list(Some(&prefix));

        let mut paths = Vec::new();
        while let Some(meta) = objects
            .try_next()
            .await
            .map_err(|e| BackendError::transport("list", prefix.to_string(), e))?
        {
            if let Some(parts) = meta.location.prefix_match(&prefix) {
                let rel = parts
                    .map(|part| part.as_ref().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                if !rel.is_empty() {
                    paths.push(rel);
                }
            }
        }

        debug!(hash, artifacts_found = paths.len(), "listed artifact paths");

        Ok(paths)
    }
}

fn sha1_hex(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

fn sha1_attribute() -> Attribute {
    Attribute::Metadata(SHA1_ATTRIBUTE.into())
}

/// Split fan-out results into successes and failures, turning any failure
/// into the aggregate error that still carries the partial successes.
fn settle<T>(results: Vec<Result<T>>, label: impl Fn(&T) -> String) -> Result<Vec<T>> {
    let mut written = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(value) => written.push(value),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(written)
    } else {
        let labels = written.iter().map(&label).collect();
        Err(BackendError::aggregate(errors, labels))
    }
}

#[async_trait]
impl Backend for ObjectStoreBackend {
    #[instrument(skip(self, data), fields(pairs = data.len()))]
    async fn write_metadata(
        &self,
        hash: &str,
        mut data: HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        // The timestamp is written once per entry; a HEAD decides whether
        // this call is the one creating the entry.
        let has_timestamp = self.has_metadata(hash, TIMESTAMP_KEY).await?;
        if !has_timestamp && !data.contains_key(TIMESTAMP_KEY) {
            data.insert(
                TIMESTAMP_KEY.to_string(),
                Utc::now().timestamp().to_string(),
            );
        }

        debug!(hash, has_timestamp, pairs = data.len(), "writing metadata");

        let pairs: Vec<(String, String)> = data
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let results: Vec<Result<String>> = stream::iter(pairs.into_iter().map(|(key, value)| {
            let location = self.metadata_path(hash, &key);
            let payload = PutPayload::from(Bytes::from(value.into_bytes()));
            async move {
                self.store
                    .put(&location, payload)
                    .await
                    .map_err(|e| BackendError::transport("put", location.to_string(), e))?;
                Ok(key.clone())
            }
        }))
        .buffer_unordered(MAX_CONCURRENT_REQUESTS)
        .collect()
        .await;

        let keys = settle(results, Clone::clone)?;

        Ok(keys
            .into_iter()
            .filter_map(|key| {
                let value = data.get(&key)?.clone();
                Some((key, value))
            })
            .collect())
    }

    #[instrument(skip(self, keys), fields(keys_requested = keys.len()))]
    async fn read_metadata(
        &self,
        hash: &str,
        keys: &[String],
    ) -> Result<HashMap<String, String>> {
        let keys = if keys.is_empty() {
            self.list_metadata_keys(hash).await?
        } else {
            keys.to_vec()
        };

        let results: Vec<Result<(String, Option<String>)>> =
            stream::iter(keys.into_iter().map(|key| {
                let location = self.metadata_path(hash, &key);
                async move {
                    match self.store.get(&location).await {
                        Ok(response) => {
                            let content = response.bytes().await.map_err(|e| {
                                BackendError::transport("get", location.to_string(), e)
                            })?;
                            let value = String::from_utf8(content.to_vec())
                                .map_err(|e| BackendError::invalid_metadata(&key, e))?;
                            Ok((key, Some(value)))
                        }
                        // An absent key is not an error, just no result.
                        Err(object_store::Error::NotFound { .. }) => Ok((key, None)),
                        Err(e) => Err(BackendError::transport("get", location.to_string(), e)),
                    }
                }
            }))
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let pairs = settle(results, |(key, _)| key.clone())?;

        Ok(pairs
            .into_iter()
            .filter_map(|(key, value)| Some((key, value?)))
            .collect())
    }

    #[instrument(skip(self, storage, paths), fields(paths = paths.len()))]
    async fn store_artifacts(
        &self,
        storage: &dyn ReadableStorage,
        hash: &str,
        paths: &[String],
    ) -> Result<Vec<String>> {
        // Ensure the entry exists before any blob lands under it.
        self.write_metadata(hash, HashMap::new()).await?;

        let results: Vec<Result<String>> = stream::iter(paths.to_vec().into_iter().map(|path| {
            let location = self.artifact_path(hash, &path);
            async move {
                let content = storage.read_file(&path).await?;
                let digest = sha1_hex(&content);

                let mut attributes = Attributes::new();
                attributes.insert(sha1_attribute(), AttributeValue::from(digest.clone()));
                let mut options = PutOptions::default();
                options.attributes = attributes;

                self.store
                    .put_opts(&location, PutPayload::from(content), options)
                    .await
                    .map_err(|e| BackendError::transport("put", location.to_string(), e))?;

                debug!(
                    local_path = %path,
                    remote_path = %location,
                    sha1 = %digest,
                    "stored artifact"
                );

                Ok(path.clone())
            }
        }))
        .buffer_unordered(MAX_CONCURRENT_REQUESTS)
        .collect()
        .await;

        settle(results, Clone::clone)
    }

    #[instrument(skip(self, local, sink))]
    async fn fetch_artifacts(
        &self,
        hash: &str,
        local: &dyn ReadableStorage,
        sink: &dyn ArtifactSink,
    ) -> Result<()> {
        let paths = self.list_artifact_paths(hash).await?;

        let results: Vec<Result<String>> = stream::iter(paths.into_iter().map(|rel_path| {
            let location = self.artifact_path(hash, &rel_path);
            async move {
                let local_content = match local.read_file(&rel_path).await {
                    Ok(content) => Some(content),
                    Err(cas_core::Error::NotFound { .. }) => None,
                    Err(e) => return Err(e.into()),
                };

                let mut download = true;
                if let Some(existing) = &local_content {
                    let local_sha1 = sha1_hex(existing);

                    let mut options = GetOptions::default();
                    options.head = true;
                    let head = self
                        .store
                        .get_opts(&location, options)
                        .await
                        .map_err(|e| BackendError::transport("head", location.to_string(), e))?;

                    let remote_sha1 = head
                        .attributes
                        .get(&sha1_attribute())
                        .map(|value| value.as_ref().to_string());

                    download = remote_sha1.as_deref() != Some(local_sha1.as_str());

                    debug!(
                        local_path = %rel_path,
                        remote_path = %location,
                        local_sha1 = %local_sha1,
                        remote_sha1 = ?remote_sha1,
                        download,
                        "artifact skip check"
                    );
                }

                if download {
                    let response = self
                        .store
                        .get(&location)
                        .await
                        .map_err(|e| BackendError::transport("get", location.to_string(), e))?;
                    let content = response
                        .bytes()
                        .await
                        .map_err(|e| BackendError::transport("get", location.to_string(), e))?;

                    sink.write(&rel_path, content).await?;
                }

                Ok(rel_path)
            }
        }))
        .buffer_unordered(MAX_CONCURRENT_REQUESTS)
        .collect()
        .await;

        settle(results, Clone::clone).map(|_| ())
    }
}
