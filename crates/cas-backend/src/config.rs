//! Backend configuration
//!
//! Credentials come from the environment, captured once into an immutable
//! value that is passed down; nothing deeper in the call tree reads the
//! environment.

use std::env;

/// Connection settings for an S3-compatible object store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Config {
    /// Custom endpoint URL, empty for the default AWS endpoints
    pub endpoint: String,
    /// Signing region
    pub region: String,

    /// Static access key id
    pub access_key: String,
    /// Static secret access key
    pub secret_key: String,

    /// Bucket holding the cache
    pub bucket: String,
    /// Key prefix inside the bucket, empty for the bucket root
    pub path_prefix: String,
}

impl S3Config {
    /// Capture the `CAS_S3_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            endpoint: env_or_default("CAS_S3_ENDPOINT"),
            region: env_or_default("CAS_S3_REGION"),
            access_key: env_or_default("CAS_S3_ACCESS_KEY"),
            secret_key: env_or_default("CAS_S3_SECRET_KEY"),
            bucket: env_or_default("CAS_S3_BUCKET"),
            path_prefix: env_or_default("CAS_S3_PATH_PREFIX"),
        }
    }
}

fn env_or_default(name: &str) -> String {
    env::var(name).unwrap_or_default()
}
