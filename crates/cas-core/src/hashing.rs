//! Fingerprinting pipeline
//!
//! A fingerprint is built in two passes: every input file is digested on
//! its own, the per-file digests are rendered as coreutils-style
//! `"<hex>  <path>"` lines, and the sorted lines are digested again to
//! produce the final hash. Sorting makes the fingerprint independent of
//! the order in which a caller enumerates its files, so `find` output does
//! not need to be stable across machines.

use digest::DynDigest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::storage::ReadableStorage;
use crate::{Error, Result};

/// Supported fingerprint algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    Sha1,
    #[default]
    Sha256,
    Sha512,
    Md5,
}

impl Algorithm {
    /// Every supported algorithm, in documentation order.
    #[must_use]
    pub fn all() -> [Algorithm; 4] {
        [
            Algorithm::Sha1,
            Algorithm::Sha256,
            Algorithm::Sha512,
            Algorithm::Md5,
        ]
    }

    /// A fresh digest instance for this algorithm.
    #[must_use]
    pub fn digest(self) -> Box<dyn DynDigest> {
        match self {
            Algorithm::Sha1 => Box::new(Sha1::default()),
            Algorithm::Sha256 => Box::new(Sha256::default()),
            Algorithm::Sha512 => Box::new(Sha512::default()),
            Algorithm::Md5 => Box::new(Md5::default()),
        }
    }

    /// Hex digest of a single byte slice.
    #[must_use]
    pub fn hex_digest(self, data: &[u8]) -> String {
        let mut hasher = self.digest();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
            Algorithm::Md5 => "md5",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            "md5" => Ok(Algorithm::Md5),
            other => Err(Error::UnsupportedAlgorithm {
                name: other.to_string(),
            }),
        }
    }
}

/// Result of hashing an input list
#[derive(Debug, Clone)]
pub struct HashOutput {
    /// The final fingerprint, hex encoded
    pub hash: String,
    /// One `"<hex>  <path>\n"` line per input file, sorted
    pub file_hashes: Vec<String>,
}

/// Hashes a newline-delimited list of file paths into a fingerprint
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    algorithm: Algorithm,
}

impl Hasher {
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    /// Hash every file named by a non-empty line of `input`.
    ///
    /// File contents are read through `storage`, so the same paths hash the
    /// same whether they live on disk or in a test store. Any read failure
    /// aborts the whole hash with the offending path attached.
    #[instrument(skip_all, fields(algorithm = %self.algorithm))]
    pub async fn hash(&self, input: &str, storage: &dyn ReadableStorage) -> Result<HashOutput> {
        let mut file_hashes = Vec::new();

        for line in input.lines() {
            let path = line.trim();
            if path.is_empty() {
                continue;
            }

            let content = storage.read_file(path).await?;
            let digest = self.algorithm.hex_digest(&content);
            file_hashes.push(format!("{digest}  {path}\n"));
        }

        file_hashes.sort();

        let mut outer = self.algorithm.digest();
        for line in &file_hashes {
            outer.update(line.as_bytes());
        }
        let hash = hex::encode(outer.finalize());

        debug!(files_hashed = file_hashes.len(), hash, "hashed input list");

        Ok(HashOutput { hash, file_hashes })
    }
}
