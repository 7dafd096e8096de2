//! The hash command: print the fingerprint of a set of input files.

use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

use cas_backend::{Backend, DEBUG_HASHES_KEY};
use cas_core::{Algorithm, Error, Hasher, Storage};

use super::InputSource;

/// What to do with the intermediate per-file digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    /// Discard them
    #[default]
    Off,
    /// Write them to `cas-debug-<hash>.<algorithm>` in the working tree
    Local,
    /// Record them on the backend under `@debug/hashes`
    Store,
}

impl FromStr for DebugMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(DebugMode::Off),
            "local" => Ok(DebugMode::Local),
            "store" => Ok(DebugMode::Store),
            other => Err(Error::configuration(format!(
                "invalid debug mode '{other}', expected off | local | store"
            ))),
        }
    }
}

/// Generate a fingerprint for the files named by the input list
pub struct HashFiles<S> {
    pub storage: S,
    pub algorithm: Algorithm,
    pub debug: DebugMode,
    /// Only needed for `DebugMode::Store`
    pub backend: Option<Arc<dyn Backend>>,
}

impl<S: Storage> HashFiles<S> {
    /// Hash the input list and return the fingerprint to print.
    #[instrument(skip_all, fields(algorithm = %self.algorithm, debug = ?self.debug))]
    pub async fn run(&self, input: InputSource) -> miette::Result<String> {
        let text = input.read(&self.storage).await?;
        let output = Hasher::new(self.algorithm).hash(&text, &self.storage).await?;

        match self.debug {
            DebugMode::Off => {}
            DebugMode::Local => {
                let name = format!("cas-debug-{}.{}", output.hash, self.algorithm);
                self.storage
                    .write_file(&name, Utc::now(), Bytes::from(output.file_hashes.concat()))
                    .await?;
            }
            DebugMode::Store => {
                let backend = self.backend.as_ref().ok_or_else(|| {
                    Error::configuration("debug mode 'store' requires a backend")
                })?;
                let data = HashMap::from([(
                    DEBUG_HASHES_KEY.to_string(),
                    output.file_hashes.concat(),
                )]);
                backend.write_metadata(&output.hash, data).await?;
            }
        }

        Ok(output.hash)
    }
}
