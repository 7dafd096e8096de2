//! The read command: print metadata recorded for a hash.

use std::sync::Arc;
use tracing::instrument;

use cas_backend::Backend;

/// Read metadata values for a fingerprint
pub struct ReadMeta {
    pub backend: Arc<dyn Backend>,
}

impl ReadMeta {
    /// Read the named keys (every key when none are given), sorted for
    /// stable output.
    #[instrument(skip_all, fields(hash = %hash, keys = keys.len()))]
    pub async fn run(&self, hash: &str, keys: &[String]) -> miette::Result<Vec<(String, String)>> {
        let meta = self.backend.read_metadata(hash, keys).await?;

        let mut pairs: Vec<_> = meta.into_iter().collect();
        pairs.sort();

        Ok(pairs)
    }
}
