//! The write command: record key=value metadata pairs for a hash.

use std::sync::Arc;
use tracing::instrument;

use cas_backend::Backend;

use super::parse_key_value_pairs;

/// Write metadata values for a fingerprint
pub struct WriteMeta {
    pub backend: Arc<dyn Backend>,
}

impl WriteMeta {
    /// Parse the `key=value` arguments, store them, and return the pairs
    /// actually written (sorted for stable output).
    #[instrument(skip_all, fields(hash = %hash, pairs = pairs.len()))]
    pub async fn run(&self, hash: &str, pairs: &[String]) -> miette::Result<Vec<(String, String)>> {
        let data = parse_key_value_pairs(pairs)?;

        let written = self.backend.write_metadata(hash, data).await?;

        let mut out: Vec<_> = written.into_iter().collect();
        out.sort();

        Ok(out)
    }
}
