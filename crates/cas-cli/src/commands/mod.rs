//! Command implementations
//!
//! Each command is a struct holding its collaborators (local storage,
//! backend) so the binary and the tests construct them the same way.

mod artifact;
mod fetch;
mod hash;
mod read;
mod version;
mod write;

pub use artifact::Artifact;
pub use fetch::Fetch;
pub use hash::{DebugMode, HashFiles};
pub use read::ReadMeta;
pub use version::version_line;
pub use write::WriteMeta;

use std::collections::HashMap;
use tokio::io::AsyncReadExt;

use cas_core::{Error, ReadableStorage, Result};

/// Where a command's newline-delimited input list comes from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// A file, read through the local storage
    File(String),
    /// The process's standard input
    Stdin,
    /// Text supplied directly (tests)
    Literal(String),
}

impl InputSource {
    /// Read the whole input into a string.
    pub async fn read(self, storage: &dyn ReadableStorage) -> Result<String> {
        match self {
            InputSource::Literal(text) => Ok(text),
            InputSource::File(path) => {
                let content = storage.read_file(&path).await?;
                String::from_utf8(content.to_vec())
                    .map_err(|_| Error::configuration(format!("input file {path} is not UTF-8")))
            }
            InputSource::Stdin => {
                let mut buffer = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut buffer)
                    .await
                    .map_err(|e| Error::io_no_path(e, "read stdin"))?;
                Ok(buffer)
            }
        }
    }
}

/// Parse `key=value` arguments into a map.
pub fn parse_key_value_pairs(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut data = HashMap::with_capacity(pairs.len());

    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::configuration(format!(
                "expected key=value, got '{pair}'"
            )));
        };
        data.insert(key.to_string(), value.to_string());
    }

    Ok(data)
}
