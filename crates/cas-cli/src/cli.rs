//! Argument parsing for the `cas` binary

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "cas",
    version,
    about = "Content-addressed artifact cache for build pipelines"
)]
pub struct Cli {
    /// Backend storing cache entries
    #[arg(long, global = true, default_value = "s3", env = "CAS_BACKEND")]
    pub backend: String,

    /// Log verbosity written to stderr (trace | debug | info | warn | error)
    #[arg(long, global = true, default_value = "warn")]
    pub level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch state and artifacts for a set of input files
    ///
    /// Prints the state sentinel path; its modification time is the cache
    /// entry's creation time, for build drivers to stat.
    Fetch {
        /// File listing input paths, one per line; stdin when omitted
        input: Option<String>,

        /// Directory holding local state sentinels
        #[arg(long, default_value = ".cas/state")]
        state_path: String,

        /// Hashing algorithm for the fingerprint
        #[arg(long, default_value = "sha256")]
        algorithm: String,

        /// Record the per-file digests under @debug/hashes
        #[arg(long)]
        debug: bool,
    },

    /// Upload local files as the artifacts of a hash
    Artifact {
        /// Fingerprint, or the sentinel path fetch printed
        hash: String,

        /// Local paths to upload
        #[arg(required = true)]
        paths: Vec<String>,

        /// Directory holding local state sentinels
        #[arg(long, default_value = ".cas/state")]
        state_path: String,
    },

    /// Print the fingerprint of a set of input files
    Hash {
        /// File listing input paths, one per line; stdin when omitted
        input: Option<String>,

        /// Hashing algorithm for the fingerprint
        #[arg(long, default_value = "sha256")]
        algorithm: String,

        /// Keep intermediate per-file digests: off | local | store
        #[arg(long, default_value = "off")]
        debug: String,
    },

    /// Read metadata recorded for a hash
    Read {
        /// Fingerprint to read
        hash: String,

        /// Keys to read; every key when omitted
        keys: Vec<String>,
    },

    /// Write key=value metadata pairs for a hash
    Write {
        /// Fingerprint to write under
        hash: String,

        /// key=value pairs to record
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Print the version number
    Version,
}
