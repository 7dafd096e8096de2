//! Error types for backend operations

use miette::Diagnostic;
use thiserror::Error;

/// Error type for remote backend operations
#[derive(Error, Debug, Diagnostic)]
pub enum BackendError {
    /// A single object store request failed
    #[error("object store {operation} failed for {key}")]
    #[diagnostic(code(cas::backend::transport))]
    Transport {
        /// The request kind ("put", "get", "head", "list")
        operation: String,
        /// The object key the request targeted
        key: String,
        /// The underlying object store error
        #[source]
        source: object_store::Error,
    },

    /// A stored `@timestamp` value that does not parse as epoch seconds
    #[error("invalid timestamp {value:?} recorded for {hash}")]
    #[diagnostic(code(cas::backend::timestamp))]
    InvalidTimestamp {
        /// The entry whose timestamp is malformed
        hash: String,
        /// The raw stored value
        value: String,
    },

    /// A metadata value that is not valid UTF-8
    #[error("metadata value for {key} is not valid UTF-8")]
    #[diagnostic(code(cas::backend::metadata))]
    InvalidMetadata {
        /// The metadata key
        key: String,
        /// The decoding failure
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Backend construction failed
    #[error("invalid backend configuration: {message}")]
    #[diagnostic(
        code(cas::backend::config),
        help("check the CAS_S3_* environment variables")
    )]
    Configuration {
        /// What was wrong with the configuration
        message: String,
    },

    /// Unknown backend name
    #[error("unsupported backend '{name}'")]
    #[diagnostic(code(cas::backend::unsupported), help("supported backends: s3"))]
    UnsupportedBackend {
        /// The requested backend name
        name: String,
    },

    /// Local storage failure while talking to the backend
    #[error(transparent)]
    #[diagnostic(transparent)]
    Storage(#[from] cas_core::Error),

    /// One or more sub-operations of a fan-out failed
    ///
    /// `written` holds the sub-operations that did succeed, so callers can
    /// recover partial progress or report it.
    #[error("{} of {} backend operations failed", errors.len(), errors.len() + written.len())]
    #[diagnostic(code(cas::backend::aggregate))]
    Aggregate {
        /// Every sub-operation failure, with its per-task context
        #[related]
        errors: Vec<BackendError>,
        /// The sub-operations that succeeded
        written: Vec<String>,
    },
}

impl BackendError {
    /// Create a transport error for a single object store request
    #[must_use]
    pub fn transport(
        operation: impl Into<String>,
        key: impl Into<String>,
        source: object_store::Error,
    ) -> Self {
        Self::Transport {
            operation: operation.into(),
            key: key.into(),
            source,
        }
    }

    /// Create an invalid timestamp error
    #[must_use]
    pub fn invalid_timestamp(hash: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            hash: hash.into(),
            value: value.into(),
        }
    }

    /// Create an invalid metadata error
    #[must_use]
    pub fn invalid_metadata(key: impl Into<String>, source: std::string::FromUtf8Error) -> Self {
        Self::InvalidMetadata {
            key: key.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported backend error
    #[must_use]
    pub fn unsupported_backend(name: impl Into<String>) -> Self {
        Self::UnsupportedBackend { name: name.into() }
    }

    /// Aggregate fan-out failures together with the partial successes
    #[must_use]
    pub fn aggregate(errors: Vec<BackendError>, written: Vec<String>) -> Self {
        Self::Aggregate { errors, written }
    }
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
