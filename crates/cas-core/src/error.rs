//! Error types shared across the cas crates

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for local storage and hashing operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error with optional path context
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(cas::core::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "list")
        operation: String,
    },

    /// A requested file does not exist
    #[error("file not found: {path}")]
    #[diagnostic(code(cas::core::not_found))]
    NotFound {
        /// The missing path
        path: String,
    },

    /// Configuration or validation error
    #[error("configuration error: {message}")]
    #[diagnostic(code(cas::core::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Unknown hashing algorithm name
    #[error("{name} is not supported")]
    #[diagnostic(
        code(cas::core::algorithm),
        help("supported algorithms: sha1, sha256, sha512, md5")
    )]
    UnsupportedAlgorithm {
        /// The requested algorithm name
        name: String,
    },

    /// A path that would escape its containing directory
    #[error("invalid path: {path}")]
    #[diagnostic(
        code(cas::core::invalid_path),
        help("archive entries must be relative and must not contain '..'")
    )]
    InvalidPath {
        /// The offending path
        path: String,
    },
}

impl Error {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an invalid path error
    #[must_use]
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
