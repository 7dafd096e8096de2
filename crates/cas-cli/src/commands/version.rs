//! The version command.

/// The line `cas version` prints.
#[must_use]
pub fn version_line() -> String {
    format!("cas {}", env!("CARGO_PKG_VERSION"))
}
