//! Tracing setup for the `cas` binary
//!
//! Libraries only emit spans and events; the subscriber is installed once
//! here. `RUST_LOG` takes precedence over the `--level` flag.

use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber, filtering the cas crates at `level`.
pub fn init(level: &str) -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "cas_cli={level},cas_core={level},cas_storage={level},cas_backend={level}"
            ))
        })
        .map_err(|e| miette::miette!("failed to create tracing filter: {e}"))?;

    let format = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();

    Ok(())
}
