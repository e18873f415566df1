//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; the workflow's narrative output
//! is written separately to stdout, so the default filter keeps stderr quiet
//! unless something goes wrong. `RUST_LOG` overrides the filter.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_FILTER: &str = "warn";

/// Build the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the stderr subscriber.
///
/// Calling this twice is harmless; the second installation is ignored.
pub fn init_stderr_logging() {
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
    {
        tracing::debug!(%error, "subscriber already installed");
    }
}
