//! # Tracing installer.
//!
//! Installs a `fmt` layer filtered by `RUST_LOG`, falling back to the given
//! directive when the variable is unset or unparsable. Output goes to stderr:
//! the sandbox's stdout carries protocol frames.
//!
//! ```no_run
//! sandrun::telemetry::init("sandrun=debug").ok();
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(default_directive: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
}
