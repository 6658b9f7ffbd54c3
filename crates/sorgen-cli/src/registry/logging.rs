use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::error::{CliError, CliResult};

/// JSON events into the run's `logs.ndjson` plus human-readable events on
/// stderr filtered by `RUST_LOG` (default `info`).
pub fn init_run_logging(path: &Path) -> CliResult<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer())
        .try_init()
        .map_err(|err| CliError::Logging(err.to_string()))
}

/// Stderr-only logging for commands that produce no run directory.
pub fn init_stderr_logging() -> CliResult<()> {
    tracing_subscriber::registry()
        .with(stderr_layer())
        .try_init()
        .map_err(|err| CliError::Logging(err.to_string()))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(filter)
}
