//! Log subscriber set-up.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global fmt subscriber, writing to stderr.
///
/// Without `-v` the filter comes from `RUST_LOG`, falling back to `warn`.
/// `-v` selects `debug` and `-vv` selects `trace`.
pub(crate) fn init(verbose: u8) -> Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn")),
        1 => EnvFilter::try_new("debug"),
        _ => EnvFilter::try_new("trace"),
    }
    .context("invalid log filter")?;

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
