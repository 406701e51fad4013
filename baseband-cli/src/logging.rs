//! Tracing-subscriber setup for the CLI binary.
//!
//! Library code (`baseband-core`) only ever calls `tracing::` macros; this
//! module is the one place a subscriber gets installed, matching the
//! usual split between what emits events and what formats them.

use clap::ValueEnum;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Logfmt,
    Pretty,
}

/// Install the global subscriber. `verbose` drops the default filter
/// from `info` to `debug` for the `baseband` crates; `RUST_LOG` still
/// overrides both if set.
pub fn init(format: LogFormat, verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        "baseband_core=debug,baseband_cli=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Logfmt => builder.compact().init(),
    }

    Ok(())
}
