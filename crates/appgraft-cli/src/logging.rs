//! Process-wide logging setup.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter used when `-v` is given or `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "appgraft=info,appgraft_cli=info",
        1 => "appgraft=debug,appgraft_cli=debug",
        _ => "trace",
    }
}

/// Installs the global subscriber and forwards `log` records into it.
///
/// `-v` takes precedence over `RUST_LOG`.
pub fn init(format: LogFormat, verbosity: u8) -> Result<()> {
    let filter = if verbosity > 0 {
        EnvFilter::new(default_directive(verbosity))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(0)))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
        ),
    }
    .context("Failed to install tracing subscriber")?;

    tracing_log::LogTracer::init().context("Failed to forward log records")?;
    Ok(())
}
