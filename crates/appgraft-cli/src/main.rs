//! `appgraft` command-line entry point.

use anyhow::{Context, Result};
use clap::Parser;

use appgraft::{Settings, WorkflowContext};

mod cli;
mod commands;
mod logging;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose)?;

    let settings =
        Settings::load_with(cli.settings.as_deref()).context("Failed to load settings")?;

    tracing::debug!(repo = %cli.repo.display(), "Starting");
    let ctx = WorkflowContext::new(settings, &cli.repo);
    commands::run(cli.command, ctx).await
}
