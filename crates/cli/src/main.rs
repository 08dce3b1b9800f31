//! gleaner command-line entry point.
//!
//! Command reports are printed to stdout as JSON; logs go to stderr so the
//! two streams can be piped separately.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = cli::Cli::parse();
    let config = gleaner_core::AppConfig::load()?;
    tracing::debug!(db_path = %config.db_path.display(), "configuration loaded");

    let app = commands::App::open(config).await?;
    let report = app.execute(args.command).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
