//! offcache command-line control surface.
//!
//! Registers and unregisters the controller against the configured cache
//! database, inspects stores, and pushes single requests through the
//! controller. Results go to stdout as JSON, logs to stderr.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = args::Cli::parse();
    let output = commands::run(cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
