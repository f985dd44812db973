mod auth;
mod ci;
mod cli;
mod config;
mod devflow;
mod error;
mod gitlab;
mod outcome;
mod output;
mod portfolio;
mod stats;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting devlens");
    cli.execute().await?;

    Ok(())
}
