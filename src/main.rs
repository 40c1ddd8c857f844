//! matchdex
//!
//! Finds finished matches of a football competition through the public
//! sports-data API and records them in a CSV index.

mod cli;
mod config;
mod discover;
mod retry;
mod scraper;
mod storage;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchdex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Discover {
            competition,
            seasons,
            delay,
            index_path,
        } => cli::run_discover(competition, seasons, delay, index_path).await,
        Commands::Seasons {
            competition,
            seasons,
        } => cli::run_seasons(competition, seasons).await,
        Commands::Competitions => cli::run_competitions(),
    }
}
