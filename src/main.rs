//! Market Crawler
//!
//! Scrapes the Worldometers country table, amplifies it into a market-data
//! CSV and keeps the latest snapshots in a Supabase Storage bucket.

mod cli;
mod config;
mod error;
mod pipeline;
mod scheduler;
mod scraper;
mod storage;
mod transform;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_crawler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { interval } => cli::run_service(interval).await,
        Commands::Once => cli::run_once().await,
        Commands::Scrape { output } => cli::run_scrape(output).await,
        Commands::List => cli::run_list().await,
    }
}
