//! CLI commands for market-crawler.
//!
//! Supports the scheduled service, a single run, a local dry-run scrape and
//! a listing of the retention bucket.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;
use crate::scraper::{Extractor, PageExtractor};
use crate::storage::{ArtifactWriter, RetentionStore, SupabaseStorage};
use crate::transform::transform;

#[derive(Parser)]
#[command(name = "market-crawler")]
#[command(version, about = "Scrape country data into market-data CSV snapshots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run immediately, then on every interval until Ctrl-C
    Run {
        /// Interval override in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Run the pipeline once and print the run report
    Once,

    /// Scrape and write the CSV locally without uploading
    Scrape {
        /// Output directory (defaults to output.scratch_dir)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// List artifacts in the bucket, oldest first
    List,
}

/// Load configuration and fail early on unusable storage settings
fn load_config(require_storage: bool) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load().context("failed to load configuration")?;
    config.schedule.validate()?;
    if require_storage {
        config.storage.validate()?;
    }
    Ok(config)
}

fn build_scheduler(config: &AppConfig) -> Scheduler {
    let extractor = Arc::new(PageExtractor::new(config.source.clone()));
    let storage = Arc::new(SupabaseStorage::new(&config.storage));
    let pipeline = Pipeline::new(
        extractor,
        ArtifactWriter::new(config.output.scratch_dir.clone()),
        RetentionStore::new(storage, config.storage.max_artifacts),
    );
    Scheduler::new(pipeline, &config.schedule)
}

/// Run the scheduled service until Ctrl-C.
pub async fn run_service(interval: Option<u64>) -> anyhow::Result<()> {
    let mut config = load_config(true)?;

    if let Some(secs) = interval {
        config.schedule.interval_secs = secs;
        config.schedule.validate()?;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Source: {}", config.source.url);
    tracing::info!("Storage: {} (bucket {})", config.storage.url, config.storage.bucket);
    tracing::info!(
        "Keeping at most {} CSVs in the bucket (FIFO), every {}s",
        config.storage.max_artifacts,
        config.schedule.interval_secs
    );

    let scheduler = build_scheduler(&config);
    let handle = scheduler.shutdown_handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => handle.shutdown(),
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    scheduler.run().await;
    Ok(())
}

/// Run a single firing and print its report as JSON.
pub async fn run_once() -> anyhow::Result<()> {
    let config = load_config(true)?;
    let scheduler = build_scheduler(&config);

    let report = scheduler.fire_once().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.outcome.is_published() {
        anyhow::bail!("run did not publish an artifact: {:?}", report.outcome);
    }
    Ok(())
}

/// Scrape and write the artifact locally.
pub async fn run_scrape(output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(false)?;
    let started_at = Utc::now().naive_utc();

    let extraction = PageExtractor::new(config.source.clone())
        .extract()
        .await
        .context("extraction failed")?;

    for skipped in &extraction.skipped {
        eprintln!("Skipped row {}: {}", skipped.row_index, skipped.reason);
    }
    eprintln!(
        "Extracted {} rows ({} skipped)",
        extraction.rows.len(),
        extraction.skipped.len()
    );

    let records = transform(&extraction.rows, started_at);
    let dir = output.unwrap_or(config.output.scratch_dir);
    let artifact = ArtifactWriter::new(dir).write(&records, started_at)?;

    eprintln!("Wrote {} records", artifact.record_count);
    println!("{}", artifact.path.display());
    Ok(())
}

/// Print bucket artifacts in eviction order.
pub async fn run_list() -> anyhow::Result<()> {
    let config = load_config(true)?;
    let storage = Arc::new(SupabaseStorage::new(&config.storage));
    let bucket = storage.bucket().to_string();
    let retention = RetentionStore::new(storage, config.storage.max_artifacts);

    let names = retention.artifacts().await?;
    eprintln!(
        "{} of {} artifacts in bucket {}",
        names.len(),
        config.storage.max_artifacts,
        bucket
    );
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
