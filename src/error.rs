//! Error types for each pipeline stage.
//!
//! Stage errors never escape a run: the pipeline catches them at the run
//! boundary and records them in the [`RunReport`](crate::types::RunReport).

use thiserror::Error;

/// Failures while driving the browser or locating the source table.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no <table> element appeared within {timeout_secs}s")]
    TableNotFound { timeout_secs: u64 },

    #[error("browser error: {0}")]
    Browser(String),
}

/// Failures while serializing records to a local CSV artifact.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("no records to write")]
    EmptyInput,

    #[error("I/O error writing artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error writing artifact: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures talking to the remote object store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to list bucket {bucket}: {reason}")]
    List { bucket: String, reason: String },

    #[error("failed to remove {names:?}: {reason}")]
    Delete { names: Vec<String>, reason: String },

    #[error("failed to upload {name}: {reason}")]
    Upload { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid or missing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("storage.url must start with http:// or https:// (got {0:?})")]
    InvalidStorageUrl(String),

    #[error("storage.key is not set (use CRAWLER_STORAGE__KEY or SUPABASE_KEY)")]
    MissingStorageKey,

    #[error("schedule.interval_secs must be at least 1 (got {0})")]
    InvalidInterval(u64),
}
