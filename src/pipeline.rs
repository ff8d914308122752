//! One run: extract → transform → write → publish.
//!
//! Every stage error stops at this boundary and ends up in the returned
//! [`RunReport`]; nothing propagates to the scheduler.

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::WriteError;
use crate::scraper::Extractor;
use crate::storage::{ArtifactWriter, RetentionStore};
use crate::transform::transform;
use crate::types::{RunOutcome, RunReport};

pub struct Pipeline {
    extractor: Arc<dyn Extractor>,
    writer: ArtifactWriter,
    retention: RetentionStore,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        writer: ArtifactWriter,
        retention: RetentionStore,
    ) -> Self {
        Self {
            extractor,
            writer,
            retention,
        }
    }

    /// Execute a full run stamped with `started_at`
    pub async fn run(&self, started_at: NaiveDateTime) -> RunReport {
        let mut report = RunReport::new(started_at);
        info!(run = %started_at, "Starting scrape");

        let extraction = match self.extractor.extract().await {
            Ok(extraction) => extraction,
            Err(e) => {
                error!(run = %started_at, error = %e, "Extraction failed");
                report.outcome = RunOutcome::ExtractFailed(e.to_string());
                return report;
            }
        };

        report.rows_extracted = extraction.rows.len();
        report.skipped = extraction.skipped;

        let records = transform(&extraction.rows, started_at);
        report.records_emitted = records.len();
        info!(
            rows = report.rows_extracted,
            skipped = report.skipped.len(),
            records = report.records_emitted,
            "Extracted records"
        );

        let artifact = match self.writer.write(&records, started_at) {
            Ok(artifact) => artifact,
            Err(WriteError::EmptyInput) => {
                warn!(run = %started_at, "No data extracted, nothing to publish");
                report.outcome = RunOutcome::NoData;
                return report;
            }
            Err(e) => {
                error!(run = %started_at, error = %e, "Failed to write CSV");
                report.outcome = RunOutcome::WriteFailed(e.to_string());
                return report;
            }
        };
        report.artifact = Some(artifact.name.clone());

        report.outcome = if self.retention.publish(&artifact.path).await {
            info!(artifact = %artifact.name, "Run completed successfully");
            RunOutcome::Published
        } else {
            warn!(artifact = %artifact.name, "Run failed to publish");
            RunOutcome::PublishFailed
        };

        report
    }
}
