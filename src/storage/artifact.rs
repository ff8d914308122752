//! CSV artifact writer for local scratch storage.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{ARTIFACT_EXTENSION, ARTIFACT_PREFIX};
use crate::error::WriteError;
use crate::types::CanonicalRecord;

/// A written snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub record_count: usize,
}

/// Writes record sets as `market_data_YYYYMMDD_HHMMSS.csv`
pub struct ArtifactWriter {
    scratch_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Artifact name for an instant; lexicographic order follows time order
    pub fn artifact_name(instant: NaiveDateTime) -> String {
        format!(
            "{}{}{}",
            ARTIFACT_PREFIX,
            instant.format("%Y%m%d_%H%M%S"),
            ARTIFACT_EXTENSION
        )
    }

    /// Serialize all records to a new artifact in the scratch directory
    pub fn write(
        &self,
        records: &[CanonicalRecord],
        instant: NaiveDateTime,
    ) -> Result<Artifact, WriteError> {
        if records.is_empty() {
            return Err(WriteError::EmptyInput);
        }

        std::fs::create_dir_all(&self.scratch_dir)?;

        let name = Self::artifact_name(instant);
        let path = self.scratch_dir.join(&name);
        Self::write_csv(&path, records)?;

        info!(artifact = %name, records = records.len(), "CSV created");

        Ok(Artifact {
            name,
            path,
            record_count: records.len(),
        })
    }

    /// Header comes from the record's serde field names
    fn write_csv(path: &Path, records: &[CanonicalRecord]) -> Result<(), WriteError> {
        let mut wtr = csv::Writer::from_path(path)?;
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
