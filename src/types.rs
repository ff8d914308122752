//! Row, record and run-report types shared across the pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One parsed row of the source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRow {
    pub rank: String,
    pub name: String,
    pub population_text: String,
    pub region: String,
    /// 1-based, counted after the header row
    pub row_index: usize,
}

impl RawRow {
    /// Population with thousands separators and whitespace removed; 0 if unparseable
    pub fn population(&self) -> u64 {
        normalize_population(&self.population_text)
    }
}

/// Strip `,` and whitespace, then parse. Anything unparseable becomes 0.
pub fn normalize_population(text: &str) -> u64 {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse().unwrap_or(0)
}

/// One emitted market-data record. Column names are the downstream CSV contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "ID_Interno")]
    pub internal_id: String,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Tipo_Ativo")]
    pub asset_type: String,
    #[serde(rename = "Preco_Atual", serialize_with = "serialize_price")]
    pub current_price: f64,
    #[serde(rename = "Volume_Negociado")]
    pub volume: u64,
    #[serde(rename = "Data_Negociacao")]
    pub trade_timestamp: String,
    #[serde(rename = "Moeda")]
    pub currency: String,
}

/// Whole prices are written without a trailing `.0` (`0`, `1`, `1425.887337`)
fn serialize_price<S: Serializer>(price: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if price.fract() == 0.0 && *price >= 0.0 && *price < MAX_EXACT {
        serializer.serialize_u64(*price as u64)
    } else {
        serializer.serialize_f64(*price)
    }
}

/// Why a table row was left out of the extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowSkipReason {
    TooFewCells { found: usize },
    MissingName,
}

impl fmt::Display for RowSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSkipReason::TooFewCells { found } => {
                write!(f, "expected at least 3 cells, found {}", found)
            }
            RowSkipReason::MissingName => write!(f, "name cell is empty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row_index: usize,
    pub reason: RowSkipReason,
}

/// Result of parsing the first table on the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableExtraction {
    pub rows: Vec<RawRow>,
    pub skipped: Vec<SkippedRow>,
}

/// How a single run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Published,
    /// Extraction succeeded but produced nothing to write
    NoData,
    ExtractFailed(String),
    WriteFailed(String),
    PublishFailed,
    /// Firing skipped because a previous run still holds the lease
    Overlapped,
}

impl RunOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, RunOutcome::Published)
    }
}

/// Run-level diagnostic summary
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: NaiveDateTime,
    pub rows_extracted: usize,
    pub skipped: Vec<SkippedRow>,
    pub records_emitted: usize,
    pub artifact: Option<String>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn new(started_at: NaiveDateTime) -> Self {
        Self {
            started_at,
            rows_extracted: 0,
            skipped: Vec::new(),
            records_emitted: 0,
            artifact: None,
            outcome: RunOutcome::NoData,
        }
    }
}
