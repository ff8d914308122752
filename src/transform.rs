//! Raw table rows to market-data records.
//!
//! Every row is amplified into [`REPLICATION_FACTOR`] records that differ
//! only in the replica suffix of `internal_id`. Downstream aggregation expects
//! this density, so the replicas are not duplicates to be collapsed.

use chrono::NaiveDateTime;

use crate::config::{CURRENCY_LABEL, REPLICATION_FACTOR};
use crate::types::{CanonicalRecord, RawRow};

/// Timestamp format shared with downstream consumers
pub const TRADE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ID_NAME_LEN: usize = 20;
const TICKER_LEN: usize = 10;

/// Transform rows into records stamped with `timestamp`
pub fn transform(rows: &[RawRow], timestamp: NaiveDateTime) -> Vec<CanonicalRecord> {
    let trade_timestamp = timestamp.format(TRADE_TIMESTAMP_FORMAT).to_string();
    let mut records = Vec::with_capacity(rows.len() * REPLICATION_FACTOR);

    for row in rows {
        let base_id = internal_id_base(row);
        let ticker = ticker(&row.name);
        let volume = row.population();
        let current_price = volume as f64 / 1_000_000.0;

        for replica in 0..REPLICATION_FACTOR {
            records.push(CanonicalRecord {
                internal_id: format!("{}_{:02}", base_id, replica),
                ticker: ticker.clone(),
                asset_type: row.region.clone(),
                current_price,
                volume,
                trade_timestamp: trade_timestamp.clone(),
                currency: CURRENCY_LABEL.to_string(),
            });
        }
    }

    records
}

/// `CSV_<NAME>_<idx>`: name uppercased, spaces to underscores, cut to 20 chars
fn internal_id_base(row: &RawRow) -> String {
    let name: String = row
        .name
        .to_uppercase()
        .replace(' ', "_")
        .chars()
        .take(ID_NAME_LEN)
        .collect();
    format!("CSV_{}_{:03}", name, row.row_index)
}

/// Name cut to 10 chars, then uppercased with spaces to underscores
fn ticker(name: &str) -> String {
    name.chars()
        .take(TICKER_LEN)
        .collect::<String>()
        .to_uppercase()
        .replace(' ', "_")
}
