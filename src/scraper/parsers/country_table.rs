//! Country table parser for worldometers.info.
//!
//! Columns: rank, country (usually link-wrapped), population, region
//! (usually link-wrapped). Only the first `<table>` in the document is read.

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::config::FALLBACK_REGION;
use crate::types::{RawRow, RowSkipReason, SkippedRow, TableExtraction};

/// Minimum cells for a row to be considered data
const MIN_CELLS: usize = 3;

/// Parser for the countries-of-the-world table
pub struct CountryTableParser;

impl CountryTableParser {
    /// Parse rendered page HTML into typed rows.
    ///
    /// A missing table yields an empty extraction, not an error; the browser
    /// layer has already checked that a table rendered.
    pub fn parse(html: &str) -> TableExtraction {
        let document = Html::parse_document(html);
        let mut extraction = TableExtraction::default();

        let Ok(table_selector) = Selector::parse("table") else {
            return extraction;
        };
        let Some(table) = document.select(&table_selector).next() else {
            return extraction;
        };

        let row_selector = Selector::parse("tr").unwrap();
        let cell_selector = Selector::parse("td, th").unwrap();
        let link_selector = Selector::parse("a").unwrap();

        // Skip header
        for (row_index, row) in table.select(&row_selector).enumerate().skip(1) {
            let cells: Vec<_> = row.select(&cell_selector).collect();

            match Self::parse_row(&cells, &link_selector, row_index) {
                Ok(raw) => extraction.rows.push(raw),
                Err(reason) => {
                    warn!(row_index, %reason, "Skipping table row");
                    extraction.skipped.push(SkippedRow { row_index, reason });
                }
            }
        }

        extraction
    }

    fn parse_row(
        cells: &[ElementRef],
        link_selector: &Selector,
        row_index: usize,
    ) -> Result<RawRow, RowSkipReason> {
        if cells.len() < MIN_CELLS {
            return Err(RowSkipReason::TooFewCells { found: cells.len() });
        }

        let name = Self::link_or_cell_text(&cells[1], link_selector);
        if name.is_empty() {
            return Err(RowSkipReason::MissingName);
        }

        let region = cells
            .get(3)
            .map(|cell| Self::link_or_cell_text(cell, link_selector))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| FALLBACK_REGION.to_string());

        Ok(RawRow {
            rank: Self::cell_text(&cells[0]),
            name,
            population_text: Self::cell_text(&cells[2]),
            region,
            row_index,
        })
    }

    /// Text of the first nested link, falling back to the whole cell
    fn link_or_cell_text(cell: &ElementRef, link_selector: &Selector) -> String {
        match cell.select(link_selector).next() {
            Some(link) => Self::cell_text(&link),
            None => Self::cell_text(cell),
        }
    }

    fn cell_text(element: &ElementRef) -> String {
        element.text().collect::<String>().trim().to_string()
    }
}
