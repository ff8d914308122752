//! Page extraction: browser session plus table parsing.

use async_trait::async_trait;
use tracing::{debug, info};

use super::browser::Browser;
use super::parsers::CountryTableParser;
use crate::config::SourceConfig;
use crate::error::ExtractError;
use crate::types::TableExtraction;

/// Source of raw table rows for a run
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self) -> Result<TableExtraction, ExtractError>;
}

/// Extracts the country table through a fresh headless browser per call
pub struct PageExtractor {
    source: SourceConfig,
}

impl PageExtractor {
    pub fn new(source: SourceConfig) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Extractor for PageExtractor {
    async fn extract(&self) -> Result<TableExtraction, ExtractError> {
        info!(url = %self.source.url, "Connecting to source page");

        let browser = Browser::launch(&self.source).await?;
        let fetched = browser.fetch_table_page(&self.source).await;

        // Released on both paths
        browser.close().await;
        debug!("Browser closed");

        let html = fetched?;
        let extraction = CountryTableParser::parse(&html);

        info!(
            rows = extraction.rows.len(),
            skipped = extraction.skipped.len(),
            "Parsed source table"
        );

        Ok(extraction)
    }
}
