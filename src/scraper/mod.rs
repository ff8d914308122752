//! Web scraper module for worldometers.info
//!
//! Provides browser automation and parsing of the country table.

pub mod browser;
pub mod extractor;
pub mod parsers;

pub use extractor::{Extractor, PageExtractor};

/// Countries of the world, ranked by population
pub const SOURCE_URL: &str = "https://www.worldometers.info/geography/countries-of-the-world/";
