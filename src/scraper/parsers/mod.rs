//! HTML parsers for worldometers.info data.

pub mod country_table;

pub use country_table::CountryTableParser;
