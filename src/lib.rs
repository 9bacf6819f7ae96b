//! `airsheet` - weather and air-pollution snapshots for shared spreadsheets
//!
//! A batch job that fetches current conditions for a fixed list of
//! locations from `OpenWeatherMap`, rotating through a pool of API keys to
//! stay under per-key rate limits, and publishes one flattened table per run.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod key_pool;
pub mod locations;
pub mod logging;
pub mod models;
pub mod openweather;
pub mod orchestrator;
pub mod shape;
pub mod sink;

// Re-export core types for public API
pub use config::Settings;
pub use error::AirsheetError;
pub use fetcher::{FetchOutcome, LocationFetcher};
pub use key_pool::{ApiKey, KeyPool};
pub use models::{COLUMNS, Location, ResultTable, WeatherRecord};
pub use openweather::{FetchError, OpenWeatherClient, WeatherProvider};
pub use orchestrator::FetchOrchestrator;
pub use sink::{CsvFileSink, GoogleSheetSink, OutputSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AirsheetError>;
