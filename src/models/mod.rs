//! Data models for the airsheet batch job
//!
//! - Location: a requested point and its display name
//! - Record: one shaped output row and the table of rows for a run

pub mod location;
pub mod record;

pub use location::Location;
pub use record::{COLUMNS, ResultTable, WeatherRecord};
