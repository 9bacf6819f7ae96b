//! Location model for geographic coordinates and metadata

use serde::{Deserialize, Serialize};

/// A requested point. Loaded once per run and never mutated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Display name (city, district, ...)
    pub name: String,
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            name: name.into(),
        }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Bitwise identity used to collapse repeated input rows
    #[must_use]
    pub fn identity(&self) -> (u64, u64, &str) {
        (
            self.latitude.to_bits(),
            self.longitude.to_bits(),
            self.name.as_str(),
        )
    }
}
