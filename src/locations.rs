//! Loads the location list from a CSV file or URL
//!
//! Expected columns are `Latitude`, `Longitude` and `City`; any other
//! columns are ignored.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::models::Location;
use crate::{AirsheetError, Result};

#[derive(Debug, Deserialize)]
struct LocationRow {
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "City")]
    city: String,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location::new(row.latitude, row.longitude, row.city)
    }
}

/// Load from a local path or an `http(s)://` URL. An empty list is a
/// configuration error.
#[instrument]
pub async fn load(source: &str, timeout: Duration) -> Result<Vec<Location>> {
    let body = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_remote(source, timeout).await?
    } else {
        tokio::fs::read_to_string(source).await?
    };

    let locations = parse(&body)?;
    if locations.is_empty() {
        return Err(AirsheetError::config(format!(
            "Location list '{source}' has no rows"
        )));
    }

    info!(count = locations.len(), "Loaded locations");
    Ok(locations)
}

async fn fetch_remote(url: &str, timeout: Duration) -> Result<String> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AirsheetError::config(format!("Failed to build HTTP client: {e}")))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AirsheetError::api(format!("Failed to download location list: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AirsheetError::api(format!(
            "Location list download returned {status}"
        )));
    }

    response
        .text()
        .await
        .map_err(|e| AirsheetError::api(format!("Failed to read location list: {e}")))
}

/// Parse CSV text into locations, in file order
pub fn parse(body: &str) -> Result<Vec<Location>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    reader
        .deserialize::<LocationRow>()
        .map(|row| row.map(Location::from).map_err(AirsheetError::from))
        .collect()
}
