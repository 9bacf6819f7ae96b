//! Output row model and the per-run result table

use serde::Serialize;
use serde_json::{Value, json};

/// Published column headers, in output order
pub const COLUMNS: [&str; 24] = [
    "Latitude",
    "Longitude",
    "City",
    "Weather",
    "Weather Icon",
    "Temperature (°C)",
    "Pressure (hPa)",
    "Humidity (%)",
    "Visibility (km)",
    "Wind Speed (km/h)",
    "Wind Degree (°)",
    "Cloud Coverage (%)",
    "Sunrise",
    "Sunset",
    "AQI",
    "CO",
    "NO",
    "NO₂",
    "O₃",
    "SO₂",
    "PM2.5",
    "PM10",
    "NH₃",
    "Last Updated",
];

/// One published row. Every display field already carries its unit.
///
/// Field order matches [`COLUMNS`]; the serde names are the column headers so
/// the CSV sink can serialize records directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Weather")]
    pub weather: String,
    #[serde(rename = "Weather Icon")]
    pub weather_icon: String,
    #[serde(rename = "Temperature (°C)")]
    pub temperature: String,
    #[serde(rename = "Pressure (hPa)")]
    pub pressure: String,
    #[serde(rename = "Humidity (%)")]
    pub humidity: String,
    #[serde(rename = "Visibility (km)")]
    pub visibility: String,
    #[serde(rename = "Wind Speed (km/h)")]
    pub wind_speed: String,
    #[serde(rename = "Wind Degree (°)")]
    pub wind_degree: String,
    #[serde(rename = "Cloud Coverage (%)")]
    pub cloud_coverage: String,
    #[serde(rename = "Sunrise")]
    pub sunrise: String,
    #[serde(rename = "Sunset")]
    pub sunset: String,
    #[serde(rename = "AQI")]
    pub aqi: u8,
    #[serde(rename = "CO")]
    pub co: String,
    #[serde(rename = "NO")]
    pub no: String,
    #[serde(rename = "NO₂")]
    pub no2: String,
    #[serde(rename = "O₃")]
    pub o3: String,
    #[serde(rename = "SO₂")]
    pub so2: String,
    #[serde(rename = "PM2.5")]
    pub pm2_5: String,
    #[serde(rename = "PM10")]
    pub pm10: String,
    #[serde(rename = "NH₃")]
    pub nh3: String,
    #[serde(rename = "Last Updated")]
    pub last_updated: String,
}

impl WeatherRecord {
    /// Row cells in column order. Coordinates and AQI stay numeric.
    #[must_use]
    pub fn to_cells(&self) -> Vec<Value> {
        vec![
            json!(self.latitude),
            json!(self.longitude),
            json!(self.city),
            json!(self.weather),
            json!(self.weather_icon),
            json!(self.temperature),
            json!(self.pressure),
            json!(self.humidity),
            json!(self.visibility),
            json!(self.wind_speed),
            json!(self.wind_degree),
            json!(self.cloud_coverage),
            json!(self.sunrise),
            json!(self.sunset),
            json!(self.aqi),
            json!(self.co),
            json!(self.no),
            json!(self.no2),
            json!(self.o3),
            json!(self.so2),
            json!(self.pm2_5),
            json!(self.pm10),
            json!(self.nh3),
            json!(self.last_updated),
        ]
    }

    /// Same row with the run timestamp blanked, for comparing two runs
    #[must_use]
    pub fn without_timestamp(&self) -> Self {
        Self {
            last_updated: String::new(),
            ..self.clone()
        }
    }
}

/// All successful records of one run, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    records: Vec<WeatherRecord>,
}

impl ResultTable {
    #[must_use]
    pub fn new(records: Vec<WeatherRecord>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    /// Header row followed by one row per record
    #[must_use]
    pub fn to_values(&self) -> Vec<Vec<Value>> {
        let header = COLUMNS.iter().map(|c| json!(c)).collect();
        std::iter::once(header)
            .chain(self.records.iter().map(WeatherRecord::to_cells))
            .collect()
    }
}

impl IntoIterator for ResultTable {
    type Item = WeatherRecord;
    type IntoIter = std::vec::IntoIter<WeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
