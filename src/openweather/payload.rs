//! `OpenWeatherMap` response structures
//!
//! Only the fields the snapshot publishes are modelled. Everything the
//! upstream may omit is optional so a sparse payload still deserializes and
//! the shaping step decides what is required.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Number, Value};

/// Response of `GET /weather`
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    /// The "current conditions" section
    pub main: Option<MainReadings>,
    #[serde(default)]
    pub weather: Vec<Condition>,
    /// Visibility in meters
    pub visibility: Option<f64>,
    pub wind: Option<Wind>,
    pub clouds: Option<Clouds>,
    pub sys: Option<SunTimes>,
    /// Shift from UTC in seconds
    pub timezone: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainReadings {
    /// Temperature, metric units requested
    pub temp: Option<Number>,
    /// Atmospheric pressure in hPa
    pub pressure: Option<Number>,
    /// Humidity in percent
    pub humidity: Option<Number>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    /// Wind speed in m/s
    pub speed: Option<f64>,
    /// Wind direction in degrees
    pub deg: Option<Number>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Clouds {
    /// Cloudiness in percent
    pub all: Option<Number>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SunTimes {
    /// Unix seconds, UTC
    pub sunrise: Option<i64>,
    /// Unix seconds, UTC
    pub sunset: Option<i64>,
}

/// Response of `GET /air_pollution`
#[derive(Debug, Clone, Deserialize)]
pub struct AirPollution {
    #[serde(default)]
    pub list: Vec<PollutionSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollutionSample {
    pub main: Option<AqiReading>,
    /// Concentrations in μg/m3 keyed by pollutant (`co`, `pm2_5`, ...)
    #[serde(default)]
    pub components: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AqiReading {
    /// 1 = Good ... 5 = Very Poor
    pub aqi: u8,
}

impl CurrentWeather {
    /// Whether the payload carries a current conditions section
    #[must_use]
    pub fn has_current_conditions(&self) -> bool {
        self.main.is_some()
    }
}

impl AirPollution {
    #[must_use]
    pub fn first_sample(&self) -> Option<&PollutionSample> {
        self.list.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weather_payload() {
        let body = r#"{
            "coord": {"lon": 80.2707, "lat": 13.0827},
            "weather": [{"id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d"}],
            "main": {"temp": 31.24, "feels_like": 36.1, "pressure": 1008, "humidity": 62},
            "visibility": 6000,
            "wind": {"speed": 5.1, "deg": 250},
            "clouds": {"all": 40},
            "sys": {"country": "IN", "sunrise": 1710376260, "sunset": 1710419520},
            "timezone": 19800,
            "name": "Chennai",
            "cod": 200
        }"#;
        let weather: CurrentWeather = serde_json::from_str(body).unwrap();
        assert!(weather.has_current_conditions());
        assert_eq!(weather.weather[0].icon, "03d");
        assert_eq!(weather.visibility, Some(6000.0));
        assert_eq!(weather.timezone, Some(19800));
        let main = weather.main.unwrap();
        assert_eq!(main.pressure.unwrap().to_string(), "1008");
    }

    #[test]
    fn test_parse_sparse_weather_payload() {
        let weather: CurrentWeather = serde_json::from_str(r#"{"cod": 200}"#).unwrap();
        assert!(!weather.has_current_conditions());
        assert!(weather.weather.is_empty());
    }

    #[test]
    fn test_parse_pollution_payload() {
        let body = r#"{
            "coord": {"lon": 80.2707, "lat": 13.0827},
            "list": [{
                "main": {"aqi": 3},
                "components": {"co": 520.71, "no": 0.46, "no2": 11.48, "pm2_5": 27.13},
                "dt": 1710400000
            }]
        }"#;
        let pollution: AirPollution = serde_json::from_str(body).unwrap();
        let sample = pollution.first_sample().unwrap();
        assert_eq!(sample.main.as_ref().unwrap().aqi, 3);
        assert_eq!(sample.components["co"].to_string(), "520.71");
        assert!(!sample.components.contains_key("nh3"));
    }

    #[test]
    fn test_parse_empty_pollution_list() {
        let pollution: AirPollution = serde_json::from_str(r#"{"list": []}"#).unwrap();
        assert!(pollution.first_sample().is_none());
    }
}
