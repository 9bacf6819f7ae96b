//! `OpenWeatherMap` client for the current weather and air pollution endpoints
//!
//! The [`WeatherProvider`] trait is the seam the fetcher works against;
//! [`OpenWeatherClient`] is the HTTP implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::OpenWeatherConfig;
use crate::key_pool::ApiKey;
use crate::models::Location;
use crate::{AirsheetError, Result};

pub mod payload;

pub use payload::{AirPollution, CurrentWeather};

/// Why a single fetch attempt failed. Every variant is retryable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream answered HTTP {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Source of the two readings needed per location
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions in metric units
    async fn current_weather(
        &self,
        location: &Location,
        key: &ApiKey,
    ) -> std::result::Result<CurrentWeather, FetchError>;

    /// Current air pollution readings
    async fn air_pollution(
        &self,
        location: &Location,
        key: &ApiKey,
    ) -> std::result::Result<AirPollution, FetchError>;
}

/// HTTP client for `api.openweathermap.org`
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(config: &OpenWeatherConfig) -> Result<Self> {
        Self::with_base_url(&config.base_url, config.timeout())
    }

    /// Client against another host, e.g. a proxy or a local stub
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("airsheet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AirsheetError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn weather_url(&self, location: &Location, key: &ApiKey) -> String {
        format!(
            "{}/weather?lat={}&lon={}&appid={}&units=metric",
            self.base_url,
            location.latitude,
            location.longitude,
            urlencoding::encode(key.secret())
        )
    }

    fn pollution_url(&self, location: &Location, key: &ApiKey) -> String {
        format!(
            "{}/air_pollution?lat={}&lon={}&appid={}",
            self.base_url,
            location.latitude,
            location.longitude,
            urlencoding::encode(key.secret())
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        endpoint: &'static str,
    ) -> std::result::Result<T, FetchError> {
        let start_time = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;
        let body = serde_json::from_slice::<T>(&bytes)
            .map_err(|e| FetchError::Malformed(format!("{endpoint}: {e}")))?;

        let elapsed = start_time.elapsed();
        if elapsed.as_secs() > 5 {
            warn!(endpoint, "Slow API response detected: {:.3}s", elapsed.as_secs_f64());
        }

        Ok(body)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self, location, key), fields(city = %location.name, key = ?key))]
    async fn current_weather(
        &self,
        location: &Location,
        key: &ApiKey,
    ) -> std::result::Result<CurrentWeather, FetchError> {
        debug!("Requesting current weather");
        self.get_json(self.weather_url(location, key), "weather").await
    }

    #[instrument(skip(self, location, key), fields(city = %location.name, key = ?key))]
    async fn air_pollution(
        &self,
        location: &Location,
        key: &ApiKey,
    ) -> std::result::Result<AirPollution, FetchError> {
        debug!("Requesting air pollution");
        self.get_json(self.pollution_url(location, key), "air_pollution")
            .await
    }
}
