//! Resolves one location into a record through the key pool, with retries

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::key_pool::KeyPool;
use crate::models::{Location, WeatherRecord};
use crate::openweather::{FetchError, WeatherProvider};
use crate::shape::shape_record;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Result of resolving one location
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(WeatherRecord),
    /// Every attempt failed; the location is skipped for this run
    Exhausted {
        attempts: u32,
        last_error: Option<FetchError>,
    },
}

impl FetchOutcome {
    #[must_use]
    pub fn into_record(self) -> Option<WeatherRecord> {
        match self {
            FetchOutcome::Fetched(record) => Some(record),
            FetchOutcome::Exhausted { .. } => None,
        }
    }
}

pub struct LocationFetcher<P> {
    provider: P,
    keys: Arc<KeyPool>,
    max_attempts: u32,
    icon_base_url: String,
}

impl<P: WeatherProvider> LocationFetcher<P> {
    pub fn new(provider: P, keys: Arc<KeyPool>, icon_base_url: impl Into<String>) -> Self {
        Self {
            provider,
            keys,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            icon_base_url: icon_base_url.into(),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn key_pool(&self) -> &KeyPool {
        &self.keys
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Try up to `max_attempts` times, each with a freshly acquired key.
    /// Failures never escape; they only show up as [`FetchOutcome::Exhausted`].
    #[instrument(skip(self, location, last_updated), fields(city = %location.name))]
    pub async fn fetch(&self, location: &Location, last_updated: &str) -> FetchOutcome {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match self.attempt(location, last_updated).await {
                Ok(record) => {
                    debug!(attempt, "Fetched readings");
                    return FetchOutcome::Fetched(record);
                }
                Err(err) => {
                    debug!(attempt, error = %err, "Attempt failed");
                    last_error = Some(err);
                }
            }
        }

        warn!(
            attempts = self.max_attempts,
            coordinates = %location.format_coordinates(),
            error = ?last_error,
            "Giving up on location for this run"
        );
        FetchOutcome::Exhausted {
            attempts: self.max_attempts,
            last_error,
        }
    }

    async fn attempt(
        &self,
        location: &Location,
        last_updated: &str,
    ) -> Result<WeatherRecord, FetchError> {
        let key = self.keys.acquire().await;

        let (weather, pollution) = tokio::join!(
            self.provider.current_weather(location, &key),
            self.provider.air_pollution(location, &key)
        );
        let (weather, pollution) = (weather?, pollution?);

        if !weather.has_current_conditions() {
            return Err(FetchError::Malformed(
                "weather payload has no current conditions".into(),
            ));
        }
        if pollution.first_sample().is_none() {
            return Err(FetchError::Malformed("pollution list is empty".into()));
        }

        self.keys.record_success(&key);

        shape_record(
            location,
            &weather,
            &pollution,
            &self.icon_base_url,
            last_updated,
        )
    }
}
