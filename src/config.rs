//! Configuration management for the `airsheet` batch job
//!
//! Settings are layered: an optional TOML file, then `AIRSHEET_*`
//! environment variables, then the legacy variable names the job has
//! always been deployed with (`OPENWEATHER_API_KEYS`, `GOOGLE_SHEET_URL`,
//! `GOOGLE_SERVICE_ACCOUNT_JSON`).

use crate::AirsheetError;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "airsheet.toml";

const LEGACY_API_KEYS_VAR: &str = "OPENWEATHER_API_KEYS";
const LEGACY_SHEET_URL_VAR: &str = "GOOGLE_SHEET_URL";
const LEGACY_SERVICE_ACCOUNT_VAR: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Upstream weather API and key pool settings
    #[serde(default)]
    pub openweather: OpenWeatherConfig,
    /// Run-level settings
    #[serde(default)]
    pub run: RunConfig,
    /// Output sink settings
    #[serde(default)]
    pub output: OutputConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenWeatherMap API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    /// Credential pool, rotated in this order
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Base URL for the `weather` and `air_pollution` endpoints
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Base URL for condition icons
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Soft per-key usage ceiling per run
    #[serde(default = "default_key_ceiling")]
    pub key_ceiling: u32,
    /// Wait applied when every key is at its ceiling
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u32,
    /// Attempts per location before it is skipped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// CSV source with `Latitude`, `Longitude` and `City` columns (path or URL)
    #[serde(default = "default_locations")]
    pub locations: String,
    /// Locations fetched simultaneously
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Output sink settings. The spreadsheet wins when both sinks are configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub sheet_url: Option<String>,
    /// Service account key, inline JSON or a path to the key file
    pub service_account_json: Option<String>,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    pub csv_path: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_icon_base_url() -> String {
    "http://openweathermap.org/img/wn".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_key_ceiling() -> u32 {
    55
}

fn default_cooldown() -> u32 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_locations() -> String {
    "https://raw.githubusercontent.com/santhoshkumars-sk/weather-and-pollution-dashboard/main/latnlon.csv"
        .to_string()
}

fn default_concurrency() -> usize {
    15
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            base_url: default_base_url(),
            icon_base_url: default_icon_base_url(),
            timeout_seconds: default_timeout(),
            key_ceiling: default_key_ceiling(),
            cooldown_seconds: default_cooldown(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sheet_url: None,
            service_account_json: None,
            worksheet: default_worksheet(),
            csv_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl OpenWeatherConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds.into())
    }
}

impl Settings {
    /// Load configuration from the default file and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Self::load_layers(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge file, environment and legacy variables without validating, so
    /// command-line overrides can still be applied
    pub fn load_layers(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        // AIRSHEET_OPENWEATHER__API_KEYS=k1,k2
        builder = builder.add_source(
            Environment::with_prefix("AIRSHEET")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("openweather.api_keys")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: Settings = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.apply_defaults();

        Ok(config)
    }

    /// Apply the legacy deployment variables on top of the layered sources
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(keys) = lookup(LEGACY_API_KEYS_VAR) {
            self.openweather.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = lookup(LEGACY_SHEET_URL_VAR) {
            self.output.sheet_url = Some(url);
        }
        if let Some(json) = lookup(LEGACY_SERVICE_ACCOUNT_VAR) {
            self.output.service_account_json = Some(json);
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.openweather.base_url.is_empty() {
            self.openweather.base_url = default_base_url();
        }
        if self.openweather.icon_base_url.is_empty() {
            self.openweather.icon_base_url = default_icon_base_url();
        }
        if self.openweather.timeout_seconds == 0 {
            self.openweather.timeout_seconds = default_timeout();
        }
        if self.openweather.key_ceiling == 0 {
            self.openweather.key_ceiling = default_key_ceiling();
        }
        if self.openweather.max_attempts == 0 {
            self.openweather.max_attempts = default_max_attempts();
        }
        if self.run.locations.is_empty() {
            self.run.locations = default_locations();
        }
        if self.run.concurrency == 0 {
            self.run.concurrency = default_concurrency();
        }
        if self.output.worksheet.is_empty() {
            self.output.worksheet = default_worksheet();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_output()?;
        Ok(())
    }

    /// Validate the credential pool
    pub fn validate_api_keys(&self) -> Result<()> {
        if self.openweather.api_keys.is_empty() {
            return Err(AirsheetError::config(format!(
                "No OpenWeatherMap API keys configured. Set {LEGACY_API_KEYS_VAR} or openweather.api_keys"
            ))
            .into());
        }

        if self.openweather.api_keys.iter().any(|key| key.trim().is_empty()) {
            return Err(AirsheetError::config("OpenWeatherMap API keys cannot be empty").into());
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.openweather.timeout_seconds > 300 {
            return Err(
                AirsheetError::config("Weather API timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.openweather.max_attempts > 10 {
            return Err(AirsheetError::config("Attempts per location cannot exceed 10").into());
        }

        if self.openweather.cooldown_seconds > 600 {
            return Err(AirsheetError::config("Key cool-down cannot exceed 600 seconds").into());
        }

        if self.run.concurrency > 100 {
            return Err(AirsheetError::config("Concurrency cannot exceed 100").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AirsheetError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AirsheetError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather API base URL", &self.openweather.base_url),
            ("Icon base URL", &self.openweather.icon_base_url),
        ] {
            if !is_http_url(url) {
                return Err(AirsheetError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    /// At least one sink must be usable; a spreadsheet needs credentials
    fn validate_output(&self) -> Result<()> {
        match (&self.output.sheet_url, &self.output.csv_path) {
            (None, None) => Err(AirsheetError::config(format!(
                "No output configured. Set {LEGACY_SHEET_URL_VAR} or output.csv_path"
            ))
            .into()),
            (Some(url), _) if !is_http_url(url) => Err(AirsheetError::config(
                "Spreadsheet URL must be a valid HTTP or HTTPS URL",
            )
            .into()),
            (Some(_), _) if self.output.service_account_json.is_none() => {
                Err(AirsheetError::config(format!(
                    "Spreadsheet output requires {LEGACY_SERVICE_ACCOUNT_VAR}"
                ))
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Path of the file that was used, for diagnostics
    #[must_use]
    pub fn describe_source(config_path: Option<&Path>) -> String {
        let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        if path.exists() {
            path.display().to_string()
        } else {
            "environment only".to_string()
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> Settings {
        let mut config = Settings::default();
        config.openweather.api_keys = vec!["key_one".to_string(), "key_two".to_string()];
        config.output.csv_path = Some(PathBuf::from("snapshot.csv"));
        config
    }

    #[test]
    fn test_default_config() {
        let config = Settings::default();
        assert_eq!(
            config.openweather.base_url,
            "https://api.openweathermap.org/data/2.5"
        );
        assert_eq!(config.openweather.timeout_seconds, 30);
        assert_eq!(config.openweather.key_ceiling, 55);
        assert_eq!(config.openweather.cooldown(), Duration::from_secs(60));
        assert_eq!(config.openweather.max_attempts, 3);
        assert_eq!(config.run.concurrency, 15);
        assert_eq!(config.output.worksheet, "Sheet1");
        assert_eq!(config.logging.level, "info");
        assert!(config.openweather.api_keys.is_empty());
    }

    #[test]
    fn test_config_validation_missing_api_keys() {
        let mut config = valid_config();
        config.openweather.api_keys.clear();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No OpenWeatherMap API keys"));
    }

    #[test]
    fn test_config_validation_blank_api_key() {
        let mut config = valid_config();
        config.openweather.api_keys.push("  ".to_string());
        assert!(config.validate_api_keys().is_err());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = valid_config();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = valid_config();
        config.openweather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_requires_output() {
        let mut config = valid_config();
        config.output.csv_path = None;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("No output configured"));
    }

    #[test]
    fn test_sheet_output_requires_credentials() {
        let mut config = valid_config();
        config.output.sheet_url =
            Some("https://docs.google.com/spreadsheets/d/abc123/edit".to_string());
        assert!(config.validate().is_err());

        config.output.service_account_json = Some("{}".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENWEATHER_API_KEYS", "alpha, beta,,gamma"),
            ("GOOGLE_SHEET_URL", "https://docs.google.com/spreadsheets/d/xyz/edit"),
            ("GOOGLE_SERVICE_ACCOUNT_JSON", "{\"type\":\"service_account\"}"),
        ]);

        let mut config = Settings::default();
        config.apply_env_overrides(|name| env.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.openweather.api_keys, vec!["alpha", "beta", "gamma"]);
        assert_eq!(
            config.output.sheet_url.as_deref(),
            Some("https://docs.google.com/spreadsheets/d/xyz/edit")
        );
        assert!(config.output.service_account_json.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_defaults_fills_zeroes() {
        let mut config = valid_config();
        config.run.concurrency = 0;
        config.openweather.max_attempts = 0;
        config.apply_defaults();
        assert_eq!(config.run.concurrency, 15);
        assert_eq!(config.openweather.max_attempts, 3);
    }
}
