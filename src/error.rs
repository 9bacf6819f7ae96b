//! Error types and handling for the `airsheet` batch job

use thiserror::Error;

/// Main error type for the `airsheet` library
#[derive(Error, Debug)]
pub enum AirsheetError {
    /// Configuration-related errors, fatal before any fetch begins
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream API communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Output sink errors (spreadsheet or file publication)
    #[error("Sink error: {message}")]
    Sink { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// CSV encoding or decoding errors
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}

impl AirsheetError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new sink error
    pub fn sink<S: Into<String>>(message: S) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AirsheetError::Config { message } => {
                format!("Configuration error: {message}. Check your config file and API keys.")
            }
            AirsheetError::Api { message } => {
                format!("Unable to reach a remote service: {message}. Please check your internet connection.")
            }
            AirsheetError::Sink { message } => format!("Publishing the snapshot failed: {message}"),
            AirsheetError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            AirsheetError::Csv { source } => format!("Malformed CSV data: {source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = AirsheetError::config("missing API keys");
        assert!(matches!(config_err, AirsheetError::Config { .. }));

        let api_err = AirsheetError::api("connection failed");
        assert!(matches!(api_err, AirsheetError::Api { .. }));

        let sink_err = AirsheetError::sink("quota exceeded");
        assert!(matches!(sink_err, AirsheetError::Sink { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = AirsheetError::config("no keys");
        assert!(config_err.user_message().contains("no keys"));

        let api_err = AirsheetError::api("test");
        assert!(api_err.user_message().contains("Unable to reach"));

        let sink_err = AirsheetError::sink("Sheets API update returned 403");
        assert!(sink_err.user_message().contains("403"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AirsheetError = io_err.into();
        assert!(matches!(err, AirsheetError::Io { .. }));
    }
}
