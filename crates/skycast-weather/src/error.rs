//! Weather-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Weather service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Weather service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Missing data in weather response: {0}")]
    MissingData(String),

    #[error("Malformed weather response: {0}")]
    Decode(String),
}

impl WeatherError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(_) => "Weather data is unreachable. Check your connection.".to_string(),
            Self::Status(_) => "The weather service had a problem. Please retry.".to_string(),
            Self::MissingData(_) => "Some weather data is unavailable right now.".to_string(),
            Self::Decode(_) => "The weather service returned unexpected data.".to_string(),
        }
    }

    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status(_))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = WeatherError::Status(reqwest::StatusCode::BAD_GATEWAY);
        assert!(err.user_message().contains("retry"));

        let err = WeatherError::MissingData("stations".to_string());
        assert!(err.user_message().contains("unavailable"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(WeatherError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(!WeatherError::MissingData("x".to_string()).is_retryable());
        assert!(!WeatherError::Decode("x".to_string()).is_retryable());
    }
}
