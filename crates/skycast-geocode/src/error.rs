//! Geocoding-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Geocoding service unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("Geocoding service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("No locations found for: {0}")]
    NotFound(String),

    #[error("Malformed geocoding response: {0}")]
    Decode(String),
}

impl GeocodeError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable(_) => {
                "Location search is unavailable. Check your connection.".to_string()
            }
            Self::Status(_) => "Location search failed. Please try again.".to_string(),
            Self::NotFound(_) => "No locations found. Try a different search.".to_string(),
            Self::Decode(_) => "Location search returned unexpected data.".to_string(),
        }
    }

    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Status(_))
    }
}
