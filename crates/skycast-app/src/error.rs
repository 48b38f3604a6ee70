//! Application-level error aggregation.

use crate::geo::LocationError;
use skycast_geocode::GeocodeError;
use skycast_store::StoreError;
use skycast_weather::WeatherError;
use thiserror::Error;

/// Unified error type spanning every service the app talks to.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),
}

impl AppError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Geocode(e) => e.user_message(),
            Self::Weather(e) => e.user_message(),
            Self::Store(e) => e.user_message(),
            Self::Location(e) => e.user_message(),
        }
    }
}
