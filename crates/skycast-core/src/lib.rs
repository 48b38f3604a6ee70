//! Shared foundation for skycast: domain types, configuration, and
//! logging initialization.

pub mod config;
pub mod types;

pub use config::{Config, GeocodeConfig, LocationConfig, WeatherConfig};
pub use types::{Coordinates, CoordinatesOutOfRange, Place};

use anyhow::Result;

/// Initialize logging for the application.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("skycast core initialized");
    Ok(())
}
