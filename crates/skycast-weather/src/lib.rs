//! Weather data client for skycast.
//!
//! Wraps an api.weather.gov-style provider: point resolution, station
//! observations for current conditions, and daily/hourly forecast period
//! lists, plus the simple monthly aggregation derived from them.

pub mod client;
pub mod error;
pub mod types;

pub use client::WeatherClient;
pub use error::WeatherError;
pub use types::{
    CurrentConditions, DailyPeriod, HourlyEntry, MonthlyOutlook, WeatherSnapshot,
};
