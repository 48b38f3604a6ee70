//! Weather domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skycast_core::Place;
use std::collections::HashMap;

/// Latest observation from the nearest reporting station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Identifier of the station that reported the observation
    pub station_id: String,

    /// Short text description, e.g. "Partly Cloudy"
    pub description: Option<String>,

    /// Air temperature in Celsius
    pub temperature_c: Option<f64>,

    /// Heat index or wind chill, whichever the station reported
    pub feels_like_c: Option<f64>,

    /// Relative humidity in percent
    pub humidity_percent: Option<f64>,

    /// Wind speed in km/h
    pub wind_speed_kmh: Option<f64>,

    /// Wind direction in degrees
    pub wind_direction_deg: Option<f64>,

    /// When the observation was taken
    pub observed_at: Option<DateTime<Utc>>,
}

impl CurrentConditions {
    /// Air temperature in Fahrenheit.
    pub fn temperature_f(&self) -> Option<f64> {
        self.temperature_c.map(|c| c * 9.0 / 5.0 + 32.0)
    }
}

/// One period of the daily forecast (day and night come as separate
/// periods, so a week is up to 14 of these).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPeriod {
    pub number: u32,
    /// Provider's period label, e.g. "Tonight" or "Wednesday"
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_daytime: bool,
    pub temperature: f64,
    pub temperature_unit: String,
    /// Chance of precipitation in percent
    pub precipitation_chance: Option<f64>,
    pub wind_speed: Option<String>,
    pub wind_direction: Option<String>,
    pub short_forecast: String,
    pub detailed_forecast: Option<String>,
}

/// One hour of the hourly forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub start_time: DateTime<Utc>,
    pub is_daytime: bool,
    pub temperature: f64,
    pub temperature_unit: String,
    /// Chance of precipitation in percent
    pub precipitation_chance: Option<f64>,
    pub short_forecast: String,
}

/// Simple aggregate over the daily forecast window.
///
/// Nothing fancier than averaging: mean daytime high, mean nighttime low,
/// mean precipitation chance, and the most frequent condition text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyOutlook {
    pub average_high: Option<f64>,
    pub average_low: Option<f64>,
    pub average_precipitation_chance: Option<f64>,
    pub dominant_condition: Option<String>,
    /// How many forecast periods fed the aggregate
    pub period_count: usize,
}

impl MonthlyOutlook {
    /// Aggregate forecast periods by simple averaging. `None` when there
    /// is nothing to aggregate.
    pub fn from_periods(periods: &[DailyPeriod]) -> Option<Self> {
        if periods.is_empty() {
            return None;
        }

        let highs: Vec<f64> = periods
            .iter()
            .filter(|p| p.is_daytime)
            .map(|p| p.temperature)
            .collect();
        let lows: Vec<f64> = periods
            .iter()
            .filter(|p| !p.is_daytime)
            .map(|p| p.temperature)
            .collect();
        let precip: Vec<f64> = periods
            .iter()
            .filter_map(|p| p.precipitation_chance)
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut dominant: Option<(&str, usize)> = None;
        for period in periods {
            let count = counts.entry(period.short_forecast.as_str()).or_insert(0);
            *count += 1;
            match dominant {
                // Ties keep the condition that reached the count first.
                Some((_, best)) if *count <= best => {}
                _ => dominant = Some((period.short_forecast.as_str(), *count)),
            }
        }

        Some(Self {
            average_high: mean(&highs),
            average_low: mean(&lows),
            average_precipitation_chance: mean(&precip),
            dominant_condition: dominant.map(|(condition, _)| condition.to_string()),
            period_count: periods.len(),
        })
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let count = u32::try_from(values.len()).ok()?;
    Some(values.iter().sum::<f64>() / f64::from(count))
}

/// The complete, internally consistent weather bundle for one location.
///
/// Replaced atomically by the refresh orchestrator; the four sections are
/// never mixed across locations or cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// The location the data was fetched for
    pub place: Place,
    pub current: Option<CurrentConditions>,
    pub seven_day: Vec<DailyPeriod>,
    pub hourly: Vec<HourlyEntry>,
    pub monthly: Option<MonthlyOutlook>,
    pub fetched_at: DateTime<Utc>,
}
