//! api.weather.gov-style provider client.
//!
//! The provider resolves a coordinate pair to a gridpoint carrying the
//! forecast, hourly-forecast, and observation-station URLs; current
//! conditions come from the latest observation of the nearest station.

use crate::error::WeatherError;
use crate::types::{CurrentConditions, DailyPeriod, HourlyEntry, MonthlyOutlook};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use skycast_core::{Coordinates, WeatherConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::instrument;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "skycast/0.1.0 (https://github.com/skycast)";

/// Day/night pairs for a week.
const MAX_DAILY_PERIODS: usize = 14;
/// Two days of hourly entries.
const MAX_HOURLY_ENTRIES: usize = 48;

// -- Wire types -------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PointResponse {
    properties: PointProperties,
}

#[derive(Debug, Deserialize)]
struct PointProperties {
    forecast: Option<String>,
    #[serde(rename = "forecastHourly")]
    forecast_hourly: Option<String>,
    #[serde(rename = "observationStations")]
    observation_stations: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StationsResponse {
    #[serde(default)]
    features: Vec<StationFeature>,
}

#[derive(Debug, Deserialize)]
struct StationFeature {
    properties: StationProperties,
}

#[derive(Debug, Deserialize)]
struct StationProperties {
    #[serde(rename = "stationIdentifier")]
    station_identifier: String,
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    properties: ObservationProperties,
}

#[derive(Debug, Deserialize)]
struct ObservationProperties {
    timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "textDescription", default)]
    text_description: Option<String>,
    temperature: Option<QuantValue>,
    #[serde(rename = "relativeHumidity", default)]
    relative_humidity: Option<QuantValue>,
    #[serde(rename = "windSpeed", default)]
    wind_speed: Option<QuantValue>,
    #[serde(rename = "windDirection", default)]
    wind_direction: Option<QuantValue>,
    #[serde(rename = "heatIndex", default)]
    heat_index: Option<QuantValue>,
    #[serde(rename = "windChill", default)]
    wind_chill: Option<QuantValue>,
}

/// Quantitative value with a unit code, nullable when the sensor has no
/// reading.
#[derive(Debug, Deserialize)]
struct QuantValue {
    #[serde(rename = "unitCode", default)]
    unit_code: String,
    value: Option<f64>,
}

impl QuantValue {
    /// Reading in Celsius, converting when the station reports Fahrenheit.
    fn celsius(&self) -> Option<f64> {
        let value = self.value?;
        if self.unit_code.ends_with("degF") {
            Some((value - 32.0) * 5.0 / 9.0)
        } else {
            Some(value)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<WirePeriod>,
}

#[derive(Debug, Deserialize)]
struct WirePeriod {
    number: u32,
    #[serde(default)]
    name: String,
    #[serde(rename = "startTime")]
    start_time: DateTime<Utc>,
    #[serde(rename = "endTime")]
    end_time: DateTime<Utc>,
    #[serde(rename = "isDaytime")]
    is_daytime: bool,
    /// Bare number in US units mode, quantitative object in SI mode
    temperature: serde_json::Value,
    #[serde(rename = "temperatureUnit", default)]
    temperature_unit: String,
    #[serde(rename = "probabilityOfPrecipitation", default)]
    probability_of_precipitation: Option<QuantValue>,
    #[serde(rename = "windSpeed", default)]
    wind_speed: Option<String>,
    #[serde(rename = "windDirection", default)]
    wind_direction: Option<String>,
    #[serde(rename = "shortForecast", default)]
    short_forecast: String,
    #[serde(rename = "detailedForecast", default)]
    detailed_forecast: Option<String>,
}

impl WirePeriod {
    fn temperature(&self) -> Option<f64> {
        match &self.temperature {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::Object(obj) => obj.get("value").and_then(|v| v.as_f64()),
            _ => None,
        }
    }
}

// -- Client -----------------------------------------------------------------

/// Gridpoint metadata resolved from a coordinate pair.
#[derive(Debug, Clone)]
struct PointMeta {
    forecast_url: String,
    forecast_hourly_url: String,
    observation_stations_url: String,
}

pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    /// Point lookups cached per grid key so the four concurrent snapshot
    /// fetches for one location cost a single point request.
    points: Mutex<HashMap<String, Arc<OnceCell<PointMeta>>>>,
}

impl WeatherClient {
    /// Build a client for the configured weather endpoint.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            points: Mutex::new(HashMap::new()),
        })
    }

    /// Latest observation from the nearest reporting station.
    ///
    /// A gridpoint with zero observation stations yields `Ok(None)`: no
    /// data, but not an error.
    ///
    /// # Errors
    /// `Status`/`Http` for service failures, `Decode` for malformed
    /// payloads.
    #[instrument(skip(self), level = "info")]
    pub async fn current_conditions(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<CurrentConditions>, WeatherError> {
        let meta = self.point(coordinates).await?;

        let stations: StationsResponse = self.get_json(&meta.observation_stations_url).await?;
        let Some(station) = stations.features.into_iter().next() else {
            tracing::info!("No observation stations for gridpoint");
            return Ok(None);
        };

        let station_id = station.properties.station_identifier;
        let url = format!(
            "{}/stations/{}/observations/latest",
            self.base_url, station_id,
        );
        let observation: ObservationResponse = self.get_json(&url).await?;
        let props = observation.properties;

        let current = CurrentConditions {
            station_id,
            description: props.text_description.filter(|s| !s.is_empty()),
            temperature_c: props.temperature.as_ref().and_then(QuantValue::celsius),
            feels_like_c: props
                .heat_index
                .as_ref()
                .and_then(QuantValue::celsius)
                .or_else(|| props.wind_chill.as_ref().and_then(QuantValue::celsius)),
            humidity_percent: props.relative_humidity.and_then(|q| q.value),
            wind_speed_kmh: props.wind_speed.and_then(|q| q.value),
            wind_direction_deg: props.wind_direction.and_then(|q| q.value),
            observed_at: props.timestamp,
        };

        Ok(Some(current))
    }

    /// Daily forecast periods, truncated to a week of day/night pairs.
    ///
    /// # Errors
    /// `Status`/`Http` for service failures, `Decode` for malformed
    /// payloads.
    #[instrument(skip(self), level = "info")]
    pub async fn seven_day(&self, coordinates: Coordinates) -> Result<Vec<DailyPeriod>, WeatherError> {
        let meta = self.point(coordinates).await?;
        let forecast: ForecastResponse = self.get_json(&meta.forecast_url).await?;
        let periods = convert_daily(forecast.properties.periods, MAX_DAILY_PERIODS);
        tracing::info!(count = periods.len(), "Fetched daily forecast");
        Ok(periods)
    }

    /// Hourly forecast entries, truncated to two days.
    ///
    /// # Errors
    /// `Status`/`Http` for service failures, `Decode` for malformed
    /// payloads.
    #[instrument(skip(self), level = "info")]
    pub async fn hourly(&self, coordinates: Coordinates) -> Result<Vec<HourlyEntry>, WeatherError> {
        let meta = self.point(coordinates).await?;
        let forecast: ForecastResponse = self.get_json(&meta.forecast_hourly_url).await?;

        let entries: Vec<HourlyEntry> = forecast
            .properties
            .periods
            .into_iter()
            .take(MAX_HOURLY_ENTRIES)
            .filter_map(|period| {
                let Some(temperature) = period.temperature() else {
                    tracing::debug!(number = period.number, "Skipping period without temperature");
                    return None;
                };
                Some(HourlyEntry {
                    start_time: period.start_time,
                    is_daytime: period.is_daytime,
                    temperature,
                    temperature_unit: period.temperature_unit,
                    precipitation_chance: period
                        .probability_of_precipitation
                        .and_then(|q| q.value),
                    short_forecast: period.short_forecast,
                })
            })
            .collect();

        tracing::info!(count = entries.len(), "Fetched hourly forecast");
        Ok(entries)
    }

    /// Monthly aggregate: an independent fetch of the daily forecast,
    /// reduced by simple averaging.
    ///
    /// # Errors
    /// `Status`/`Http` for service failures, `Decode` for malformed
    /// payloads.
    #[instrument(skip(self), level = "info")]
    pub async fn monthly_outlook(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<MonthlyOutlook>, WeatherError> {
        let meta = self.point(coordinates).await?;
        let forecast: ForecastResponse = self.get_json(&meta.forecast_url).await?;
        let periods = convert_daily(forecast.properties.periods, usize::MAX);
        Ok(MonthlyOutlook::from_periods(&periods))
    }

    /// Resolve the gridpoint for a coordinate pair, cached per grid key.
    async fn point(&self, coordinates: Coordinates) -> Result<PointMeta, WeatherError> {
        let cell = {
            let mut points = self.points.lock();
            points
                .entry(coordinates.grid_key())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let meta = cell
            .get_or_try_init(|| self.fetch_point(coordinates))
            .await?;
        Ok(meta.clone())
    }

    async fn fetch_point(&self, coordinates: Coordinates) -> Result<PointMeta, WeatherError> {
        // The provider rejects more than four decimal places, so the path
        // uses the grid key directly.
        let url = format!("{}/points/{}", self.base_url, coordinates.grid_key());
        let point: PointResponse = self.get_json(&url).await?;
        let props = point.properties;

        Ok(PointMeta {
            forecast_url: props
                .forecast
                .ok_or_else(|| WeatherError::MissingData("point forecast URL".to_string()))?,
            forecast_hourly_url: props
                .forecast_hourly
                .ok_or_else(|| WeatherError::MissingData("point hourly URL".to_string()))?,
            observation_stations_url: props.observation_stations.ok_or_else(|| {
                WeatherError::MissingData("point observation stations URL".to_string())
            })?,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/geo+json")
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| WeatherError::Decode(format!("JSON parse error: {}", e)))
        } else {
            Err(WeatherError::Status(status))
        }
    }
}

fn convert_daily(periods: Vec<WirePeriod>, limit: usize) -> Vec<DailyPeriod> {
    periods
        .into_iter()
        .take(limit)
        .filter_map(|period| {
            let Some(temperature) = period.temperature() else {
                tracing::debug!(number = period.number, "Skipping period without temperature");
                return None;
            };
            Some(DailyPeriod {
                number: period.number,
                name: period.name,
                start_time: period.start_time,
                end_time: period.end_time,
                is_daytime: period.is_daytime,
                temperature,
                temperature_unit: period.temperature_unit,
                precipitation_chance: period.probability_of_precipitation.and_then(|q| q.value),
                wind_speed: period.wind_speed,
                wind_direction: period.wind_direction,
                short_forecast: period.short_forecast,
                detailed_forecast: period.detailed_forecast,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> WeatherClient {
        let config = WeatherConfig {
            base_url,
            ..WeatherConfig::default()
        };
        WeatherClient::new(&config).unwrap()
    }

    fn coords() -> Coordinates {
        Coordinates::new(47.6062, -122.3321).unwrap()
    }

    async fn mount_point(server: &MockServer, expect: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/points/47.6062,-122.3321"))
            .and(header("Accept", "application/geo+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "forecast": format!("{}/gridpoints/SEW/124,67/forecast", server.uri()),
                    "forecastHourly": format!("{}/gridpoints/SEW/124,67/forecast/hourly", server.uri()),
                    "observationStations": format!("{}/gridpoints/SEW/124,67/stations", server.uri()),
                }
            })));
        match expect {
            Some(n) => mock.expect(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    fn wire_period(number: u32, is_daytime: bool, temp: i64, forecast: &str) -> serde_json::Value {
        serde_json::json!({
            "number": number,
            "name": format!("Period {}", number),
            "startTime": "2026-08-25T06:00:00Z",
            "endTime": "2026-08-25T18:00:00Z",
            "isDaytime": is_daytime,
            "temperature": temp,
            "temperatureUnit": "F",
            "probabilityOfPrecipitation": {"unitCode": "wmoUnit:percent", "value": 30},
            "windSpeed": "5 to 10 mph",
            "windDirection": "SW",
            "shortForecast": forecast,
            "detailedForecast": format!("{} all day.", forecast),
        })
    }

    #[tokio::test]
    async fn test_current_conditions_chain() {
        let mock_server = MockServer::start().await;
        mount_point(&mock_server, None).await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/stations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "features": [
                    {"properties": {"stationIdentifier": "KSEA", "name": "Seattle-Tacoma"}},
                    {"properties": {"stationIdentifier": "KBFI", "name": "Boeing Field"}},
                ]
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/stations/KSEA/observations/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "timestamp": "2026-08-25T12:53:00Z",
                    "textDescription": "Partly Cloudy",
                    "temperature": {"unitCode": "wmoUnit:degC", "value": 21.1},
                    "relativeHumidity": {"unitCode": "wmoUnit:percent", "value": 62.5},
                    "windSpeed": {"unitCode": "wmoUnit:km_h-1", "value": 9.36},
                    "windDirection": {"unitCode": "wmoUnit:degree_(angle)", "value": 220},
                    "heatIndex": {"unitCode": "wmoUnit:degC", "value": null},
                    "windChill": {"unitCode": "wmoUnit:degC", "value": null},
                }
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        let current = client.current_conditions(coords()).await.unwrap().unwrap();

        assert_eq!(current.station_id, "KSEA");
        assert_eq!(current.description.as_deref(), Some("Partly Cloudy"));
        assert!((current.temperature_c.unwrap() - 21.1).abs() < 1e-9);
        assert_eq!(current.humidity_percent, Some(62.5));
        assert_eq!(current.feels_like_c, None);
    }

    #[tokio::test]
    async fn test_zero_stations_is_unavailable_not_error() {
        let mock_server = MockServer::start().await;
        mount_point(&mock_server, None).await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/stations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})),
            )
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        let current = client.current_conditions(coords()).await.unwrap();
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn test_fahrenheit_observation_converts() {
        let mock_server = MockServer::start().await;
        mount_point(&mock_server, None).await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/stations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "features": [{"properties": {"stationIdentifier": "KSEA"}}]
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/stations/KSEA/observations/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "temperature": {"unitCode": "wmoUnit:degF", "value": 68.0},
                }
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        let current = client.current_conditions(coords()).await.unwrap().unwrap();
        assert!((current.temperature_c.unwrap() - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_seven_day_truncates_to_fourteen_periods() {
        let mock_server = MockServer::start().await;
        mount_point(&mock_server, None).await;

        let periods: Vec<serde_json::Value> = (1..=16)
            .map(|n| wire_period(n, n % 2 == 1, 70, "Sunny"))
            .collect();

        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"periods": periods}
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        let daily = client.seven_day(coords()).await.unwrap();

        assert_eq!(daily.len(), 14);
        assert_eq!(daily[0].name, "Period 1");
        assert_eq!(daily[0].temperature, 70.0);
        assert_eq!(daily[0].precipitation_chance, Some(30.0));
        assert_eq!(daily[13].name, "Period 14");
    }

    #[tokio::test]
    async fn test_hourly_truncates_to_forty_eight_entries() {
        let mock_server = MockServer::start().await;
        mount_point(&mock_server, None).await;

        let periods: Vec<serde_json::Value> =
            (1..=50).map(|n| wire_period(n, true, 65, "Clear")).collect();

        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/forecast/hourly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"periods": periods}
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        let hourly = client.hourly(coords()).await.unwrap();
        assert_eq!(hourly.len(), 48);
    }

    #[tokio::test]
    async fn test_point_lookup_is_cached_per_grid_key() {
        let mock_server = MockServer::start().await;
        mount_point(&mock_server, Some(1)).await;

        let periods: Vec<serde_json::Value> =
            (1..=4).map(|n| wire_period(n, n % 2 == 1, 70, "Sunny")).collect();
        let body = serde_json::json!({"properties": {"periods": periods}});

        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/forecast/hourly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        client.seven_day(coords()).await.unwrap();
        client.hourly(coords()).await.unwrap();
        client.monthly_outlook(coords()).await.unwrap();

        // MockServer verifies the expected call count on drop.
    }

    #[tokio::test]
    async fn test_point_failure_is_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/47.6062,-122.3321"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        let err = client.seven_day(coords()).await.unwrap_err();
        assert!(matches!(err, WeatherError::Status(s) if s.as_u16() == 404));
    }

    #[tokio::test]
    async fn test_monthly_outlook_averages_daily_forecast() {
        let mock_server = MockServer::start().await;
        mount_point(&mock_server, None).await;

        let periods = vec![
            wire_period(1, true, 80, "Sunny"),
            wire_period(2, false, 60, "Clear"),
            wire_period(3, true, 70, "Sunny"),
            wire_period(4, false, 50, "Rain"),
        ];

        Mock::given(method("GET"))
            .and(path("/gridpoints/SEW/124,67/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"periods": periods}
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(mock_server.uri());
        let outlook = client.monthly_outlook(coords()).await.unwrap().unwrap();

        assert_eq!(outlook.average_high, Some(75.0));
        assert_eq!(outlook.average_low, Some(55.0));
        assert_eq!(outlook.dominant_condition.as_deref(), Some("Sunny"));
        assert_eq!(outlook.period_count, 4);
    }

    #[test]
    fn test_wire_period_quantitative_temperature() {
        let period: WirePeriod = serde_json::from_value(serde_json::json!({
            "number": 1,
            "startTime": "2026-08-25T06:00:00Z",
            "endTime": "2026-08-25T07:00:00Z",
            "isDaytime": true,
            "temperature": {"unitCode": "wmoUnit:degC", "value": 21.5},
        }))
        .unwrap();
        assert_eq!(period.temperature(), Some(21.5));
    }
}
