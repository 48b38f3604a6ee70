use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather provider settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Geocoding provider settings
    #[serde(default)]
    pub geocode: GeocodeConfig,

    /// Location resolution settings
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the weather data provider
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// Auto-refresh interval in minutes.
    ///
    /// The provider refreshes its own cache roughly every ten minutes;
    /// the default adds a safety buffer so polling never outpaces the
    /// data.
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,
}

fn default_weather_base_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_refresh_minutes() -> u32 {
    15
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            refresh_minutes: default_refresh_minutes(),
        }
    }
}

impl WeatherConfig {
    /// Auto-refresh interval as a duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_minutes) * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Base URL of the geocoding provider
    #[serde(default = "default_geocode_base_url")]
    pub base_url: String,

    /// Maximum forward-search results to request
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Queries shorter than this are ignored without a network call
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,

    /// Debounce window for search-as-you-type input, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_geocode_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_min_query_chars() -> usize {
    3
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocode_base_url(),
            max_results: default_max_results(),
            min_query_chars: default_min_query_chars(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl GeocodeConfig {
    /// Search debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Hours a saved location stays valid before fresh resolution
    #[serde(default = "default_saved_ttl_hours")]
    pub saved_ttl_hours: u32,

    /// Bound on how long a device-location request may take, in seconds
    #[serde(default = "default_gps_timeout_secs")]
    pub gps_timeout_secs: u64,

    /// Maximum age of a cached device position we accept, in seconds
    #[serde(default = "default_gps_max_age_secs")]
    pub gps_max_age_secs: u64,

    /// Maximum entries kept in search history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_saved_ttl_hours() -> u32 {
    24
}

fn default_gps_timeout_secs() -> u64 {
    10
}

fn default_gps_max_age_secs() -> u64 {
    300
}

fn default_history_limit() -> usize {
    8
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            saved_ttl_hours: default_saved_ttl_hours(),
            gps_timeout_secs: default_gps_timeout_secs(),
            gps_max_age_secs: default_gps_max_age_secs(),
            history_limit: default_history_limit(),
        }
    }
}

impl LocationConfig {
    /// Saved-location TTL as a duration.
    pub fn saved_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.saved_ttl_hours) * 3600)
    }

    /// Device-location timeout as a duration.
    pub fn gps_timeout(&self) -> Duration {
        Duration::from_secs(self.gps_timeout_secs)
    }

    /// Accepted age of cached device positions as a duration.
    pub fn gps_max_age(&self) -> Duration {
        Duration::from_secs(self.gps_max_age_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            geocode: GeocodeConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        if !validation.warnings.is_empty() {
            for warning in &validation.warnings {
                tracing::warn!("Config warning: {}", warning);
            }
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);
        self.validate_url(&self.geocode.base_url, "geocode.base_url", &mut result);

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Auto-refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Refresh interval is more than 24 hours",
            );
        }

        if self.geocode.max_results == 0 {
            result.add_error("geocode.max_results", "Must request at least one result");
        }

        if self.geocode.min_query_chars == 0 {
            result.add_warning(
                "geocode.min_query_chars",
                "Every keystroke will trigger a search request",
            );
        }

        if self.location.saved_ttl_hours == 0 {
            result.add_warning(
                "location.saved_ttl_hours",
                "Saved locations expire immediately (0 hours)",
            );
        }

        if self.location.gps_timeout_secs == 0 {
            result.add_error(
                "location.gps_timeout_secs",
                "Device location timeout must be greater than 0",
            );
        }

        if self.location.history_limit == 0 {
            result.add_warning("location.history_limit", "Search history disabled (0 entries)");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(
            result.is_valid(),
            "Default config should be valid: {:?}",
            result.errors
        );
    }

    #[test]
    fn test_invalid_weather_url() {
        let mut config = Config::default();
        config.weather.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.geocode.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_refresh_is_warning_not_error() {
        let mut config = Config::default();
        config.weather.refresh_minutes = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "weather.refresh_minutes"));
    }

    #[test]
    fn test_zero_max_results_is_error() {
        let mut config = Config::default();
        config.geocode.max_results = 0;
        let result = config.validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_zero_gps_timeout_is_error() {
        let mut config = Config::default();
        config.location.gps_timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_duration_accessors() {
        let config = Config::default();
        assert_eq!(config.weather.refresh_interval(), Duration::from_secs(900));
        assert_eq!(config.geocode.debounce(), Duration::from_millis(300));
        assert_eq!(config.location.saved_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            config_dir = "/tmp/skycast"

            [weather]
            refresh_minutes = 30
            "#,
        )
        .unwrap();
        assert_eq!(parsed.weather.refresh_minutes, 30);
        assert_eq!(parsed.weather.base_url, "https://api.weather.gov");
        assert_eq!(parsed.geocode.min_query_chars, 3);
        assert_eq!(parsed.location.saved_ttl_hours, 24);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
