//! Nominatim-style geocoding client.

use crate::error::GeocodeError;
use serde::Deserialize;
use skycast_core::{Coordinates, GeocodeConfig, Place};
use std::time::Duration;
use tracing::instrument;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "skycast/0.1.0 (https://github.com/skycast)";

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    error: Option<String>,
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

pub struct GeocodeClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl GeocodeClient {
    /// Build a client for the configured geocoding endpoint.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &GeocodeConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    /// Forward search by free text, bounded by the configured result count.
    ///
    /// Results keep the provider's ranking; more than one entry means the
    /// query is ambiguous and the caller should offer disambiguation.
    ///
    /// # Errors
    /// `NotFound` for zero results, `Status`/`Unavailable` for service
    /// failures, `Decode` for malformed payloads.
    #[instrument(skip(self), level = "info")]
    pub async fn search(&self, query: &str) -> Result<Vec<Place>, GeocodeError> {
        let url = format!(
            "{}/search?q={}&format=json&addressdetails=1&limit={}",
            self.base_url,
            urlencoding::encode(query),
            self.max_results,
        );

        let response = self.client.get(&url).send().await?;
        let results: Vec<SearchResult> = self.handle_response(response).await?;

        if results.is_empty() {
            return Err(GeocodeError::NotFound(query.to_string()));
        }

        let mut places = Vec::with_capacity(results.len());
        for result in results {
            let coordinates = parse_coordinates(&result.lat, &result.lon)?;
            places.push(to_place(
                coordinates,
                result.address,
                result.display_name.as_deref(),
            ));
        }

        tracing::info!(count = places.len(), "Forward geocoded query");
        Ok(places)
    }

    /// Forward search returning only the best match.
    ///
    /// # Errors
    /// Same taxonomy as [`search`](Self::search).
    pub async fn search_one(&self, query: &str) -> Result<Place, GeocodeError> {
        let places = self.search(query).await?;
        places
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(query.to_string()))
    }

    /// Reverse lookup: coordinates to a normalized place.
    ///
    /// # Errors
    /// `NotFound` when the provider cannot name the area, otherwise the
    /// usual service-failure taxonomy.
    #[instrument(skip(self), level = "info")]
    pub async fn reverse(&self, coordinates: Coordinates) -> Result<Place, GeocodeError> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1&zoom=10",
            self.base_url, coordinates.latitude, coordinates.longitude,
        );

        let response = self.client.get(&url).send().await?;
        let result: ReverseResult = self.handle_response(response).await?;

        if let Some(message) = result.error {
            return Err(GeocodeError::NotFound(message));
        }

        // Keep the caller's coordinates; the provider snaps to the matched
        // object and that would change the location identity.
        let place = to_place(coordinates, result.address, result.display_name.as_deref());
        tracing::info!(name = %place.display_name, "Reverse geocoded");
        Ok(place)
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GeocodeError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| GeocodeError::Decode(format!("JSON parse error: {}", e)))
        } else {
            Err(GeocodeError::Status(status))
        }
    }
}

fn parse_coordinates(lat: &str, lon: &str) -> Result<Coordinates, GeocodeError> {
    let latitude: f64 = lat
        .parse()
        .map_err(|_| GeocodeError::Decode(format!("Bad latitude: {}", lat)))?;
    let longitude: f64 = lon
        .parse()
        .map_err(|_| GeocodeError::Decode(format!("Bad longitude: {}", lon)))?;
    Coordinates::new(latitude, longitude).map_err(|e| GeocodeError::Decode(e.to_string()))
}

fn to_place(
    coordinates: Coordinates,
    address: Option<NominatimAddress>,
    provider_display: Option<&str>,
) -> Place {
    let Some(address) = address else {
        let display_name = provider_display
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| coordinates.coordinate_text());
        return Place {
            coordinates,
            display_name,
            city: None,
            state: None,
            country: None,
        };
    };

    let city = address
        .city
        .clone()
        .or_else(|| address.town.clone())
        .or_else(|| address.village.clone())
        .or_else(|| address.municipality.clone());
    let state = address.state.clone();
    let country = address.country.clone();

    let display_name = short_display_name(address)
        .or_else(|| {
            provider_display
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| coordinates.coordinate_text());

    Place {
        coordinates,
        display_name,
        city,
        state,
        country,
    }
}

/// Assemble a short display name from address components.
///
/// Prefers city > town > village > municipality > district > county >
/// state > country for the primary name, then appends the state (or the
/// country, for places without one) when it disambiguates.
fn short_display_name(address: NominatimAddress) -> Option<String> {
    // Capture state/country before the place chain consumes them
    let state = address.state.clone();
    let country = address.country.clone();

    let place = address
        .city
        .or(address.town)
        .or(address.village)
        .or(address.municipality)
        .or(address.state_district)
        .or(address.county)
        .or(address.state)
        .or(address.country)?;

    let suffix = state
        .as_ref()
        .filter(|s| !s.is_empty() && s.as_str() != place)
        .map(String::as_str)
        .or_else(|| {
            country
                .as_ref()
                .filter(|c| !c.is_empty() && c.as_str() != place)
                .map(String::as_str)
        });

    Some(match suffix {
        Some(s) => format!("{}, {}", place, s),
        None => place,
    })
}
