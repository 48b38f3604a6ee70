//! Domain types shared across the skycast crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Geographic coordinates in floating-point degrees.
///
/// A pair is immutable once produced by a resolution step; a new
/// resolution event creates a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A latitude/longitude pair outside the valid degree ranges.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("coordinates out of range: lat={latitude}, lon={longitude}")]
pub struct CoordinatesOutOfRange {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build a validated pair: -90 <= lat <= 90, -180 <= lon <= 180.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinatesOutOfRange> {
        let pair = Self {
            latitude,
            longitude,
        };
        if pair.is_valid() {
            Ok(pair)
        } else {
            Err(CoordinatesOutOfRange {
                latitude,
                longitude,
            })
        }
    }

    /// Whether the pair is inside the valid degree ranges. Persisted
    /// pairs are re-checked with this after deserialization.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Identity key at the precision the weather provider resolves
    /// points to (four decimal places). Two pairs with the same grid
    /// key name the same forecast location.
    pub fn grid_key(&self) -> String {
        format!("{:.4},{:.4}", self.latitude, self.longitude)
    }

    /// Display fallback when no geocoded name is available.
    pub fn coordinate_text(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// A resolved, user-facing location identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub coordinates: Coordinates,
    pub display_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Place {
    /// A place known only by its coordinates.
    pub fn from_coordinates(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            display_name: coordinates.coordinate_text(),
            city: None,
            state: None,
            country: None,
        }
    }

    /// Whether two places name the same forecast location.
    pub fn same_location(&self, other: &Place) -> bool {
        self.coordinates.grid_key() == other.coordinates.grid_key()
    }
}
