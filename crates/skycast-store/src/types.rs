//! Persisted value types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use skycast_core::Place;
use std::time::Duration;

/// A resolved location persisted across sessions.
///
/// Created or overwritten on every successful resolution, read once at
/// startup, and discarded once it ages past the configured TTL window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedLocation {
    /// The resolved place
    pub place: Place,

    /// When this location was saved (Unix timestamp)
    pub saved_at: i64,
}

impl SavedLocation {
    /// Wrap a place with the current timestamp.
    pub fn now(place: Place) -> Self {
        Self {
            place,
            saved_at: Utc::now().timestamp(),
        }
    }

    /// Check whether this saved location has aged past the TTL window.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(self.saved_at) >= ttl_secs
    }
}

/// Theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

/// The user's decision on durable on-device storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    Granted,
    Denied,
}

impl ConsentDecision {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use skycast_core::Coordinates;

    fn place() -> Place {
        Place {
            coordinates: Coordinates::new(39.9612, -82.9988).unwrap(),
            display_name: "Columbus, Ohio".to_string(),
            city: Some("Columbus".to_string()),
            state: Some("Ohio".to_string()),
            country: None,
        }
    }

    #[test]
    fn test_fresh_location_not_expired() {
        let saved = SavedLocation::now(place());
        assert!(!saved.is_expired(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_old_location_expired() {
        let saved = SavedLocation {
            place: place(),
            saved_at: Utc::now().timestamp() - 90_000, // 25 hours ago
        };
        assert!(saved.is_expired(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let saved = SavedLocation::now(place());
        assert!(saved.is_expired(Duration::ZERO));
    }

    #[test]
    fn test_theme_mode_round_trips_lowercase() {
        let json = serde_json::to_string(&ThemeMode::Dark).unwrap();
        assert_eq!(json, "\"dark\"");
        let parsed: ThemeMode = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(parsed, ThemeMode::System);
    }

    #[test]
    fn test_theme_mode_defaults_to_system() {
        assert_eq!(ThemeMode::default(), ThemeMode::System);
    }

    #[test]
    fn test_consent_decision() {
        assert!(ConsentDecision::Granted.is_granted());
        assert!(!ConsentDecision::Denied.is_granted());
    }
}
