//! Device location source seam.

use async_trait::async_trait;
use skycast_core::Coordinates;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location request timed out after {0:?}")]
    Timeout(Duration),

    #[error("No location service available")]
    ServiceUnavailable,

    #[error("Location service error: {0}")]
    Other(String),
}

impl LocationError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Location access was denied. Search for a place instead.".to_string()
            }
            Self::Timeout(_) => "Finding your location took too long.".to_string(),
            Self::ServiceUnavailable => {
                "Location services aren't available here. Search for a place instead.".to_string()
            }
            Self::Other(_) => "Couldn't determine your location.".to_string(),
        }
    }
}

/// A source of device positions.
///
/// Implementations must respect `timeout` and may serve a cached fix no
/// older than `max_age` instead of a fresh reading.
#[async_trait]
pub trait GeoSource: Send + Sync {
    async fn locate(
        &self,
        timeout: Duration,
        max_age: Duration,
    ) -> Result<Coordinates, LocationError>;
}

/// Platform location source.
///
/// No location service is wired on this platform, so every request
/// reports unavailable and resolution falls through to its next source.
pub struct SystemLocation;

#[async_trait]
impl GeoSource for SystemLocation {
    async fn locate(
        &self,
        _timeout: Duration,
        _max_age: Duration,
    ) -> Result<Coordinates, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[tokio::test]
    async fn test_system_location_is_unavailable() {
        let source = SystemLocation;
        let result = source
            .locate(Duration::from_secs(1), Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(LocationError::ServiceUnavailable)));
    }

    #[test]
    fn test_error_user_messages() {
        let err = LocationError::PermissionDenied;
        assert!(err.user_message().contains("denied"));

        let err = LocationError::Timeout(Duration::from_secs(10));
        assert!(err.user_message().contains("too long"));
    }
}
