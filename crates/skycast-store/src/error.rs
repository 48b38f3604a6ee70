//! Storage-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No storage backend available for writing")]
    NoBackend,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoBackend => "Preferences can't be saved right now.".to_string(),
            Self::Io(_) => "Couldn't write to local storage.".to_string(),
            Self::Serialize(_) => "Couldn't save your preferences.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = StoreError::NoBackend;
        assert!(err.user_message().contains("saved"));

        let io = StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(io.user_message().contains("storage"));
    }
}
