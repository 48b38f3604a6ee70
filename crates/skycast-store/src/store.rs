//! Typed preference store over prioritized backends.

use crate::backend::{FileBackend, MemoryBackend, StorageBackend};
use crate::error::StoreError;
use crate::types::{ConsentDecision, SavedLocation, ThemeMode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use skycast_core::Place;
use std::path::Path;

mod keys {
    pub const SAVED_LOCATION: &str = "saved_location";
    pub const SEARCH_HISTORY: &str = "search_history";
    pub const MANUAL_PIN: &str = "manual_pin";
    pub const THEME: &str = "theme";
    pub const TIMEZONE: &str = "timezone";
    pub const CONSENT: &str = "consent";
    pub const LAST_SEEN_VERSION: &str = "last_seen_version";
}

/// Typed key-value store for user preferences.
///
/// Writes land on the first available backend the user has consented to;
/// reads fall through the priority list; erases hit every backend. Corrupt
/// or missing entries read back as defaults rather than errors.
pub struct PreferenceStore {
    backends: Vec<Box<dyn StorageBackend>>,
}

impl PreferenceStore {
    /// Build the default backend stack: durable files under
    /// `<config_dir>/store`, with an in-process fallback for sessions
    /// where durable storage is unavailable or not consented to.
    pub fn new(config_dir: &Path) -> Self {
        Self::with_backends(vec![
            Box::new(FileBackend::new(config_dir.join("store"))),
            Box::new(MemoryBackend::new()),
        ])
    }

    /// Build a store over an explicit backend list, highest priority first.
    pub fn with_backends(backends: Vec<Box<dyn StorageBackend>>) -> Self {
        Self { backends }
    }

    // Raw layer ----------------------------------------------------------

    fn read_raw(&self, key: &str) -> Option<String> {
        for backend in &self.backends {
            if !backend.is_available() {
                continue;
            }
            match backend.get(key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(backend = backend.name(), key, error = %e, "Backend read failed");
                }
            }
        }
        None
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let granted = self.consent_granted();
        for backend in &self.backends {
            if !backend.is_available() {
                continue;
            }
            if backend.requires_consent() && !granted {
                continue;
            }
            backend.set(key, value)?;
            tracing::debug!(backend = backend.name(), key, "Stored value");
            return Ok(());
        }
        Err(StoreError::NoBackend)
    }

    /// Like `write_raw` but skips the consent gate. Used for the consent
    /// decision itself, which must be recordable before it is granted.
    fn write_raw_unchecked(&self, key: &str, value: &str) -> Result<(), StoreError> {
        for backend in &self.backends {
            if !backend.is_available() {
                continue;
            }
            backend.set(key, value)?;
            return Ok(());
        }
        Err(StoreError::NoBackend)
    }

    fn erase_raw(&self, key: &str) {
        for backend in &self.backends {
            if let Err(e) = backend.erase(key) {
                tracing::debug!(backend = backend.name(), key, error = %e, "Backend erase failed");
            }
        }
    }

    fn read_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Ignoring corrupt stored value");
                None
            }
        }
    }

    fn write_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.write_raw(key, &raw)
    }

    // Saved location -----------------------------------------------------

    /// The persisted location, if any. Expiry is the caller's concern.
    pub fn saved_location(&self) -> Option<SavedLocation> {
        self.read_value(keys::SAVED_LOCATION)
    }

    /// Persist a resolved location.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn set_saved_location(&self, location: &SavedLocation) -> Result<(), StoreError> {
        self.write_value(keys::SAVED_LOCATION, location)
    }

    pub fn clear_saved_location(&self) {
        self.erase_raw(keys::SAVED_LOCATION);
    }

    // Search history -----------------------------------------------------

    /// Search history, most recent first. Corrupt data reads as empty.
    pub fn search_history(&self) -> Vec<Place> {
        self.read_value(keys::SEARCH_HISTORY).unwrap_or_default()
    }

    /// Push a place onto the history: de-duplicated by display name,
    /// most-recent-first, capped at `limit` entries.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn push_history(&self, place: &Place, limit: usize) -> Result<(), StoreError> {
        let mut history = self.search_history();
        history.retain(|entry| entry.display_name != place.display_name);
        history.insert(0, place.clone());
        history.truncate(limit);
        self.write_value(keys::SEARCH_HISTORY, &history)
    }

    /// Remove a single history entry by display name.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn remove_history(&self, display_name: &str) -> Result<(), StoreError> {
        let mut history = self.search_history();
        history.retain(|entry| entry.display_name != display_name);
        self.write_value(keys::SEARCH_HISTORY, &history)
    }

    pub fn clear_history(&self) {
        self.erase_raw(keys::SEARCH_HISTORY);
    }

    // Manual pin ---------------------------------------------------------

    /// The user-placed pin, if set. Presence is the flag.
    pub fn manual_pin(&self) -> Option<Place> {
        self.read_value(keys::MANUAL_PIN)
    }

    /// Persist a user-placed pin.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn set_manual_pin(&self, place: &Place) -> Result<(), StoreError> {
        self.write_value(keys::MANUAL_PIN, place)
    }

    pub fn clear_manual_pin(&self) {
        self.erase_raw(keys::MANUAL_PIN);
    }

    // Display preferences ------------------------------------------------

    /// Theme preference, defaulting to following the system.
    pub fn theme(&self) -> ThemeMode {
        self.read_value(keys::THEME).unwrap_or_default()
    }

    /// Persist the theme preference.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn set_theme(&self, theme: ThemeMode) -> Result<(), StoreError> {
        self.write_value(keys::THEME, &theme)
    }

    /// Preferred display timezone (IANA name), if the user set one.
    pub fn timezone(&self) -> Option<String> {
        self.read_value(keys::TIMEZONE)
    }

    /// Persist the preferred display timezone.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn set_timezone(&self, timezone: &str) -> Result<(), StoreError> {
        self.write_value(keys::TIMEZONE, &timezone)
    }

    // Consent ------------------------------------------------------------

    /// The user's storage consent decision, `None` while undecided.
    pub fn consent(&self) -> Option<ConsentDecision> {
        self.read_value(keys::CONSENT)
    }

    /// Record the consent decision. Always writable, since the decision
    /// must be recordable before consent exists.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn set_consent(&self, decision: ConsentDecision) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&decision)?;
        self.write_raw_unchecked(keys::CONSENT, &raw)
    }

    fn consent_granted(&self) -> bool {
        self.consent().is_some_and(ConsentDecision::is_granted)
    }

    // App version --------------------------------------------------------

    /// The app version last seen by this install, for changelog gating.
    pub fn last_seen_version(&self) -> Option<String> {
        self.read_value(keys::LAST_SEEN_VERSION)
    }

    /// Record the running app version.
    ///
    /// # Errors
    /// Returns an error if no backend accepted the write.
    pub fn set_last_seen_version(&self, version: &str) -> Result<(), StoreError> {
        self.write_value(keys::LAST_SEEN_VERSION, &version)
    }
}
