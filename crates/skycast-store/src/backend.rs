//! Storage backend adapters.
//!
//! Each backend is polymorphic over `get`/`set`/`erase` plus availability
//! and consent checks. The [`PreferenceStore`](crate::PreferenceStore)
//! writes to the first available, consented backend and reads fall through
//! the priority list.

use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// A raw string-valued storage adapter.
pub trait StorageBackend: Send + Sync {
    /// Short backend identifier used in logs.
    fn name(&self) -> &str;

    /// Whether this backend can currently serve reads and writes.
    fn is_available(&self) -> bool;

    /// Whether writes to this backend are gated on the user's consent
    /// decision.
    fn requires_consent(&self) -> bool;

    /// Read the raw value for a key, `None` if absent.
    ///
    /// # Errors
    /// Returns an error if the backend itself fails; a missing key is not
    /// an error.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the raw value for a key.
    ///
    /// # Errors
    /// Returns an error if the value could not be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key if present.
    ///
    /// # Errors
    /// Returns an error if an existing entry could not be removed.
    fn erase(&self, key: &str) -> Result<(), StoreError>;
}

/// Durable backend storing one JSON file per key.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StorageBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn is_available(&self) -> bool {
        fs::create_dir_all(&self.dir).is_ok()
    }

    fn requires_consent(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.key_path(key), value)?;
        Ok(())
    }

    fn erase(&self, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Session-scoped in-process backend.
///
/// Always available and never gated on consent; values vanish when the
/// process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn requires_consent(&self) -> bool {
        false
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn erase(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_backend_round_trip() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        assert_eq!(backend.get("missing").unwrap(), None);

        backend.set("theme", "\"dark\"").unwrap();
        assert_eq!(backend.get("theme").unwrap().as_deref(), Some("\"dark\""));

        backend.erase("theme").unwrap();
        assert_eq!(backend.get("theme").unwrap(), None);
    }

    #[test]
    fn test_file_backend_erase_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.erase("never_written").unwrap();
    }

    #[test]
    fn test_file_backend_creates_directory_on_write() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("prefs").join("store");
        let backend = FileBackend::new(&nested);

        backend.set("timezone", "\"America/New_York\"").unwrap();
        assert!(nested.join("timezone.json").exists());
    }

    #[test]
    fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();

        assert_eq!(backend.get("missing").unwrap(), None);

        backend.set("consent", "\"granted\"").unwrap();
        assert_eq!(
            backend.get("consent").unwrap().as_deref(),
            Some("\"granted\"")
        );

        backend.erase("consent").unwrap();
        assert_eq!(backend.get("consent").unwrap(), None);
    }

    #[test]
    fn test_consent_requirements() {
        let dir = TempDir::new().unwrap();
        assert!(FileBackend::new(dir.path()).requires_consent());
        assert!(!MemoryBackend::new().requires_consent());
    }
}
