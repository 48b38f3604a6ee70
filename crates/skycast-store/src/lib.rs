//! Durable preference storage for skycast.
//!
//! A typed key-value facade (`PreferenceStore`) over a prioritized list of
//! storage backends. Callers work with saved locations, search history,
//! theme and consent values; they never learn which backend served them.

pub mod backend;
pub mod error;
pub mod store;
pub mod types;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use error::StoreError;
pub use store::PreferenceStore;
pub use types::{ConsentDecision, SavedLocation, ThemeMode};
