//! Location resolution: decides which place the dashboard shows.

use crate::geo::{GeoSource, LocationError};
use crate::heuristics::{extract_location_code, needs_display_name_upgrade};
use skycast_core::{Config, Coordinates, Place};
use skycast_geocode::{GeocodeClient, GeocodeError};
use skycast_store::{PreferenceStore, SavedLocation};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Progress of a search-as-you-type query.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchStatus {
    #[default]
    Idle,
    Searching,
    /// Several places matched; the user has to pick one.
    Candidates(Vec<Place>),
    NotFound,
    Failed(String),
}

/// Observable resolver state for the UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolverState {
    /// The place currently driving the dashboard.
    pub current: Option<Place>,
    /// True while the resolution chain is running.
    pub is_resolving: bool,
    /// True when every source came up empty and the UI should open search.
    pub prompt_search: bool,
    pub search: SearchStatus,
}

#[derive(Clone, Copy)]
enum Persist {
    /// Record as the saved location for future launches.
    Durable,
    /// Show it, but leave the saved location alone.
    SessionOnly,
}

/// Picks the active place from prioritized sources and publishes every
/// change on a watch channel plus a location event channel for the
/// refresh loop.
pub struct LocationResolver {
    store: Arc<PreferenceStore>,
    geocode: Arc<GeocodeClient>,
    geo: Arc<dyn GeoSource>,
    saved_ttl: Duration,
    gps_timeout: Duration,
    gps_max_age: Duration,
    history_limit: usize,
    min_query_chars: usize,
    debounce: Duration,
    state_tx: watch::Sender<ResolverState>,
    location_tx: mpsc::UnboundedSender<Place>,
    search_generation: AtomicU64,
}

impl LocationResolver {
    /// Build a resolver. The returned receiver yields every committed
    /// place, in order, and is meant to feed the refresh orchestrator.
    pub fn new(
        config: &Config,
        store: Arc<PreferenceStore>,
        geocode: Arc<GeocodeClient>,
        geo: Arc<dyn GeoSource>,
    ) -> (Self, mpsc::UnboundedReceiver<Place>) {
        let (location_tx, location_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ResolverState::default());

        let resolver = Self {
            store,
            geocode,
            geo,
            saved_ttl: config.location.saved_ttl(),
            gps_timeout: config.location.gps_timeout(),
            gps_max_age: config.location.gps_max_age(),
            history_limit: config.location.history_limit,
            min_query_chars: config.geocode.min_query_chars,
            debounce: config.geocode.debounce(),
            state_tx,
            location_tx,
            search_generation: AtomicU64::new(0),
        };
        (resolver, location_rx)
    }

    /// Watch the resolver's observable state.
    pub fn subscribe(&self) -> watch::Receiver<ResolverState> {
        self.state_tx.subscribe()
    }

    /// Run the resolution chain and commit the first source that yields a
    /// usable place.
    ///
    /// Source order: launch-path location code, manual pin, saved
    /// location, device position. When every source comes up empty the
    /// state asks the UI to prompt for a search rather than reporting an
    /// error.
    #[instrument(skip(self), level = "info")]
    pub async fn resolve(&self, launch_path: Option<&str>) {
        self.state_tx.send_modify(|state| {
            state.is_resolving = true;
            state.prompt_search = false;
        });

        if let Some(code) = launch_path.and_then(extract_location_code) {
            match self.geocode.search_one(code).await {
                Ok(place) => {
                    info!(code, place = %place.display_name, "Resolved launch-path code");
                    self.commit(place, Persist::SessionOnly);
                    return;
                }
                Err(e) => {
                    debug!(code, error = %e, "Launch-path code did not geocode");
                }
            }
        }

        if let Some(pin) = self.store.manual_pin() {
            if pin.coordinates.is_valid() {
                info!(place = %pin.display_name, "Resolved from manual pin");
                self.commit(pin, Persist::SessionOnly);
                return;
            }
            debug!("Ignoring manual pin with out-of-range coordinates");
        }

        if let Some(saved) = self.store.saved_location() {
            if !saved.is_expired(self.saved_ttl) && saved.place.coordinates.is_valid() {
                let place = self.upgrade_display_name(saved.place).await;
                info!(place = %place.display_name, "Resolved from saved location");
                self.commit(place, Persist::Durable);
                return;
            }
            debug!("Saved location expired or out of range");
        }

        match self.device_position().await {
            Ok(coordinates) if coordinates.is_valid() => {
                let place = match self.geocode.reverse(coordinates).await {
                    Ok(place) => place,
                    Err(e) => {
                        debug!(error = %e, "Reverse geocode failed, labeling by coordinates");
                        Place::from_coordinates(coordinates)
                    }
                };
                info!(place = %place.display_name, "Resolved from device position");
                self.commit(place, Persist::Durable);
                return;
            }
            Ok(_) => {
                debug!("Device position out of range");
            }
            Err(e) => {
                debug!(error = %e, "Device position unavailable");
            }
        }

        info!("No location source available, prompting for search");
        self.state_tx.send_modify(|state| {
            state.is_resolving = false;
            state.prompt_search = true;
        });
    }

    /// Handle a search-as-you-type query.
    ///
    /// Debounces input, discards results that arrive after a newer query,
    /// and commits immediately on an unambiguous single match.
    #[instrument(skip(self), level = "info")]
    pub async fn submit_search(&self, query: &str) {
        let query = query.trim().to_string();
        // Every keystroke supersedes whatever search is still in flight,
        // including keystrokes too short to search on.
        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;

        if query.chars().count() < self.min_query_chars {
            self.state_tx
                .send_modify(|state| state.search = SearchStatus::Idle);
            return;
        }

        self.state_tx
            .send_modify(|state| state.search = SearchStatus::Searching);

        tokio::time::sleep(self.debounce).await;
        if self.is_stale(generation) {
            debug!(query = %query, "Search superseded during debounce");
            return;
        }

        let result = self.geocode.search(&query).await;
        if self.is_stale(generation) {
            debug!(query = %query, "Search superseded by newer query");
            return;
        }

        match result {
            Ok(mut places) => {
                if places.len() == 1 {
                    if let Some(place) = places.pop() {
                        info!(place = %place.display_name, "Single search match");
                        self.commit(place, Persist::Durable);
                    }
                } else {
                    debug!(count = places.len(), "Ambiguous search");
                    self.state_tx
                        .send_modify(|state| state.search = SearchStatus::Candidates(places));
                }
            }
            Err(GeocodeError::NotFound(_)) => {
                self.state_tx
                    .send_modify(|state| state.search = SearchStatus::NotFound);
            }
            Err(e) => {
                warn!(error = %e, "Search request failed");
                self.state_tx
                    .send_modify(|state| state.search = SearchStatus::Failed(e.user_message()));
            }
        }
    }

    /// Commit a candidate the user picked from an ambiguous search.
    pub fn select(&self, place: Place) {
        info!(place = %place.display_name, "Search candidate selected");
        self.commit(place, Persist::Durable);
    }

    /// Place a manual pin at the given coordinates.
    ///
    /// The pin gets a reverse-geocoded name when the provider cooperates
    /// and a coordinate label otherwise. It lives under its own key, so
    /// the previously saved location survives for when the pin clears.
    #[instrument(skip(self), level = "info")]
    pub async fn set_pin(&self, coordinates: Coordinates) {
        let place = match self.geocode.reverse(coordinates).await {
            Ok(place) => place,
            Err(e) => {
                debug!(error = %e, "Reverse geocode failed, labeling pin by coordinates");
                Place::from_coordinates(coordinates)
            }
        };
        if let Err(e) = self.store.set_manual_pin(&place) {
            warn!(error = %e, "Failed to store manual pin");
        }
        self.commit(place, Persist::SessionOnly);
    }

    /// Drop the manual pin and fall back to the next location source.
    pub async fn clear_pin(&self) {
        self.store.clear_manual_pin();
        self.resolve(None).await;
    }

    async fn device_position(&self) -> Result<Coordinates, LocationError> {
        // Outer bound in case a source ignores the timeout it was given.
        match tokio::time::timeout(
            self.gps_timeout,
            self.geo.locate(self.gps_timeout, self.gps_max_age),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout(self.gps_timeout)),
        }
    }

    /// Replace a placeholder display name with a fresh reverse geocode.
    /// Failure keeps the stored name; an upgrade is never worth blocking
    /// resolution on.
    async fn upgrade_display_name(&self, place: Place) -> Place {
        if !needs_display_name_upgrade(&place.display_name) {
            return place;
        }
        match self.geocode.reverse(place.coordinates).await {
            Ok(fresh) => fresh,
            Err(e) => {
                debug!(error = %e, "Display name upgrade failed, keeping stored name");
                place
            }
        }
    }

    fn commit(&self, place: Place, persist: Persist) {
        if matches!(persist, Persist::Durable) {
            if let Err(e) = self
                .store
                .set_saved_location(&SavedLocation::now(place.clone()))
            {
                warn!(error = %e, "Failed to persist resolved location");
            }
        }
        if let Err(e) = self.store.push_history(&place, self.history_limit) {
            warn!(error = %e, "Failed to record location history");
        }

        self.state_tx.send_modify(|state| {
            state.current = Some(place.clone());
            state.is_resolving = false;
            state.prompt_search = false;
            state.search = SearchStatus::Idle;
        });

        // Receiver may already be gone during shutdown.
        let _ = self.location_tx.send(place);
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.search_generation.load(Ordering::SeqCst) != generation
    }
}
