//! Periodic weather refresh with single-flight fetch cycles.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use skycast_core::Place;
use skycast_weather::{
    CurrentConditions, DailyPeriod, HourlyEntry, MonthlyOutlook, WeatherClient, WeatherError,
    WeatherSnapshot,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Observable refresh status for the UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefreshState {
    pub is_refreshing: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub next_auto_refresh: Option<DateTime<Utc>>,
    /// User-facing summary of what failed in the last cycle, if anything.
    pub last_error: Option<String>,
}

enum Command {
    LocationChanged(Place),
    ManualRefresh,
    SetVisible(bool),
}

/// A fetch cycle currently in flight.
struct Flight {
    id: u64,
    grid_key: String,
}

/// What a fetch cycle produced, section by section.
struct CycleOutcome {
    id: u64,
    place: Place,
    current: Result<Option<CurrentConditions>, WeatherError>,
    seven_day: Result<Vec<DailyPeriod>, WeatherError>,
    hourly: Result<Vec<HourlyEntry>, WeatherError>,
    monthly: Result<Option<MonthlyOutlook>, WeatherError>,
}

/// Mutable state of the run loop, local to [`RefreshOrchestrator::run`].
struct LoopState {
    visible: bool,
    next_tick: Option<tokio::time::Instant>,
    in_flight: Option<Flight>,
    cycles: u64,
    last_success: Option<tokio::time::Instant>,
    place: Option<Place>,
}

/// Keeps the weather snapshot fresh for whatever place is active.
///
/// Cycles are single-flight: at most one runs at a time, and only the
/// newest cycle's outcome is committed, so a slow response for a
/// location the user already left can never clobber newer data.
pub struct RefreshOrchestrator {
    client: Arc<WeatherClient>,
    interval: Duration,
    cancel: CancellationToken,
    snapshot_tx: watch::Sender<Option<WeatherSnapshot>>,
    state_tx: watch::Sender<RefreshState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl RefreshOrchestrator {
    /// Build an orchestrator. A zero `interval` disables auto-refresh;
    /// manual and location-driven refreshes still work.
    pub fn new(interval: Duration, client: Arc<WeatherClient>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(None);
        let (state_tx, _) = watch::channel(RefreshState::default());

        Self {
            client,
            interval,
            cancel: CancellationToken::new(),
            snapshot_tx,
            state_tx,
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
        }
    }

    /// Watch the latest committed snapshot. `None` until the first
    /// commit.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<WeatherSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Watch refresh progress and scheduling.
    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.state_tx.subscribe()
    }

    /// Ask for an immediate refresh. Ignored while a cycle is in flight.
    pub fn request_refresh(&self) {
        let _ = self.cmd_tx.send(Command::ManualRefresh);
    }

    /// Point the orchestrator at a new place.
    ///
    /// The resolver's location channel feeds [`run`](Self::run) directly;
    /// this is for callers driving the orchestrator by hand.
    pub fn set_location(&self, place: Place) {
        let _ = self.cmd_tx.send(Command::LocationChanged(place));
    }

    /// Report dashboard visibility. Hiding pauses the auto-refresh timer;
    /// showing runs one catch-up cycle when the data has gone stale.
    pub fn set_visible(&self, visible: bool) {
        let _ = self.cmd_tx.send(Command::SetVisible(visible));
    }

    /// Stop the run loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Drive refresh cycles until [`shutdown`](Self::shutdown).
    ///
    /// Call once; a second call finds the command receiver taken and
    /// returns immediately.
    pub async fn run(&self, mut location_rx: mpsc::UnboundedReceiver<Place>) {
        let Some(mut cmd_rx) = self.cmd_rx.lock().take() else {
            warn!("Refresh loop is already running");
            return;
        };

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut state = LoopState {
            visible: true,
            next_tick: None,
            in_flight: None,
            cycles: 0,
            last_success: None,
            place: None,
        };

        info!(interval_secs = self.interval.as_secs(), "Refresh loop started");

        loop {
            let tick_at = state
                .next_tick
                .filter(|_| state.visible && self.auto_enabled());

            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("Refresh loop stopped");
                    return;
                }
                Some(place) = location_rx.recv() => {
                    self.handle_location(&mut state, &done_tx, place);
                }
                Some(cmd) = cmd_rx.recv() => match cmd {
                    Command::LocationChanged(place) => {
                        self.handle_location(&mut state, &done_tx, place);
                    }
                    Command::ManualRefresh => self.handle_manual(&mut state, &done_tx),
                    Command::SetVisible(visible) => {
                        self.handle_visibility(&mut state, &done_tx, visible);
                    }
                },
                Some(outcome) = done_rx.recv() => {
                    self.handle_outcome(&mut state, outcome);
                }
                () = maybe_sleep(tick_at) => {
                    self.handle_tick(&mut state, &done_tx);
                }
            }
        }
    }

    fn handle_location(
        &self,
        state: &mut LoopState,
        done_tx: &mpsc::UnboundedSender<CycleOutcome>,
        place: Place,
    ) {
        let same_in_flight = state
            .in_flight
            .as_ref()
            .is_some_and(|flight| flight.grid_key == place.coordinates.grid_key());
        state.place = Some(place.clone());

        if same_in_flight {
            debug!(place = %place.display_name, "Refresh already in flight for this location");
            return;
        }
        info!(place = %place.display_name, "Location changed, refreshing");
        self.start_cycle(state, done_tx, place);
    }

    fn handle_manual(&self, state: &mut LoopState, done_tx: &mpsc::UnboundedSender<CycleOutcome>) {
        if state.in_flight.is_some() {
            debug!("Manual refresh ignored, cycle already in flight");
            return;
        }
        match state.place.clone() {
            Some(place) => {
                info!("Manual refresh");
                self.start_cycle(state, done_tx, place);
            }
            None => debug!("Manual refresh ignored, no location yet"),
        }
    }

    fn handle_visibility(
        &self,
        state: &mut LoopState,
        done_tx: &mpsc::UnboundedSender<CycleOutcome>,
        visible: bool,
    ) {
        if state.visible == visible {
            return;
        }
        state.visible = visible;

        if !visible {
            debug!("Dashboard hidden, pausing auto-refresh");
            state.next_tick = None;
            self.publish_next_tick(state);
            return;
        }
        if !self.auto_enabled() {
            return;
        }

        let due = state
            .last_success
            .map_or(true, |at| at.elapsed() >= self.interval);
        if due {
            if state.in_flight.is_none() {
                if let Some(place) = state.place.clone() {
                    info!("Dashboard visible with stale data, refreshing");
                    self.start_cycle(state, done_tx, place);
                }
            }
        } else if let Some(at) = state.last_success {
            state.next_tick = Some(at + self.interval);
            self.publish_next_tick(state);
        }
    }

    fn handle_tick(&self, state: &mut LoopState, done_tx: &mpsc::UnboundedSender<CycleOutcome>) {
        state.next_tick = None;
        if state.in_flight.is_some() {
            return;
        }
        if let Some(place) = state.place.clone() {
            debug!("Auto-refresh tick");
            self.start_cycle(state, done_tx, place);
        }
    }

    fn handle_outcome(&self, state: &mut LoopState, outcome: CycleOutcome) {
        let newest = state
            .in_flight
            .as_ref()
            .is_some_and(|flight| flight.id == outcome.id);
        if !newest {
            debug!(cycle = outcome.id, "Discarding superseded refresh cycle");
            return;
        }
        state.in_flight = None;

        let place_current = state
            .place
            .as_ref()
            .is_some_and(|place| place.same_location(&outcome.place));
        if place_current {
            if self.commit(outcome) {
                state.last_success = Some(tokio::time::Instant::now());
            }
        } else {
            debug!("Discarding refresh for a location no longer shown");
            self.state_tx.send_modify(|s| s.is_refreshing = false);
        }

        if self.auto_enabled() && state.visible {
            state.next_tick = Some(tokio::time::Instant::now() + self.interval);
        }
        self.publish_next_tick(state);
    }

    fn start_cycle(
        &self,
        state: &mut LoopState,
        done_tx: &mpsc::UnboundedSender<CycleOutcome>,
        place: Place,
    ) {
        state.cycles += 1;
        let id = state.cycles;
        state.in_flight = Some(Flight {
            id,
            grid_key: place.coordinates.grid_key(),
        });
        state.next_tick = None;
        self.publish_next_tick(state);
        self.state_tx.send_modify(|s| s.is_refreshing = true);

        let client = Arc::clone(&self.client);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let coordinates = place.coordinates;
            let (current, seven_day, hourly, monthly) = tokio::join!(
                client.current_conditions(coordinates),
                client.seven_day(coordinates),
                client.hourly(coordinates),
                client.monthly_outlook(coordinates),
            );
            let outcome = CycleOutcome {
                id,
                place,
                current,
                seven_day,
                hourly,
                monthly,
            };
            // Loop may already be gone during shutdown.
            let _ = done_tx.send(outcome);
        });
    }

    /// Fold a cycle's outcome into one snapshot and publish it.
    ///
    /// Failed sections keep their previously shown data when the place
    /// hasn't changed, so one bad endpoint never blanks the dashboard.
    /// Returns true when every section fetched cleanly.
    fn commit(&self, outcome: CycleOutcome) -> bool {
        let prev = self
            .snapshot_tx
            .borrow()
            .clone()
            .filter(|snapshot| snapshot.place.same_location(&outcome.place));

        let mut errors: Vec<String> = Vec::new();

        let current = match outcome.current {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "Current conditions fetch failed");
                errors.push(e.user_message());
                prev.as_ref().and_then(|s| s.current.clone())
            }
        };
        let seven_day = match outcome.seven_day {
            Ok(periods) => periods,
            Err(e) => {
                warn!(error = %e, "Daily forecast fetch failed");
                errors.push(e.user_message());
                prev.as_ref()
                    .map(|s| s.seven_day.clone())
                    .unwrap_or_default()
            }
        };
        let hourly = match outcome.hourly {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Hourly forecast fetch failed");
                errors.push(e.user_message());
                prev.as_ref().map(|s| s.hourly.clone()).unwrap_or_default()
            }
        };
        let monthly = match outcome.monthly {
            Ok(outlook) => outlook,
            Err(e) => {
                warn!(error = %e, "Monthly outlook fetch failed");
                errors.push(e.user_message());
                prev.as_ref().and_then(|s| s.monthly.clone())
            }
        };

        let clean = errors.is_empty();
        let snapshot = WeatherSnapshot {
            place: outcome.place,
            current,
            seven_day,
            hourly,
            monthly,
            fetched_at: Utc::now(),
        };
        self.snapshot_tx.send_replace(Some(snapshot));

        errors.dedup();
        let last_error = if clean { None } else { Some(errors.join("; ")) };
        self.state_tx.send_modify(|s| {
            s.is_refreshing = false;
            s.last_refresh = Some(Utc::now());
            s.last_error = last_error.clone();
        });

        if clean {
            info!("Refresh complete");
        } else {
            warn!("Refresh completed with errors");
        }
        clean
    }

    fn publish_next_tick(&self, state: &LoopState) {
        let eta = state.next_tick.map(|at| {
            let remaining = at.saturating_duration_since(tokio::time::Instant::now());
            Utc::now()
                + chrono::Duration::from_std(remaining)
                    .unwrap_or_else(|_| chrono::Duration::zero())
        });
        self.state_tx.send_modify(|s| s.next_auto_refresh = eta);
    }

    fn auto_enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}

async fn maybe_sleep(at: Option<tokio::time::Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use skycast_core::WeatherConfig;

    fn orchestrator(interval: Duration) -> Arc<RefreshOrchestrator> {
        let config = WeatherConfig {
            // Unroutable port: these tests must never reach the network.
            base_url: "http://127.0.0.1:9".to_string(),
            refresh_minutes: 15,
        };
        let client = Arc::new(WeatherClient::new(&config).unwrap());
        Arc::new(RefreshOrchestrator::new(interval, client))
    }

    #[tokio::test]
    async fn test_shutdown_stops_run_loop() {
        let orch = orchestrator(Duration::from_secs(900));
        let (_tx, rx) = mpsc::unbounded_channel();

        let runner = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run(rx).await })
        };

        orch.shutdown();
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("run loop should stop after shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_run_returns_immediately() {
        let orch = orchestrator(Duration::from_secs(900));
        let (_tx, rx) = mpsc::unbounded_channel();
        let (_tx2, rx2) = mpsc::unbounded_channel();

        let runner = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run(rx).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The command receiver is already taken by the first call.
        tokio::time::timeout(Duration::from_secs(1), orch.run(rx2))
            .await
            .expect("second run call should return immediately");

        orch.shutdown();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_refresh_without_location_is_ignored() {
        let orch = orchestrator(Duration::from_secs(900));
        let (_tx, rx) = mpsc::unbounded_channel();

        let runner = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run(rx).await })
        };

        orch.request_refresh();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(orch.subscribe_snapshot().borrow().is_none());
        assert!(!orch.subscribe_state().borrow().is_refreshing);

        orch.shutdown();
        runner.await.unwrap();
    }
}
