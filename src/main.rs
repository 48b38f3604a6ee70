use anyhow::Result;
use skycast_app::{LocationResolver, RefreshOrchestrator, SystemLocation};
use skycast_core::Config;
use skycast_geocode::GeocodeClient;
use skycast_store::PreferenceStore;
use skycast_weather::{WeatherClient, WeatherSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    skycast_core::init()?;

    let (config, _validation) = Config::load_validated()?;
    tracing::info!("skycast started");

    // Service wiring
    let store = Arc::new(PreferenceStore::new(&config.config_dir));
    let geocode = Arc::new(GeocodeClient::new(&config.geocode)?);
    let weather = Arc::new(WeatherClient::new(&config.weather)?);

    let (resolver, location_rx) = LocationResolver::new(
        &config,
        Arc::clone(&store),
        Arc::clone(&geocode),
        Arc::new(SystemLocation),
    );
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        config.weather.refresh_interval(),
        Arc::clone(&weather),
    ));

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(location_rx).await })
    };

    // A first argument like "80301" or "/KSEA1/hourly" acts as a launch path.
    let launch_path = std::env::args().nth(1);
    resolver.resolve(launch_path.as_deref()).await;

    let state = resolver.subscribe().borrow().clone();
    match state.current {
        Some(place) => {
            println!("Location: {}", place.display_name);

            let mut snapshot_rx = orchestrator.subscribe_snapshot();
            match tokio::time::timeout(Duration::from_secs(30), first_snapshot(&mut snapshot_rx))
                .await
            {
                Ok(Some(snapshot)) => print_summary(&snapshot),
                _ => println!("Weather data is not available right now."),
            }

            let refresh = orchestrator.subscribe_state().borrow().clone();
            if let Some(error) = refresh.last_error {
                println!("Note: {}", error);
            }
        }
        None => {
            println!("No location available.");
            println!("Pass a location code (for example: skycast 80301) or search for a place.");
        }
    }

    // Graceful shutdown
    orchestrator.shutdown();
    runner.await?;

    Ok(())
}

async fn first_snapshot(
    rx: &mut watch::Receiver<Option<WeatherSnapshot>>,
) -> Option<WeatherSnapshot> {
    loop {
        if let Some(snapshot) = rx.borrow().clone() {
            return Some(snapshot);
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}

fn print_summary(snapshot: &WeatherSnapshot) {
    if let Some(current) = &snapshot.current {
        let description = current.description.as_deref().unwrap_or("Conditions");
        match (current.temperature_c, current.temperature_f()) {
            (Some(c), Some(f)) => println!("Now: {} {:.0}°C / {:.0}°F", description, c, f),
            _ => println!("Now: {}", description),
        }
    }

    if !snapshot.seven_day.is_empty() {
        println!("Forecast:");
        for period in snapshot.seven_day.iter().take(4) {
            println!(
                "  {}: {:.0}°{} {}",
                period.name, period.temperature, period.temperature_unit, period.short_forecast,
            );
        }
    }

    if let Some(monthly) = &snapshot.monthly {
        if let (Some(high), Some(low)) = (monthly.average_high, monthly.average_low) {
            println!("Outlook: highs around {:.0}°, lows around {:.0}°", high, low);
        }
    }

    println!("Fetched at {}", snapshot.fetched_at.format("%H:%M UTC"));
}
