use orbit_tracker::config;
use orbit_tracker::module::filter::preset_filter;
use orbit_tracker::module::store::Command;
use orbit_tracker::module::tracker::{ElementSetUpdater, LogRenderAdapter, RenderAdapter, Tracker, ViewSupervisor};

use anyhow::Result;
use orbit_common::{HorizonHours, ViewMode};
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::read_config(&config_path)?;

    // Initialize logging
    let _logging_guard = orbit_tracker::logging::init_logging(&config.log_dir, "orbit-tracker", &config.log_level)?;

    tracing::info!("Orbit tracker starting...");
    tracing::info!("Element-set provider: {}", config.provider.base_url);

    let tracker = Arc::new(Tracker::from_config(config)?);

    // Optional startup view, e.g. ORBIT_FILTER=starlink ORBIT_MODE=map ORBIT_HORIZON=48h ORBIT_OBSERVER="London"
    if let Ok(id) = std::env::var("ORBIT_FILTER") {
        match preset_filter(&id) {
            Some(filter) => {
                tracker.apply(Command::SetFilter(Some(filter))).await?;
                tracing::info!("Constellation filter: {}", id);
            }
            None => tracing::warn!("Unknown constellation '{}', showing everything", id),
        }
    }
    if let Ok(mode) = std::env::var("ORBIT_MODE") {
        match mode.parse::<ViewMode>() {
            Ok(mode) => {
                tracker.apply(Command::SetMode(mode)).await?;
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }
    if let Ok(horizon) = std::env::var("ORBIT_HORIZON") {
        match horizon.parse::<HorizonHours>() {
            Ok(horizon) => {
                tracker.apply(Command::SetHorizon(horizon)).await?;
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }
    if let Ok(place) = std::env::var("ORBIT_OBSERVER") {
        match tracker.set_observer_by_name(&place).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!("Could not locate observer '{}'", place),
            Err(e) => tracing::warn!("Geocoding failed: {:#}", e),
        }
    }

    let updater_handle = ElementSetUpdater::new(tracker.clone(), config.refresh.interval())
        .start_with_initial_update()
        .await;

    let mut supervisor = ViewSupervisor::new(tracker.clone(), config.refresh.frame_interval());
    let adapters: Vec<_> = ViewMode::ALL
        .into_iter()
        .map(|mode| Arc::new(LogRenderAdapter::new(mode)))
        .collect();
    for adapter in &adapters {
        supervisor.register(adapter.clone());
    }
    let state = tracker.state().await;
    supervisor.reconcile(&*state);
    tracing::info!("View drivers started, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    supervisor.shutdown();
    updater_handle.abort();
    for adapter in &adapters {
        tracing::info!("{} view rendered {} frames", adapter.mode(), adapter.frames_rendered());
    }

    Ok(())
}
