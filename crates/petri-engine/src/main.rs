//! Headless runner for the Petri grid ecosystem.
//!
//! Loads configuration, builds the world, runs the tick loop, and
//! optionally writes the final snapshot as JSON.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or
//!    `petri-config.yaml` in the working directory
//! 2. Initialize structured logging (tracing)
//! 3. Build the grid manager, paint obstacles, seed tiles and organisms
//! 4. Run the tick loop until the tick budget is spent or the
//!    population dies out
//! 5. Log the result and export the final snapshot

mod error;
mod run;

use std::path::{Path, PathBuf};

use petri_core::config::LoggingConfig;
use petri_core::{GridManager, SimulationConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const DEFAULT_CONFIG_PATH: &str = "petri-config.yaml";

/// Application entry point for the headless runner.
///
/// # Errors
///
/// Returns an error if configuration, world construction, or the
/// snapshot export fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    // 1. Load configuration. Logging is not up yet, so note the fallback
    //    after initialization.
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);

    info!("petri-engine starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        rows = config.world.rows,
        cols = config.world.cols,
        seed = config.world.seed,
        initial_population = config.world.initial_population,
        ticks = config.run.ticks,
        scheduled_events = config.events.schedule.len(),
        "World parameters"
    );

    // 3. Build the world.
    let mut manager = GridManager::from_config(&config).map_err(EngineError::from)?;
    info!(
        population = manager.grid().population(),
        obstacles = manager.grid().obstacle_count(),
        tile_energy = manager.grid().total_tile_energy(),
        "World seeded"
    );

    // 4. Run.
    let (last, totals, outcome) = run::run(
        &mut manager,
        &config.tick,
        &config.run,
        config.logging.summary_interval,
    );

    // 5. Report.
    info!(
        ?outcome,
        ticks = totals.ticks,
        final_population = last.population,
        peak_population = totals.peak_population,
        births = totals.births,
        deaths = totals.deaths,
        fights = totals.fights,
        cooperations = totals.cooperations,
        blocked = totals.blocked,
        collaborator_failures = manager.collaborators().failures().total(),
        "Simulation finished"
    );

    if let Some(path) = &config.run.snapshot_path {
        run::write_snapshot(&last, path)?;
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load simulation configuration from `path`.
///
/// A missing file yields the defaults; the flag reports which happened.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        let config = SimulationConfig::from_file(path)?;
        Ok((config, true))
    } else {
        Ok((SimulationConfig::default(), false))
    }
}
