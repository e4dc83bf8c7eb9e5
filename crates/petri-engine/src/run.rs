//! Headless tick loop.
//!
//! Drives a [`GridManager`] for the configured number of ticks, keeps
//! running totals of what happened, and emits periodic summaries through
//! `tracing`.

use std::path::Path;

use petri_core::config::RunConfig;
use petri_core::{GridManager, PopulationReport, Snapshot, UpdateParams};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Counts accumulated over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    /// Ticks executed.
    pub ticks: u64,
    /// Offspring placed.
    pub births: usize,
    /// Deaths from any cause.
    pub deaths: usize,
    /// Fights resolved.
    pub fights: usize,
    /// Cooperative transfers resolved.
    pub cooperations: usize,
    /// Reproduction attempts refused by zone rules.
    pub blocked: usize,
    /// Largest population seen after any tick.
    pub peak_population: usize,
}

impl RunTotals {
    /// Fold one tick's report into the totals.
    pub const fn absorb(&mut self, report: &PopulationReport, population: usize) {
        self.ticks = self.ticks.saturating_add(1);
        self.births = self.births.saturating_add(report.births);
        self.deaths = self.deaths.saturating_add(report.deaths);
        self.fights = self.fights.saturating_add(report.fights);
        self.cooperations = self.cooperations.saturating_add(report.cooperations);
        self.blocked = self.blocked.saturating_add(report.blocked);
        if population > self.peak_population {
            self.peak_population = population;
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every configured tick ran.
    Completed,
    /// The population reached zero and the run stopped early.
    Extinct,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Run ticks until the configured count is reached or the population dies
/// out. Returns the last snapshot (or the starting one when `ticks` is 0).
pub fn run<R: Rng>(
    manager: &mut GridManager<R>,
    params: &UpdateParams,
    settings: &RunConfig,
    summary_interval: u64,
) -> (Snapshot, RunTotals, RunOutcome) {
    let mut totals = RunTotals::default();
    let mut last = manager.snapshot();

    if settings.stop_on_extinction && last.population == 0 {
        warn!("Starting population is empty");
        return (last, totals, RunOutcome::Extinct);
    }

    for _ in 0..settings.ticks {
        let snapshot = manager.update(params);
        let report = manager.last_report();
        totals.absorb(&report, snapshot.population);

        debug!(
            tick = snapshot.tick,
            processed = report.processed,
            idle = report.idle,
            moves = report.moves,
            "Population pass"
        );

        if snapshot.tick.checked_rem(summary_interval) == Some(0) {
            log_summary(&snapshot, &totals);
        }

        let extinct = snapshot.population == 0;
        last = snapshot;
        if extinct && settings.stop_on_extinction {
            warn!(tick = last.tick, "Population extinct, stopping");
            return (last, totals, RunOutcome::Extinct);
        }
    }

    (last, totals, RunOutcome::Completed)
}

fn log_summary(snapshot: &Snapshot, totals: &RunTotals) {
    info!(
        tick = snapshot.tick,
        population = snapshot.population,
        mean_energy = snapshot.mean_energy(),
        tile_energy = snapshot.total_tile_energy,
        max_fitness = snapshot.max_fitness,
        births = totals.births,
        deaths = totals.deaths,
        fights = totals.fights,
        cooperations = totals.cooperations,
        "Population summary"
    );
}

/// Serialize a snapshot as pretty JSON and write it to `path`.
pub fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).map_err(|source| EngineError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), tick = snapshot.tick, "Snapshot written");
    Ok(())
}
