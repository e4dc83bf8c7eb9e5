//! Tick-level properties of the grid manager.
//!
//! Each test drives whole ticks through the public API and checks a
//! property that must hold regardless of the random draws: occupancy
//! consistency, reproducibility, energy accounting, combat bookkeeping,
//! diversity gating, and collaborator isolation.

// Integration tests use unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

use std::collections::HashSet;

use petri_agents::{Cell, Genome};
use petri_core::{
    CollaboratorError, Collaborators, GridManager, InteractionSystem, ManagerOptions, Resolution,
    ScheduledEvent, ScheduledEvents, SelectionZones, StandardAdapter, StatsSink, TallySink,
    UpdateParams, ZoneVerdict, diversity_adjusted_probability,
};
use petri_types::{
    BirthRecord, CellId, DeathCause, DeathRecord, EventKind, LifeEvent, Position, Rect,
};
use petri_world::GridState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// =============================================================================
// Helpers
// =============================================================================

fn options(rows: usize, cols: usize) -> ManagerOptions {
    ManagerOptions {
        rows,
        cols,
        ..ManagerOptions::default()
    }
}

fn populated(seed: u64) -> GridManager<ChaCha8Rng> {
    let mut manager = GridManager::with_seed(options(20, 20), seed).unwrap();
    manager.reseed_energy(0.6);
    manager.seed_population(150, 0.6);
    manager
}

fn deaths(snapshot: &petri_core::Snapshot) -> Vec<&DeathRecord> {
    snapshot
        .life_events
        .iter()
        .filter_map(|e| match e {
            LifeEvent::Death(d) => Some(d),
            _ => None,
        })
        .collect()
}

struct Failing;

impl StatsSink for Failing {
    fn on_birth(&mut self, _record: &BirthRecord) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::failed("birth ledger offline"))
    }

    fn on_death(&mut self, _record: &DeathRecord) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::failed("death ledger offline"))
    }
}

struct Closed;

impl SelectionZones for Closed {
    fn has_active_zones(&self) -> Result<bool, CollaboratorError> {
        Ok(true)
    }

    fn is_in_active_zone(&self, _position: Position) -> Result<bool, CollaboratorError> {
        Ok(false)
    }

    fn validate_reproduction_area(
        &self,
        _parent: Position,
        _mate: Position,
        _spawn: Position,
    ) -> Result<ZoneVerdict, CollaboratorError> {
        Ok(ZoneVerdict::Blocked {
            reason: "breeding season closed".into(),
        })
    }
}

// =============================================================================
// Occupancy and determinism
// =============================================================================

#[test]
fn occupancy_matches_population_every_tick() {
    let mut manager = populated(11);
    let params = UpdateParams::default();
    for _ in 0..40 {
        let snapshot = manager.update(&params);
        assert!(manager.grid().verify_occupancy());

        let tiles: HashSet<(usize, usize)> =
            snapshot.entries.iter().map(|e| (e.row, e.col)).collect();
        assert_eq!(tiles.len(), snapshot.entries.len(), "two organisms on one tile");
        assert_eq!(snapshot.population, tiles.len());
        assert_eq!(snapshot.population, manager.grid().population());
        for entry in &snapshot.entries {
            assert!(!manager.grid().is_obstacle(entry.row, entry.col));
            assert!(entry.cell.energy >= 0.0 && entry.cell.energy <= 6.0);
        }
    }
}

#[test]
fn identical_seeds_produce_identical_snapshots() {
    let mut a = populated(23);
    let mut b = populated(23);
    let params = UpdateParams::default();
    for _ in 0..25 {
        assert_eq!(a.update(&params), b.update(&params));
    }
}

#[test]
fn different_seeds_diverge() {
    let mut a = populated(1);
    let mut b = populated(2);
    let params = UpdateParams::default();
    assert_ne!(a.update(&params), b.update(&params));
}

// =============================================================================
// Energy accounting
// =============================================================================

#[test]
fn relocation_never_creates_energy() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut grid = GridState::new(8, 8, 6.0, 2).unwrap();
    grid.fill_energy(0.7);
    let mut ids = Vec::new();
    for _ in 0..12 {
        let tiles = grid.free_tiles();
        let tile = tiles[rng.random_range(0..tiles.len())];
        let cell = Cell::new(Genome::random(&mut rng), 3.0, 6.0).unwrap();
        ids.push(grid.set_cell(tile.row, tile.col, cell).unwrap());
    }

    for _ in 0..500 {
        let id = ids[rng.random_range(0..ids.len())];
        let to = Position::new(rng.random_range(0..8), rng.random_range(0..8));
        let before = grid.total_cell_energy() + grid.total_tile_energy();
        let moved = grid.relocate_cell(id, to);
        let after = grid.total_cell_energy() + grid.total_tile_energy();
        assert!(after <= before + 1e-9, "relocation created energy");
        if !moved {
            assert!((after - before).abs() < 1e-12, "failed move changed energy");
        }
    }
    assert!(grid.verify_occupancy());
}

// =============================================================================
// Combat
// =============================================================================

#[test]
fn fights_remove_exactly_one_participant() {
    for seed in 0..30 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut grid = GridState::new(3, 3, 6.0, 1).unwrap();
        let a = grid
            .set_cell(1, 1, Cell::new(Genome::random(&mut rng), 4.0, 6.0).unwrap())
            .unwrap();
        let b = grid
            .set_cell(1, 2, Cell::new(Genome::random(&mut rng), 4.0, 6.0).unwrap())
            .unwrap();
        let intent = grid
            .cell(a)
            .unwrap()
            .create_fight_intent(grid.cell(b).unwrap(), 1, 6.0)
            .unwrap();

        let system = InteractionSystem::new(Box::new(StandardAdapter::default()));
        let mut hub = Collaborators::new();
        let Some(Resolution::Fight { record, defeated }) =
            system.resolve(&intent, &mut grid, &mut hub, &mut rng)
        else {
            panic!("adjacent fight did not resolve");
        };

        assert_eq!(grid.population(), 1);
        assert!(grid.contains(record.winner));
        assert!(!grid.contains(record.loser));
        assert_eq!(grid.cell(record.winner).unwrap().counters().fights_won, 1);
        assert_eq!(grid.cell(record.winner).unwrap().counters().fights_lost, 0);
        assert_eq!(defeated.counters().fights_lost, 1);
        assert_eq!(defeated.counters().fights_won, 0);

        let loser_tile = if record.loser == a {
            Position::new(1, 1)
        } else {
            Position::new(1, 2)
        };
        assert_eq!(grid.cell_id_at(loser_tile.row, loser_tile.col), Some(record.winner));

        let events = hub.take_life_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events.get(1),
            Some(LifeEvent::Death(DeathRecord { cause: DeathCause::Combat, .. }))
        ));
    }
}

// =============================================================================
// Reproduction
// =============================================================================

#[test]
fn diversity_penalty_is_monotonic_and_zero_at_zero() {
    let mut last = f64::INFINITY;
    for multiplier in [1.0, 0.75, 0.5, 0.25, 0.0] {
        let params = UpdateParams {
            mating_diversity_threshold: 0.2,
            low_diversity_repro_multiplier: multiplier,
            ..UpdateParams::default()
        };
        let (p, penalized) = diversity_adjusted_probability(0.6, 0.9, &params);
        assert!(penalized);
        assert!(p < last, "probability did not decrease at {multiplier}");
        last = p;
    }
    assert!(last.abs() < f64::EPSILON);
}

#[test]
fn closed_zones_block_every_birth() {
    let mut manager = populated(31);
    manager.reseed_energy(1.0);
    manager.set_zones(Some(Box::new(Closed)));
    let tally = TallySink::new();
    manager.set_stats(Some(Box::new(tally.clone())));

    let params = UpdateParams {
        low_diversity_repro_multiplier: 1.0,
        ..UpdateParams::default()
    };
    let mut blocked = 0_usize;
    for _ in 0..30 {
        let snapshot = manager.update(&params);
        assert!(
            !snapshot
                .life_events
                .iter()
                .any(|e| matches!(e, LifeEvent::Birth(_)))
        );
        blocked += snapshot
            .life_events
            .iter()
            .filter(|e| matches!(e, LifeEvent::ReproductionBlocked(_)))
            .count();
    }
    assert_eq!(tally.tally().births, 0);
    assert_eq!(usize::try_from(tally.tally().blocked).unwrap(), blocked);
}

// =============================================================================
// Death
// =============================================================================

#[test]
fn starving_cell_dies_once_in_the_same_tick() {
    let mut manager = GridManager::with_seed(options(1, 1), 3).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let cell = Cell::new(Genome::random(&mut rng), 0.0, 6.0).unwrap();
    let id: CellId = manager.grid_mut().set_cell(0, 0, cell).unwrap();
    let tally = TallySink::new();
    manager.set_stats(Some(Box::new(tally.clone())));

    let params = UpdateParams {
        energy_regen_rate: 0.0,
        energy_diffusion_rate: 0.0,
        ..UpdateParams::default()
    };
    let snapshot = manager.update(&params);

    assert_eq!(snapshot.population, 0);
    assert!(!manager.grid().contains(id));
    assert_eq!(manager.grid().cell_id_at(0, 0), None);
    assert_eq!(tally.tally().deaths, 1);
    let deaths = deaths(&snapshot);
    assert_eq!(deaths.len(), 1);
    assert_eq!(deaths[0].cause, DeathCause::Starvation);
    assert_eq!(deaths[0].cell, id);

    let next = manager.update(&params);
    assert!(next.life_events.is_empty());
    assert_eq!(tally.tally().deaths, 1);
}

#[test]
fn failing_stats_never_abort_a_tick() {
    let mut manager = populated(41);
    manager.set_stats(Some(Box::new(Failing)));
    let params = UpdateParams::default();
    let mut reported_deaths = 0_u64;
    for _ in 0..30 {
        let snapshot = manager.update(&params);
        assert!(manager.grid().verify_occupancy());
        reported_deaths += deaths(&snapshot).len() as u64;
    }
    assert_eq!(
        manager.collaborators().failures().count("stats", "on_death"),
        reported_deaths
    );
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn scheduled_drought_drains_tiles() {
    let params = UpdateParams {
        energy_diffusion_rate: 0.0,
        ..UpdateParams::default()
    };

    let mut calm = GridManager::with_seed(options(4, 4), 9).unwrap();
    calm.reseed_energy(0.5);
    let calm_total = calm.update(&params).total_tile_energy;

    let mut dry = GridManager::with_seed(options(4, 4), 9).unwrap();
    dry.reseed_energy(0.5);
    dry.set_event_source(Some(Box::new(ScheduledEvents::new(vec![ScheduledEvent {
        kind: EventKind::Drought,
        strength: 1.0,
        area: Rect::new(0, 0, 4, 4),
        start_tick: 1,
        duration: 0,
    }]))));
    let dry_total = dry.update(&params).total_tile_energy;

    assert!(dry_total < calm_total);
    assert!(dry_total < 16.0 * 3.0);
}
