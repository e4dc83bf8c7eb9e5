//! The grid manager: one object that owns the world and runs ticks.
//!
//! [`GridManager`] composes the grid, the event effect resolver, the
//! interaction system, the population pipeline, and the collaborator hub.
//! Each call to [`GridManager::update`] runs one tick:
//!
//! 1. **Clock** -- advance the tick counter and reset the effect cache.
//! 2. **Events** -- ask the event source, or use the explicit event list.
//! 3. **Density** -- resync dirty density tiles.
//! 4. **Regeneration** -- regrow and diffuse tile energy.
//! 5. **Population** -- every organism's turn.
//! 6. **Snapshot** -- aggregate the result for external consumers.
//!
//! The manager is generic over its random number generator. Two managers
//! built from identical options and identically seeded generators produce
//! identical snapshots tick for tick.

use petri_agents::{AgentTuning, Cell};
use petri_types::{DeathCause, DeathRecord, Event};
use petri_world::{
    DEFAULT_DENSITY_RADIUS, EventEffectResolver, EventEffectTable, GridState, ObstaclePreset,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::collaborators::{Collaborators, EventSource, ScheduledEvents, SelectionZones, StatsSink};
use crate::config::SimulationConfig;
use crate::error::ManagerError;
use crate::interaction::{InteractionAdapter, InteractionSystem, StandardAdapter};
use crate::params::UpdateParams;
use crate::population::{PopulationReport, PopulationSystem, TickContext};
use crate::snapshot::Snapshot;

/// Construction options of a [`GridManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerOptions {
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Energy cap of a tile and of an organism.
    pub max_tile_energy: f64,
    /// Obstacle layout painted at construction.
    pub initial_obstacle_preset: ObstaclePreset,
    /// Paint a random layout instead of `initial_obstacle_preset`.
    pub randomize_initial_obstacles: bool,
    /// Radius of the local-density neighbourhood.
    pub density_radius: usize,
    /// Behaviour constants.
    pub tuning: AgentTuning,
    /// Event effect table.
    pub effects: EventEffectTable,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            rows: 60,
            cols: 80,
            max_tile_energy: 6.0,
            initial_obstacle_preset: ObstaclePreset::None,
            randomize_initial_obstacles: false,
            density_radius: DEFAULT_DENSITY_RADIUS,
            tuning: AgentTuning::default(),
            effects: EventEffectTable::default(),
        }
    }
}

impl ManagerOptions {
    /// Options described by a loaded configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            rows: config.world.rows,
            cols: config.world.cols,
            max_tile_energy: config.world.max_tile_energy,
            initial_obstacle_preset: config.world.obstacle_preset,
            randomize_initial_obstacles: config.world.randomize_obstacles,
            density_radius: config.world.density_radius,
            tuning: config.behavior.clone(),
            effects: config.events.effects,
        }
    }
}

/// Owns the world and drives it one tick at a time.
pub struct GridManager<R: Rng> {
    grid: GridState,
    rng: R,
    tick: u64,
    resolver: EventEffectResolver,
    interactions: InteractionSystem,
    population: PopulationSystem,
    collaborators: Collaborators,
    active_events: Vec<Event>,
    last_report: PopulationReport,
}

impl<R: Rng> core::fmt::Debug for GridManager<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GridManager")
            .field("tick", &self.tick)
            .field("rows", &self.grid.rows())
            .field("cols", &self.grid.cols())
            .field("population", &self.grid.population())
            .field("collaborators", &self.collaborators)
            .finish_non_exhaustive()
    }
}

impl<R: Rng> GridManager<R> {
    /// Build a manager with an empty, unfilled grid.
    ///
    /// The initial obstacle layout is painted immediately. Call
    /// [`GridManager::reseed_energy`] and [`GridManager::seed_population`]
    /// to populate the world.
    pub fn new(
        options: ManagerOptions,
        mut rng: R,
        adapter: Box<dyn InteractionAdapter>,
    ) -> Result<Self, ManagerError> {
        let mut grid = GridState::new(
            options.rows,
            options.cols,
            options.max_tile_energy,
            options.density_radius,
        )?;
        let preset = if options.randomize_initial_obstacles {
            ObstaclePreset::random(&mut rng)
        } else {
            options.initial_obstacle_preset
        };
        grid.apply_obstacle_preset(preset, true, &mut rng);
        info!(
            rows = options.rows,
            cols = options.cols,
            max_tile_energy = options.max_tile_energy,
            ?preset,
            obstacles = grid.obstacle_count(),
            "Grid manager created"
        );
        Ok(Self {
            grid,
            rng,
            tick: 0,
            resolver: EventEffectResolver::new(options.effects),
            interactions: InteractionSystem::new(adapter),
            population: PopulationSystem::new(options.tuning),
            collaborators: Collaborators::new(),
            active_events: Vec::new(),
            last_report: PopulationReport::default(),
        })
    }

    // -----------------------------------------------------------------------
    // Collaborators
    // -----------------------------------------------------------------------

    /// Attach or detach the stats collaborator.
    pub fn set_stats(&mut self, stats: Option<Box<dyn StatsSink>>) {
        self.collaborators.set_stats(stats);
    }

    /// Attach or detach the selection-zone collaborator.
    pub fn set_zones(&mut self, zones: Option<Box<dyn SelectionZones>>) {
        self.collaborators.set_zones(zones);
    }

    /// Attach or detach the event source. While attached it takes
    /// precedence over [`GridManager::set_active_events`].
    pub fn set_event_source(&mut self, source: Option<Box<dyn EventSource>>) {
        self.collaborators.set_event_source(source);
    }

    /// Events used on ticks when no event source is attached.
    pub fn set_active_events(&mut self, events: Vec<Event>) {
        self.active_events = events;
    }

    /// Replace the interaction rules.
    pub fn set_adapter(&mut self, adapter: Box<dyn InteractionAdapter>) {
        self.interactions.set_adapter(adapter);
    }

    /// Replace the event effect table.
    pub const fn set_effects(&mut self, effects: EventEffectTable) {
        self.resolver.set_table(effects);
    }

    /// The collaborator hub, for failure counts.
    pub const fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    // -----------------------------------------------------------------------
    // World setup
    // -----------------------------------------------------------------------

    /// Place up to `count` random organisms on random free tiles, each
    /// starting at `energy_fraction` of the cap. Returns how many were placed.
    pub fn seed_population(&mut self, count: usize, energy_fraction: f64) -> usize {
        let max = self.grid.max_tile_energy();
        let energy = energy_fraction.clamp(0.0, 1.0) * max;
        let mut tiles = self.grid.free_tiles();
        tiles.shuffle(&mut self.rng);
        let mut placed = 0_usize;
        for tile in tiles.into_iter().take(count) {
            let cell = match Cell::random(energy, max, &mut self.rng) {
                Ok(cell) => cell,
                Err(err) => {
                    warn!(%err, "failed to create organism");
                    continue;
                }
            };
            if self.grid.set_cell(tile.row, tile.col, cell).is_some() {
                placed = placed.saturating_add(1);
            }
        }
        info!(requested = count, placed, "Population seeded");
        placed
    }

    /// Fill every open tile to `fraction` of the cap.
    pub fn reseed_energy(&mut self, fraction: f64) {
        self.grid.fill_energy(fraction);
        debug!(fraction, "Tile energy reseeded");
    }

    /// Remove every organism, refill tile energy, and rewind the clock.
    /// Obstacles and collaborators are kept.
    pub fn reset(&mut self, energy_fraction: f64) {
        self.grid.clear_cells();
        self.grid.fill_energy(energy_fraction);
        self.collaborators.take_life_events();
        self.tick = 0;
        self.last_report = PopulationReport::default();
        info!("Simulation reset");
    }

    /// Paint an obstacle preset, evicting occupants when `evict` is set.
    /// Evicted organisms are reported as deaths. Returns the eviction count.
    pub fn apply_obstacle_preset(&mut self, preset: ObstaclePreset, evict: bool) -> usize {
        let evicted = self.grid.apply_obstacle_preset(preset, evict, &mut self.rng);
        let count = evicted.len();
        for cell in evicted {
            self.report_eviction(&cell);
        }
        count
    }

    /// Remove every obstacle.
    pub fn clear_obstacles(&mut self) {
        self.grid.clear_obstacles();
    }

    /// Block or unblock one tile. Returns whether the change applied.
    pub fn set_obstacle(&mut self, row: usize, col: usize, blocked: bool, evict: bool) -> bool {
        let change = self.grid.set_obstacle(row, col, blocked, evict);
        if let Some(cell) = change.evicted {
            self.report_eviction(&cell);
        }
        change.applied
    }

    fn report_eviction(&mut self, cell: &Cell) {
        let Some(id) = cell.id() else {
            return;
        };
        self.collaborators.death(DeathRecord {
            cell: id,
            position: cell.position(),
            cause: DeathCause::Evicted,
            age: cell.age(),
        });
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Run one tick and return its snapshot.
    pub fn update(&mut self, params: &UpdateParams) -> Snapshot {
        self.tick = self.tick.saturating_add(1);
        let tick = self.tick;
        self.resolver.begin_tick(tick);

        let events = self
            .collaborators
            .active_events(tick)
            .unwrap_or_else(|| self.active_events.clone());
        debug!(tick, events = events.len(), "Events resolved");

        self.grid.sync_density();
        self.grid
            .regenerate_energy_grid(&events, &mut self.resolver, &params.regen_params());

        let ctx = TickContext {
            tick,
            params,
            events: &events,
        };
        let report = self.population.run(
            &mut self.grid,
            &mut self.interactions,
            &mut self.collaborators,
            &ctx,
            &mut self.rng,
        );
        self.last_report = report;

        let snapshot = Snapshot::capture(tick, &self.grid, self.collaborators.take_life_events());
        info!(
            tick,
            population = snapshot.population,
            births = report.births,
            deaths = report.deaths,
            fights = report.fights,
            total_energy = snapshot.total_energy,
            "Tick completed"
        );
        snapshot
    }

    /// Snapshot of the current state, without life events.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.tick, &self.grid, Vec::new())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The world.
    pub const fn grid(&self) -> &GridState {
        &self.grid
    }

    /// The world, mutably. For scenario setup and tests.
    pub const fn grid_mut(&mut self) -> &mut GridState {
        &mut self.grid
    }

    /// Ticks run so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Counts from the last population pass.
    pub const fn last_report(&self) -> PopulationReport {
        self.last_report
    }

    /// Behaviour constants.
    pub const fn tuning(&self) -> &AgentTuning {
        self.population.tuning()
    }
}

impl GridManager<ChaCha8Rng> {
    /// Build a manager with a seeded `ChaCha8` generator and the standard
    /// interaction rules.
    pub fn with_seed(options: ManagerOptions, seed: u64) -> Result<Self, ManagerError> {
        let adapter = StandardAdapter::from_tuning(&options.tuning);
        Self::new(options, ChaCha8Rng::seed_from_u64(seed), Box::new(adapter))
    }

    /// Build, fill, and populate a world from a loaded configuration.
    ///
    /// A non-empty event schedule is attached as the event source.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ManagerError> {
        let mut manager = Self::with_seed(ManagerOptions::from_config(config), config.world.seed)?;
        if !config.events.schedule.is_empty() {
            manager.set_event_source(Some(Box::new(ScheduledEvents::new(
                config.events.schedule.clone(),
            ))));
        }
        manager.reseed_energy(config.world.initial_tile_energy_fraction);
        manager.seed_population(
            config.world.initial_population,
            config.world.initial_energy_fraction,
        );
        Ok(manager)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use petri_types::{EventKind, Rect};

    use super::*;

    fn small() -> ManagerOptions {
        ManagerOptions {
            rows: 12,
            cols: 12,
            ..ManagerOptions::default()
        }
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        let options = ManagerOptions {
            rows: 0,
            ..ManagerOptions::default()
        };
        assert!(GridManager::with_seed(options, 1).is_err());
    }

    #[test]
    fn seeding_respects_free_tiles() {
        let mut manager = GridManager::with_seed(small(), 3).unwrap();
        assert_eq!(manager.seed_population(500, 0.5), 144);
        assert_eq!(manager.grid().population(), 144);
        assert!(manager.grid().verify_occupancy());
    }

    #[test]
    fn update_advances_the_clock() {
        let mut manager = GridManager::with_seed(small(), 4).unwrap();
        manager.reseed_energy(0.5);
        manager.seed_population(20, 0.5);
        let snapshot = manager.update(&UpdateParams::default());
        assert_eq!(snapshot.tick, 1);
        assert_eq!(manager.tick(), 1);
        assert_eq!(snapshot.population, manager.grid().population());
    }

    #[test]
    fn evictions_are_reported_as_deaths() {
        let mut manager = GridManager::with_seed(small(), 5).unwrap();
        manager.seed_population(144, 0.5);
        let evicted = manager.apply_obstacle_preset(ObstaclePreset::Perimeter, true);
        assert_eq!(evicted, 44);
        assert_eq!(manager.grid().population(), 100);
        assert!(manager.grid().verify_occupancy());
    }

    #[test]
    fn explicit_events_apply_without_a_source() {
        let options = ManagerOptions {
            rows: 1,
            cols: 1,
            ..ManagerOptions::default()
        };
        let mut manager = GridManager::with_seed(options, 6).unwrap();
        manager.grid_mut().set_tile_energy(0, 0, 1.0);
        manager.set_active_events(vec![Event::new(
            EventKind::Flood,
            1.0,
            Rect::new(0, 0, 1, 1),
        )]);
        let params = UpdateParams {
            energy_regen_rate: 1.0,
            energy_diffusion_rate: 0.0,
            ..UpdateParams::default()
        };
        let snapshot = manager.update(&params);
        assert!((snapshot.total_tile_energy - 6.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_organisms_and_clock() {
        let mut manager = GridManager::with_seed(small(), 7).unwrap();
        manager.seed_population(30, 0.5);
        manager.update(&UpdateParams::default());
        let before = manager.grid().cell_ids();
        assert!(!before.is_empty());
        manager.reset(0.25);
        assert_eq!(manager.tick(), 0);
        assert_eq!(manager.grid().population(), 0);
        assert!((manager.grid().tile_energy(3, 3) - 1.5).abs() < 1e-12);

        // Ids from the previous run must not resolve to the new population.
        manager.seed_population(30, 0.5);
        assert!(before.iter().all(|id| !manager.grid().contains(*id)));
    }
}
