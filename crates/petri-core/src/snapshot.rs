//! Read-only per-tick aggregates for external consumers.
//!
//! A [`Snapshot`] is built after the population pass and owns copies of
//! everything it reports, so renderers and statistics collectors can keep
//! it around without borrowing the grid.

use petri_agents::{Cell, InteractionCounters};
use petri_types::{CellId, LifeEvent};
use petri_world::GridState;
use serde::Serialize;

/// Per-organism data carried by a snapshot entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSummary {
    /// Organism id.
    pub id: CellId,
    /// Current energy.
    pub energy: f64,
    /// Age in ticks.
    pub age: u32,
    /// Genome-derived lifespan.
    pub lifespan: u32,
    /// Display hue in `[0, 1]`.
    pub hue: f64,
    /// Display saturation in `[0, 1]`.
    pub saturation: f64,
    /// Retained brain connections.
    pub brain_connections: usize,
    /// Fights won.
    pub fights_won: u32,
    /// Cooperations given.
    pub cooperations_given: u32,
    /// Offspring produced.
    pub offspring: u32,
}

impl CellSummary {
    fn of(id: CellId, cell: &Cell) -> Self {
        let InteractionCounters {
            fights_won,
            cooperations_given,
            offspring,
            ..
        } = cell.counters();
        Self {
            id,
            energy: cell.energy(),
            age: cell.age(),
            lifespan: cell.lifespan(),
            hue: cell.genome().hue(),
            saturation: cell.genome().saturation(),
            brain_connections: cell.brain().metrics().retained_connections,
            fights_won,
            cooperations_given,
            offspring,
        }
    }
}

/// One occupied tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    /// Tile row.
    pub row: usize,
    /// Tile column.
    pub col: usize,
    /// The occupant.
    pub cell: CellSummary,
    /// Instantaneous fitness.
    pub fitness: f64,
    /// Smoothed fitness.
    pub smoothed_fitness: f64,
}

/// Aggregate state after a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Tick this snapshot was taken after.
    pub tick: u64,
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Living organisms.
    pub population: usize,
    /// Energy held by organisms.
    pub total_energy: f64,
    /// Energy banked in tiles.
    pub total_tile_energy: f64,
    /// Sum of organism ages.
    pub total_age: u64,
    /// Highest instantaneous fitness, `0` when empty.
    pub max_fitness: f64,
    /// Organism ids in row-major order.
    pub cells: Vec<CellId>,
    /// Per-tile entries in row-major order.
    pub entries: Vec<SnapshotEntry>,
    /// Life events recorded during the tick.
    pub life_events: Vec<LifeEvent>,
}

impl Snapshot {
    /// Capture the grid as it stands.
    pub fn capture(tick: u64, grid: &GridState, life_events: Vec<LifeEvent>) -> Self {
        let max = grid.max_tile_energy();
        let entries: Vec<SnapshotEntry> = grid
            .cells()
            .map(|(id, cell)| {
                let position = cell.position();
                SnapshotEntry {
                    row: position.row,
                    col: position.col,
                    cell: CellSummary::of(id, cell),
                    fitness: cell.fitness(max),
                    smoothed_fitness: cell.smoothed_fitness(),
                }
            })
            .collect();

        Self {
            tick,
            rows: grid.rows(),
            cols: grid.cols(),
            population: entries.len(),
            total_energy: entries.iter().map(|e| e.cell.energy).sum(),
            total_tile_energy: grid.total_tile_energy(),
            total_age: entries
                .iter()
                .fold(0_u64, |acc, e| acc.saturating_add(u64::from(e.cell.age))),
            max_fitness: entries.iter().map(|e| e.fitness).fold(0.0, f64::max),
            cells: entries.iter().map(|e| e.cell.id).collect(),
            entries,
            life_events,
        }
    }

    /// Mean organism energy, `0` when empty.
    pub fn mean_energy(&self) -> f64 {
        if self.population == 0 {
            0.0
        } else {
            self.total_energy / self.population as f64
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use petri_agents::Genome;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn place(grid: &mut GridState, rng: &mut ChaCha8Rng, row: usize, col: usize, energy: f64) {
        let cell = Cell::new(Genome::random(rng), energy, grid.max_tile_energy()).unwrap();
        grid.set_cell(row, col, cell).unwrap();
    }

    #[test]
    fn totals_match_entries() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut grid = GridState::new(4, 4, 6.0, 1).unwrap();
        for (row, col, energy) in [(0, 0, 2.0), (1, 3, 3.0), (3, 2, 1.5)] {
            place(&mut grid, &mut rng, row, col, energy);
        }
        let snapshot = Snapshot::capture(7, &grid, Vec::new());
        assert_eq!(snapshot.population, 3);
        assert_eq!(snapshot.cells.len(), 3);
        assert!((snapshot.total_energy - 6.5).abs() < 1e-12);
        assert!((snapshot.mean_energy() - 6.5 / 3.0).abs() < 1e-12);
        assert_eq!(snapshot.entries.first().map(|e| (e.row, e.col)), Some((0, 0)));
        assert!(snapshot.max_fitness >= 0.0 && snapshot.max_fitness <= 1.0);
    }

    #[test]
    fn empty_grid_snapshot() {
        let grid = GridState::new(2, 2, 6.0, 1).unwrap();
        let snapshot = Snapshot::capture(0, &grid, Vec::new());
        assert_eq!(snapshot.population, 0);
        assert!(snapshot.max_fitness.abs() < f64::EPSILON);
        assert!(snapshot.mean_energy().abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_entries_and_events() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut grid = GridState::new(3, 3, 6.0, 1).unwrap();
        place(&mut grid, &mut rng, 1, 1, 2.0);
        let snapshot = Snapshot::capture(3, &grid, Vec::new());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["tick"].as_u64(), Some(3));
        let entry = &value["entries"][0];
        assert_eq!(entry["row"].as_u64(), Some(1));
        assert!(entry["cell"]["energy"].is_number());
        assert_eq!(value["life_events"].as_array().map(Vec::len), Some(0));
    }
}
