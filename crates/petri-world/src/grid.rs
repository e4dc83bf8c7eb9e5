//! The spatial and energy substrate.
//!
//! [`GridState`] owns every layer of the world:
//!
//! - occupancy: one optional [`CellId`] per tile, the sole source of truth
//!   for where organisms are
//! - energy: banked tile energy in `[0, max_tile_energy]`, double buffered
//!   for diffusion
//! - obstacles: blocked tiles, which never hold organisms or energy
//! - density: the lazily resynced local-density field
//! - the organism arena
//!
//! Every operation that changes occupancy updates the organism's position
//! mirror and the density field in the same call. Operations that would
//! break an invariant return `false` or `None` and leave the grid untouched.

use petri_agents::Cell;
use petri_types::{CellId, Event, Position};
use rand::Rng;
use tracing::debug;

use crate::arena::CellArena;
use crate::density::DensityField;
use crate::error::WorldError;
use crate::events::EventEffectResolver;
use crate::obstacles::ObstaclePreset;

/// Default radius of the density neighbourhood.
pub const DEFAULT_DENSITY_RADIUS: usize = 2;

/// How strongly local density suppresses tile regeneration.
const DENSITY_REGEN_DAMPING: f64 = 0.5;

/// The eight king-move offsets, row-major.
pub const NEIGHBOUR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const ORTHOGONAL_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Parameters of one regeneration pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegenParams {
    /// Share of the missing energy restored per tick.
    pub regen_rate: f64,
    /// Pull toward the orthogonal neighbour average per tick.
    pub diffusion_rate: f64,
    /// Global multiplier on event strength.
    pub event_strength_multiplier: f64,
    /// Global multiplier on density effects.
    pub density_effect_multiplier: f64,
}

/// Outcome of [`GridState::set_obstacle`].
#[derive(Debug, Clone, Default)]
pub struct ObstacleChange {
    /// Whether the tile's obstacle flag now matches the request.
    pub applied: bool,
    /// The organism evicted to make room, if any.
    pub evicted: Option<Cell>,
}

/// Occupancy, energy, obstacles, density, and the organisms themselves.
#[derive(Debug, Clone)]
pub struct GridState {
    rows: usize,
    cols: usize,
    max_tile_energy: f64,
    occupancy: Vec<Option<CellId>>,
    energy: Vec<f64>,
    energy_next: Vec<f64>,
    obstacles: Vec<bool>,
    density: DensityField,
    cells: CellArena,
}

impl GridState {
    /// Create an empty grid with zero tile energy.
    pub fn new(
        rows: usize,
        cols: usize,
        max_tile_energy: f64,
        density_radius: usize,
    ) -> Result<Self, WorldError> {
        let len = rows
            .checked_mul(cols)
            .filter(|&n| n > 0)
            .ok_or(WorldError::InvalidDimensions { rows, cols })?;
        if !max_tile_energy.is_finite() || max_tile_energy <= 0.0 {
            return Err(WorldError::InvalidEnergyCap {
                value: max_tile_energy,
            });
        }
        Ok(Self {
            rows,
            cols,
            max_tile_energy,
            occupancy: vec![None; len],
            energy: vec![0.0; len],
            energy_next: vec![0.0; len],
            obstacles: vec![false; len],
            density: DensityField::new(rows, cols, density_radius),
            cells: CellArena::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// Number of rows.
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Tile energy cap.
    pub const fn max_tile_energy(&self) -> f64 {
        self.max_tile_energy
    }

    /// Flat index of a tile, if in bounds.
    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols)
            .then(|| row.saturating_mul(self.cols).saturating_add(col))
    }

    /// Checked index, as an error.
    pub fn require_index(&self, row: usize, col: usize) -> Result<usize, WorldError> {
        self.index(row, col).ok_or(WorldError::OutOfBounds {
            row,
            col,
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// In-bounds king-move neighbours of a tile.
    pub fn neighbours(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        NEIGHBOUR_OFFSETS
            .iter()
            .filter_map(move |&(dr, dc)| pos.offset(dr, dc, self.rows, self.cols))
    }

    /// In-bounds tiles at exactly Chebyshev distance `radius`, row-major.
    pub fn ring(&self, center: Position, radius: usize) -> Vec<Position> {
        if radius == 0 {
            return vec![center];
        }
        let Ok(r) = isize::try_from(radius) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for dr in -r..=r {
            for dc in -r..=r {
                if dr.abs() != r && dc.abs() != r {
                    continue;
                }
                if let Some(p) = center.offset(dr, dc, self.rows, self.cols) {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Occupants within Chebyshev `radius` of `center`, excluding the centre.
    pub fn occupants_within(&self, center: Position, radius: usize) -> Vec<(Position, CellId)> {
        (1..=radius)
            .flat_map(|r| self.ring(center, r))
            .filter_map(|p| self.cell_id_at(p.row, p.col).map(|id| (p, id)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Occupancy
    // -----------------------------------------------------------------------

    /// Id of the organism on a tile.
    pub fn cell_id_at(&self, row: usize, col: usize) -> Option<CellId> {
        self.index(row, col)
            .and_then(|i| self.occupancy.get(i))
            .copied()
            .flatten()
    }

    /// The organism on a tile.
    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cell_id_at(row, col).and_then(|id| self.cells.get(id))
    }

    /// Look up an organism by id.
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// Look up an organism mutably. Position changes must go through the grid.
    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    /// Borrow two distinct organisms mutably.
    pub fn cell_pair_mut(&mut self, a: CellId, b: CellId) -> Option<(&mut Cell, &mut Cell)> {
        self.cells.get_pair_mut(a, b)
    }

    /// Whether an id still refers to a living organism.
    pub fn contains(&self, id: CellId) -> bool {
        self.cells.contains(id)
    }

    /// Number of living organisms.
    pub const fn population(&self) -> usize {
        self.cells.len()
    }

    /// Ids of every organism, in row-major tile order.
    pub fn cell_ids(&self) -> Vec<CellId> {
        self.occupancy.iter().filter_map(|slot| *slot).collect()
    }

    /// Every organism with its id, in row-major tile order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> + '_ {
        self.occupancy
            .iter()
            .filter_map(|slot| slot.and_then(|id| self.cells.get(id).map(|c| (id, c))))
    }

    /// Whether a tile is in bounds, unblocked, and empty.
    pub fn is_free(&self, row: usize, col: usize) -> bool {
        self.index(row, col).is_some_and(|i| {
            !self.obstacles.get(i).copied().unwrap_or(true)
                && self.occupancy.get(i).copied().flatten().is_none()
        })
    }

    /// Place an organism on a free tile.
    ///
    /// The newcomer absorbs the tile's banked energy up to its cap and the
    /// tile is cleared. Returns `None` (dropping the organism) if the tile is
    /// out of bounds, blocked, or occupied.
    pub fn set_cell(&mut self, row: usize, col: usize, cell: Cell) -> Option<CellId> {
        if !self.is_free(row, col) {
            return None;
        }
        let index = self.index(row, col)?;
        let position = Position::new(row, col);
        let id = self.cells.insert(cell, position)?;
        if let Some(slot) = self.occupancy.get_mut(index) {
            *slot = Some(id);
        }
        self.absorb_tile(id, index);
        self.density.mark_dirty(row, col);
        Some(id)
    }

    /// Remove an organism by id, clearing its tile.
    pub fn remove_cell(&mut self, id: CellId) -> Option<Cell> {
        let position = self.cells.get(id)?.position();
        let index = self.index(position.row, position.col)?;
        if self.occupancy.get(index).copied().flatten() != Some(id) {
            return None;
        }
        let cell = self.cells.remove(id)?;
        if let Some(slot) = self.occupancy.get_mut(index) {
            *slot = None;
        }
        self.density.mark_dirty(position.row, position.col);
        Some(cell)
    }

    /// Remove whatever organism occupies a tile.
    pub fn remove_cell_at(&mut self, row: usize, col: usize) -> Option<Cell> {
        let id = self.cell_id_at(row, col)?;
        self.remove_cell(id)
    }

    /// Move an organism onto a free tile.
    ///
    /// On success the mover absorbs the destination's banked energy up to
    /// its cap and the tile is cleared; any excess is lost, so relocation
    /// never creates energy. Returns `false` with no changes otherwise.
    pub fn relocate_cell(&mut self, id: CellId, to: Position) -> bool {
        let Some(from) = self.cells.get(id).map(Cell::position) else {
            return false;
        };
        if from == to || !self.is_free(to.row, to.col) {
            return false;
        }
        let (Some(from_index), Some(to_index)) =
            (self.index(from.row, from.col), self.index(to.row, to.col))
        else {
            return false;
        };
        if self.occupancy.get(from_index).copied().flatten() != Some(id) {
            return false;
        }

        if let Some(slot) = self.occupancy.get_mut(from_index) {
            *slot = None;
        }
        if let Some(slot) = self.occupancy.get_mut(to_index) {
            *slot = Some(id);
        }
        self.cells.rebind(id, to);
        self.absorb_tile(id, to_index);
        self.density.mark_dirty(from.row, from.col);
        self.density.mark_dirty(to.row, to.col);
        true
    }

    fn absorb_tile(&mut self, id: CellId, index: usize) {
        let banked = self.energy.get(index).copied().unwrap_or(0.0);
        if let Some(cell) = self.cells.get_mut(id) {
            cell.gain_energy(banked, self.max_tile_energy);
        }
        if let Some(tile) = self.energy.get_mut(index) {
            *tile = 0.0;
        }
    }

    /// Check that occupancy and organism positions agree.
    ///
    /// True when every occupied tile's id resolves to an organism whose
    /// position is that tile and the occupied tile count equals the
    /// population.
    pub fn verify_occupancy(&self) -> bool {
        let mut occupied = 0_usize;
        for row in 0..self.rows {
            for col in 0..self.cols {
                let Some(id) = self.cell_id_at(row, col) else {
                    continue;
                };
                occupied = occupied.saturating_add(1);
                let Some(cell) = self.cells.get(id) else {
                    return false;
                };
                if cell.position() != Position::new(row, col) || cell.id() != Some(id) {
                    return false;
                }
                if self.is_obstacle(row, col) {
                    return false;
                }
            }
        }
        occupied == self.cells.len()
    }

    // -----------------------------------------------------------------------
    // Obstacles
    // -----------------------------------------------------------------------

    /// Whether a tile is blocked. Out-of-bounds tiles count as blocked.
    pub fn is_obstacle(&self, row: usize, col: usize) -> bool {
        self.index(row, col)
            .and_then(|i| self.obstacles.get(i))
            .copied()
            .unwrap_or(true)
    }

    /// Block or unblock a tile.
    ///
    /// Blocking zeroes the tile's energy. An occupant is evicted when `evict`
    /// is set; otherwise blocking an occupied tile is refused.
    pub fn set_obstacle(&mut self, row: usize, col: usize, blocked: bool, evict: bool) -> ObstacleChange {
        let Some(index) = self.index(row, col) else {
            return ObstacleChange::default();
        };
        if !blocked {
            if let Some(flag) = self.obstacles.get_mut(index) {
                *flag = false;
            }
            self.density.mark_dirty(row, col);
            return ObstacleChange {
                applied: true,
                evicted: None,
            };
        }
        let occupant = self.cell_id_at(row, col);
        if occupant.is_some() && !evict {
            return ObstacleChange::default();
        }
        let evicted = occupant.and_then(|id| self.remove_cell(id));
        if let Some(flag) = self.obstacles.get_mut(index) {
            *flag = true;
        }
        if let Some(tile) = self.energy.get_mut(index) {
            *tile = 0.0;
        }
        self.density.mark_dirty(row, col);
        ObstacleChange {
            applied: true,
            evicted,
        }
    }

    /// Paint a preset. Returns organisms evicted in the process.
    pub fn apply_obstacle_preset<R: Rng + ?Sized>(
        &mut self,
        preset: ObstaclePreset,
        evict: bool,
        rng: &mut R,
    ) -> Vec<Cell> {
        let tiles = preset.tiles(self.rows, self.cols, rng);
        let mut evicted = Vec::new();
        let mut painted = 0_usize;
        for tile in tiles {
            let change = self.set_obstacle(tile.row, tile.col, true, evict);
            if change.applied {
                painted = painted.saturating_add(1);
            }
            evicted.extend(change.evicted);
        }
        debug!(?preset, painted, evicted = evicted.len(), "obstacle preset applied");
        evicted
    }

    /// Remove every obstacle.
    pub fn clear_obstacles(&mut self) {
        self.obstacles.fill(false);
        self.density.mark_all_dirty();
    }

    /// Number of blocked tiles.
    pub fn obstacle_count(&self) -> usize {
        self.obstacles.iter().filter(|b| **b).count()
    }

    // -----------------------------------------------------------------------
    // Energy
    // -----------------------------------------------------------------------

    /// Banked energy on a tile. Out-of-bounds tiles read 0.
    pub fn tile_energy(&self, row: usize, col: usize) -> f64 {
        self.index(row, col)
            .and_then(|i| self.energy.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Set a tile's energy, clamped to `[0, cap]`. Obstacle tiles stay at 0.
    pub fn set_tile_energy(&mut self, row: usize, col: usize, value: f64) {
        let Some(index) = self.index(row, col) else {
            return;
        };
        if self.obstacles.get(index).copied().unwrap_or(true) {
            return;
        }
        if let Some(tile) = self.energy.get_mut(index) {
            *tile = if value.is_finite() {
                value.clamp(0.0, self.max_tile_energy)
            } else {
                0.0
            };
        }
    }

    /// Remove up to `amount` from a tile. Returns what was removed.
    pub fn take_tile_energy(&mut self, row: usize, col: usize, amount: f64) -> f64 {
        let Some(tile) = self.index(row, col).and_then(|i| self.energy.get_mut(i)) else {
            return 0.0;
        };
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let taken = amount.min(*tile);
        *tile -= taken;
        taken
    }

    /// Fill every open tile to `fraction` of the cap.
    pub fn fill_energy(&mut self, fraction: f64) {
        let level = (fraction.clamp(0.0, 1.0)) * self.max_tile_energy;
        for (tile, blocked) in self.energy.iter_mut().zip(self.obstacles.iter()) {
            *tile = if *blocked { 0.0 } else { level };
        }
    }

    /// Total banked tile energy.
    pub fn total_tile_energy(&self) -> f64 {
        self.energy.iter().sum()
    }

    /// Total energy held by organisms.
    pub fn total_cell_energy(&self) -> f64 {
        self.cells.iter().map(|(_, c)| c.energy()).sum()
    }

    /// The energy layer in row-major order.
    pub fn energy_grid(&self) -> &[f64] {
        &self.energy
    }

    /// One regeneration and diffusion pass.
    ///
    /// Per open tile:
    ///
    /// ```text
    /// regen  = regen_rate * (cap - e) * event_multiplier + event_add
    /// regen *= max(0, 1 - 0.5 * density_effect * density)
    /// e'     = e + regen + diffusion_rate * (mean(open 4-neighbours) - e) - drain
    /// e'     = clamp(e', 0, cap)
    /// ```
    ///
    /// Obstacle tiles are skipped and stay at zero.
    pub fn regenerate_energy_grid(
        &mut self,
        events: &[Event],
        resolver: &mut EventEffectResolver,
        params: &RegenParams,
    ) {
        let cap = self.max_tile_energy;
        let regen_rate = finite_or(params.regen_rate, 0.0).max(0.0);
        let diffusion = finite_or(params.diffusion_rate, 0.0).clamp(0.0, 1.0);
        let density_effect = finite_or(params.density_effect_multiplier, 0.0).max(0.0);

        for row in 0..self.rows {
            for col in 0..self.cols {
                let Some(index) = self.index(row, col) else {
                    continue;
                };
                if self.obstacles.get(index).copied().unwrap_or(true) {
                    if let Some(next) = self.energy_next.get_mut(index) {
                        *next = 0.0;
                    }
                    continue;
                }
                let current = self.energy.get(index).copied().unwrap_or(0.0);
                let modifiers =
                    resolver.modifiers_at(events, row, col, params.event_strength_multiplier);

                let mut regen = regen_rate * (cap - current) * modifiers.regen_multiplier
                    + modifiers.regen_add;
                let damping = (DENSITY_REGEN_DAMPING * density_effect)
                    .mul_add(-self.density.get(row, col), 1.0)
                    .max(0.0);
                regen *= damping;

                let spread = self.neighbour_mean(row, col).map_or(0.0, |mean| diffusion * (mean - current));
                let value = current + regen + spread - modifiers.drain;
                if let Some(next) = self.energy_next.get_mut(index) {
                    *next = if value.is_finite() {
                        value.clamp(0.0, cap)
                    } else {
                        0.0
                    };
                }
            }
        }
        std::mem::swap(&mut self.energy, &mut self.energy_next);
    }

    fn neighbour_mean(&self, row: usize, col: usize) -> Option<f64> {
        let pos = Position::new(row, col);
        let (sum, count) = ORTHOGONAL_OFFSETS
            .iter()
            .filter_map(|&(dr, dc)| pos.offset(dr, dc, self.rows, self.cols))
            .filter(|p| !self.is_obstacle(p.row, p.col))
            .fold((0.0, 0_usize), |(sum, count), p| {
                (sum + self.tile_energy(p.row, p.col), count.saturating_add(1))
            });
        (count > 0).then(|| sum / count as f64)
    }

    // -----------------------------------------------------------------------
    // Density
    // -----------------------------------------------------------------------

    /// Resync dirty density tiles. Call once per tick.
    pub fn sync_density(&mut self) {
        self.density.sync(&self.occupancy, &self.obstacles);
    }

    /// Local density at a tile as of the last sync.
    pub fn density_at(&self, row: usize, col: usize) -> f64 {
        self.density.get(row, col)
    }

    /// The density field.
    pub const fn density(&self) -> &DensityField {
        &self.density
    }

    // -----------------------------------------------------------------------
    // Bulk
    // -----------------------------------------------------------------------

    /// Remove every organism.
    pub fn clear_cells(&mut self) {
        self.cells.clear();
        self.occupancy.fill(None);
        self.density.mark_all_dirty();
    }

    /// Free, open tiles in row-major order.
    pub fn free_tiles(&self) -> Vec<Position> {
        (0..self.rows)
            .flat_map(|r| (0..self.cols).map(move |c| Position::new(r, c)))
            .filter(|p| self.is_free(p.row, p.col))
            .collect()
    }
}

const fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}
