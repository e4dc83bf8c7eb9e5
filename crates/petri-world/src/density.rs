//! Incrementally maintained local-density field.
//!
//! Each tile's density is the fraction of occupied tiles within a circular
//! neighbourhood (the tile itself and obstacle tiles excluded). Occupancy
//! changes mark the affected neighbourhood dirty; [`DensityField::sync`]
//! recomputes only dirty tiles and runs once per tick.

use petri_types::CellId;

/// Per-tile occupancy fraction with lazy resync.
#[derive(Debug, Clone)]
pub struct DensityField {
    rows: usize,
    cols: usize,
    offsets: Vec<(isize, isize)>,
    values: Vec<f64>,
    dirty: Vec<bool>,
    dirty_count: usize,
}

impl DensityField {
    /// Field for a `rows` x `cols` grid with the given neighbourhood radius.
    ///
    /// Every tile starts dirty.
    pub fn new(rows: usize, cols: usize, radius: usize) -> Self {
        let len = rows.saturating_mul(cols);
        let r = isize::try_from(radius.max(1)).unwrap_or(1);
        let r_sq = r.saturating_mul(r);
        let mut offsets = Vec::new();
        for dr in -r..=r {
            for dc in -r..=r {
                if (dr, dc) != (0, 0) && dr.saturating_mul(dr).saturating_add(dc.saturating_mul(dc)) <= r_sq {
                    offsets.push((dr, dc));
                }
            }
        }
        Self {
            rows,
            cols,
            offsets,
            values: vec![0.0; len],
            dirty: vec![true; len],
            dirty_count: len,
        }
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row.saturating_mul(self.cols).saturating_add(col))
    }

    fn neighbours(&self, row: usize, col: usize) -> impl Iterator<Item = usize> + '_ {
        self.offsets.iter().filter_map(move |&(dr, dc)| {
            let r = row.checked_add_signed(dr)?;
            let c = col.checked_add_signed(dc)?;
            self.index(r, c)
        })
    }

    /// Mark the neighbourhood around a changed tile dirty.
    pub fn mark_dirty(&mut self, row: usize, col: usize) {
        let touched: Vec<usize> = self
            .index(row, col)
            .into_iter()
            .chain(self.neighbours(row, col))
            .collect();
        for index in touched {
            if let Some(flag) = self.dirty.get_mut(index)
                && !*flag
            {
                *flag = true;
                self.dirty_count = self.dirty_count.saturating_add(1);
            }
        }
    }

    /// Mark every tile dirty.
    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
        self.dirty_count = self.dirty.len();
    }

    /// Number of tiles awaiting recomputation.
    pub const fn dirty_count(&self) -> usize {
        self.dirty_count
    }

    /// Recompute dirty tiles from the occupancy and obstacle layers.
    pub fn sync(&mut self, occupancy: &[Option<CellId>], obstacles: &[bool]) {
        if self.dirty_count == 0 {
            return;
        }
        for row in 0..self.rows {
            for col in 0..self.cols {
                let Some(index) = self.index(row, col) else {
                    continue;
                };
                if !self.dirty.get(index).copied().unwrap_or(false) {
                    continue;
                }
                let mut open = 0_usize;
                let mut occupied = 0_usize;
                for neighbour in self.neighbours(row, col) {
                    if obstacles.get(neighbour).copied().unwrap_or(true) {
                        continue;
                    }
                    open = open.saturating_add(1);
                    if occupancy.get(neighbour).copied().flatten().is_some() {
                        occupied = occupied.saturating_add(1);
                    }
                }
                let value = if open == 0 {
                    0.0
                } else {
                    occupied as f64 / open as f64
                };
                if let Some(slot) = self.values.get_mut(index) {
                    *slot = value;
                }
                if let Some(flag) = self.dirty.get_mut(index) {
                    *flag = false;
                }
            }
        }
        self.dirty_count = 0;
    }

    /// Density at a tile as of the last sync. Out-of-bounds tiles read 0.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.index(row, col)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// The whole field in row-major order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
