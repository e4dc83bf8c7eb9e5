//! Dense slot arena owning every living organism.
//!
//! Tiles store [`CellId`]s, never references. A slot is reused after its
//! occupant is removed; the slot generation is bumped on removal so stale
//! ids stop resolving.

use petri_agents::Cell;
use petri_types::{CellId, Position};

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    cell: Option<Cell>,
}

/// Generational arena of organisms.
#[derive(Debug, Clone, Default)]
pub struct CellArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl CellArena {
    /// Empty arena.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a cell, binding it to its new id and tile.
    ///
    /// Returns `None` only if the arena has exhausted its `u32` index space.
    pub fn insert(&mut self, cell: Cell, position: Position) -> Option<CellId> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).ok()?;
                self.slots.push(Slot::default());
                index
            }
        };
        let slot = self.slots.get_mut(usize::try_from(index).ok()?)?;
        let id = CellId::new(index, slot.generation);
        slot.cell = Some(cell.placed(id, position));
        self.live = self.live.saturating_add(1);
        Some(id)
    }

    /// Remove a cell. Stale ids return `None`.
    pub fn remove(&mut self, id: CellId) -> Option<Cell> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation() {
            return None;
        }
        let cell = slot.cell.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live = self.live.saturating_sub(1);
        Some(cell)
    }

    /// Move a cell's position mirror to `position`. Stale ids return `false`.
    pub fn rebind(&mut self, id: CellId, position: Position) -> bool {
        let Some(slot) = self.slots.get_mut(id.slot()) else {
            return false;
        };
        if slot.generation != id.generation() {
            return false;
        }
        match slot.cell.take() {
            Some(cell) => {
                slot.cell = Some(cell.placed(id, position));
                true
            }
            None => false,
        }
    }

    /// Look up a cell.
    pub fn get(&self, id: CellId) -> Option<&Cell> {
        let slot = self.slots.get(id.slot())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.cell.as_ref()
    }

    /// Look up a cell mutably.
    pub fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.cell.as_mut()
    }

    /// Borrow two distinct cells mutably at once.
    pub fn get_pair_mut(&mut self, a: CellId, b: CellId) -> Option<(&mut Cell, &mut Cell)> {
        let (ia, ib) = (a.slot(), b.slot());
        if ia == ib {
            return None;
        }
        let (lo, hi, swapped) = if ia < ib { (ia, ib, false) } else { (ib, ia, true) };
        let (head, tail) = self.slots.split_at_mut(hi);
        let low = head.get_mut(lo)?;
        let high = tail.first_mut()?;
        let (first, second) = if swapped { (high, low) } else { (low, high) };
        if first.generation != a.generation() || second.generation != b.generation() {
            return None;
        }
        Some((first.cell.as_mut()?, second.cell.as_mut()?))
    }

    /// Whether the id resolves to a living cell.
    pub fn contains(&self, id: CellId) -> bool {
        self.get(id).is_some()
    }

    /// Number of living cells.
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no living cells.
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over living cells in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let cell = slot.cell.as_ref()?;
            let index = u32::try_from(index).ok()?;
            Some((CellId::new(index, slot.generation), cell))
        })
    }

    /// Drop every cell. Slots are kept and their generations bumped, so ids
    /// handed out before the clear never resolve again.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.cell.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            if let Ok(index) = u32::try_from(index) {
                self.free.push(index);
            }
        }
        self.live = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use petri_agents::Genome;

    use super::*;

    fn cell() -> Cell {
        let genome = Genome::from_bytes(vec![128; petri_agents::genome::BASE_GENE_COUNT]).unwrap();
        Cell::new(genome, 1.0, 10.0).unwrap()
    }

    #[test]
    fn insert_binds_id_and_position() {
        let mut arena = CellArena::new();
        let id = arena.insert(cell(), Position::new(2, 3)).unwrap();
        let stored = arena.get(id).unwrap();
        assert_eq!(stored.id(), Some(id));
        assert_eq!(stored.position(), Position::new(2, 3));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn reused_slot_invalidates_stale_id() {
        let mut arena = CellArena::new();
        let old = arena.insert(cell(), Position::new(0, 0)).unwrap();
        assert!(arena.remove(old).is_some());
        let new = arena.insert(cell(), Position::new(0, 1)).unwrap();
        assert_eq!(old.slot(), new.slot());
        assert!(arena.get(old).is_none());
        assert!(arena.remove(old).is_none());
        assert!(arena.get(new).is_some());
    }

    #[test]
    fn pair_borrow_respects_order_and_identity() {
        let mut arena = CellArena::new();
        let a = arena.insert(cell(), Position::new(0, 0)).unwrap();
        let b = arena.insert(cell(), Position::new(0, 1)).unwrap();
        let (cb, ca) = arena.get_pair_mut(b, a).unwrap();
        assert_eq!(cb.id(), Some(b));
        assert_eq!(ca.id(), Some(a));
        assert!(arena.get_pair_mut(a, a).is_none());
    }

    #[test]
    fn clear_keeps_old_ids_stale() {
        let mut arena = CellArena::new();
        let a = arena.insert(cell(), Position::new(0, 0)).unwrap();
        let b = arena.insert(cell(), Position::new(0, 1)).unwrap();
        arena.clear();
        assert!(arena.is_empty());
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_none());

        let c = arena.insert(cell(), Position::new(1, 1)).unwrap();
        let d = arena.insert(cell(), Position::new(1, 2)).unwrap();
        assert_eq!(c.slot(), a.slot());
        assert_eq!(d.slot(), b.slot());
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_none());
        assert!(!arena.rebind(a, Position::new(2, 2)));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn rebind_moves_the_position_mirror() {
        let mut arena = CellArena::new();
        let id = arena.insert(cell(), Position::new(0, 0)).unwrap();
        assert!(arena.rebind(id, Position::new(3, 4)));
        let stored = arena.get(id).unwrap();
        assert_eq!(stored.position(), Position::new(3, 4));
        assert_eq!(stored.id(), Some(id));
    }
}
