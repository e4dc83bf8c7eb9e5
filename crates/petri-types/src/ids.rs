//! Generational identifiers for organisms stored in a dense arena.
//!
//! The grid owns organisms in a slot arena and tiles store [`CellId`]s
//! rather than references. A slot can be reused after its occupant dies, so
//! every id carries the generation of the slot at the time it was issued.
//! Comparing ids therefore compares identity, not just storage location.

use serde::{Deserialize, Serialize};

/// Identity of one organism: arena slot plus slot generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId {
    index: u32,
    generation: u32,
}

impl CellId {
    /// Build an id from a slot index and generation.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The arena slot this id points at.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The slot generation this id was issued for.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// The arena slot as a `usize` for vector lookups.
    pub fn slot(self) -> usize {
        usize::try_from(self.index).unwrap_or(usize::MAX)
    }
}

impl core::fmt::Display for CellId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cell#{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_distinguishes_reused_slots() {
        let first = CellId::new(3, 0);
        let reused = CellId::new(3, 1);
        assert_ne!(first, reused);
        assert_eq!(first.slot(), reused.slot());
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(CellId::new(7, 2).to_string(), "cell#7v2");
    }
}
