//! Transient interaction requests.
//!
//! An intent is created by an organism during its turn and consumed by the
//! interaction system within the same tick. Intents are never persisted.

use petri_types::{CellId, Position};

/// What the initiator wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    /// Attack the target.
    Fight,
    /// Transfer energy to the target.
    Cooperate,
}

/// Positions and geometry captured when the intent was created.
///
/// The interaction system checks these against the live grid; if either
/// participant has moved or vanished the intent is unresolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentMetadata {
    /// Initiator tile at creation time.
    pub initiator_position: Position,
    /// Target tile at creation time.
    pub target_position: Position,
    /// Chebyshev distance between the two.
    pub distance: usize,
    /// Whether the fight is at range (loser removed in place).
    pub ranged: bool,
}

/// A queued interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    /// Interaction type.
    pub kind: IntentKind,
    /// Organism that created the intent.
    pub initiator: CellId,
    /// Organism on the receiving end.
    pub target: CellId,
    /// Creation-time geometry.
    pub metadata: IntentMetadata,
}

impl Intent {
    /// Build an intent from the two participants' positions.
    pub const fn new(
        kind: IntentKind,
        initiator: CellId,
        initiator_position: Position,
        target: CellId,
        target_position: Position,
    ) -> Self {
        let distance = initiator_position.chebyshev(target_position);
        Self {
            kind,
            initiator,
            target,
            metadata: IntentMetadata {
                initiator_position,
                target_position,
                distance,
                ranged: distance > 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_fight_is_melee() {
        let intent = Intent::new(
            IntentKind::Fight,
            CellId::new(0, 0),
            Position::new(2, 2),
            CellId::new(1, 0),
            Position::new(3, 3),
        );
        assert_eq!(intent.metadata.distance, 1);
        assert!(!intent.metadata.ranged);
    }

    #[test]
    fn distant_fight_is_ranged() {
        let intent = Intent::new(
            IntentKind::Fight,
            CellId::new(0, 0),
            Position::new(0, 0),
            CellId::new(1, 0),
            Position::new(0, 2),
        );
        assert!(intent.metadata.ranged);
    }
}
