//! Life-event records emitted by the tick pipeline.
//!
//! These are the payloads handed to the statistics collaborator and stored in
//! the per-tick life-event log carried by snapshots. They are plain data: the
//! core never reads them back to make decisions.

use serde::{Deserialize, Serialize};

use crate::geometry::Position;
use crate::ids::CellId;

/// Why an organism died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Energy fell to the starvation threshold after metabolic costs.
    Starvation,
    /// Age reached the genome-derived lifespan.
    OldAge,
    /// The age-driven senescence hazard fired before lifespan expiry.
    Senescence,
    /// Lost a fight.
    Combat,
    /// Environmental event damage drove energy to zero.
    EventExposure,
    /// Removed because its tile became an obstacle.
    Evicted,
}

impl core::fmt::Display for DeathCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Starvation => write!(f, "starvation"),
            Self::OldAge => write!(f, "old_age"),
            Self::Senescence => write!(f, "senescence"),
            Self::Combat => write!(f, "combat"),
            Self::EventExposure => write!(f, "event_exposure"),
            Self::Evicted => write!(f, "evicted"),
        }
    }
}

/// An organism was born.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthRecord {
    /// The newborn.
    pub child: CellId,
    /// Where it was placed.
    pub position: Position,
    /// The parent that initiated reproduction.
    pub parent: CellId,
    /// The chosen mate.
    pub mate: CellId,
    /// Starting energy transferred from the parents.
    pub energy: f64,
    /// Genetic similarity of the two parents (0..1).
    pub parent_similarity: f64,
}

/// An organism died.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// The deceased.
    pub cell: CellId,
    /// Where it died.
    pub position: Position,
    /// Why it died.
    pub cause: DeathCause,
    /// Age in ticks at death.
    pub age: u32,
}

/// A fight was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FightRecord {
    /// The organism that started the fight.
    pub initiator: CellId,
    /// The organism that was attacked.
    pub target: CellId,
    /// Winner of the fight.
    pub winner: CellId,
    /// Loser of the fight (removed from the grid).
    pub loser: CellId,
    /// Probability the initiator had of winning.
    pub win_probability: f64,
    /// Whether the fight was fought at range (loser removed in place).
    pub ranged: bool,
}

/// A cooperative energy transfer happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooperationRecord {
    /// The donor.
    pub actor: CellId,
    /// The recipient.
    pub recipient: CellId,
    /// Energy moved from donor to recipient.
    pub transferred: f64,
}

/// A mate was selected for a reproduction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MateChoiceRecord {
    /// The choosing organism.
    pub chooser: CellId,
    /// The chosen mate.
    pub mate: CellId,
    /// Genetic similarity between the two.
    pub similarity: f64,
    /// How many candidate mates were available.
    pub candidates: usize,
    /// Whether the reproduction decision came from the neural policy.
    pub used_network: bool,
    /// Whether the low-diversity penalty was applied.
    pub diversity_penalized: bool,
}

/// A reproduction attempt was rejected by the selection-zone collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedRecord {
    /// The organism that attempted to reproduce.
    pub parent: CellId,
    /// The chosen mate.
    pub mate: CellId,
    /// The tile the offspring would have occupied.
    pub spawn: Position,
    /// Reason reported by the zone collaborator.
    pub reason: String,
}

/// One entry in the per-tick life-event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifeEvent {
    /// See [`BirthRecord`].
    Birth(BirthRecord),
    /// See [`DeathRecord`].
    Death(DeathRecord),
    /// See [`FightRecord`].
    Fight(FightRecord),
    /// See [`CooperationRecord`].
    Cooperation(CooperationRecord),
    /// See [`BlockedRecord`].
    ReproductionBlocked(BlockedRecord),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn life_event_is_tagged() {
        let event = LifeEvent::Death(DeathRecord {
            cell: CellId::new(1, 0),
            position: Position::new(0, 0),
            cause: DeathCause::Starvation,
            age: 12,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"death\""));
        assert!(json.contains("\"cause\":\"starvation\""));
    }
}
