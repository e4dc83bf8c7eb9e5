//! Tunable constants for organism behaviour.
//!
//! [`AgentTuning`] bundles the behaviour knobs that are not genome traits.
//! It deserializes from the `behavior` section of the simulation YAML, and
//! every field falls back to its default when omitted.

use serde::Deserialize;

use crate::combat::DEFAULT_SHARPNESS;

/// Behaviour constants shared by every organism.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentTuning {
    /// Logistic sharpness applied to the combat edge (default: 4.0).
    pub combat_sharpness: f64,

    /// Largest Chebyshev distance at which a fight may start (default: 1).
    ///
    /// Values above 1 allow ranged fights, which remove the loser in place.
    pub attack_range: usize,

    /// Cap on the genome-derived sight radius (default: 5).
    pub max_sight_radius: usize,

    /// Share of lifespan after which the senescence hazard starts (default: 0.6).
    pub senescence_onset: f64,

    /// Upper bound on the per-tick senescence hazard (default: 0.5).
    pub max_senescence_hazard: f64,

    /// How strongly fatigue throttles the activity gate (default: 0.5).
    pub fatigue_activity_damping: f64,

    /// Fatigue added by each executed action (default: 0.05).
    pub fatigue_per_action: f64,

    /// Fatigue shed per tick (default: 0.02).
    pub fatigue_recovery: f64,

    /// Smoothing factor of the fitness moving average (default: 0.1).
    pub fitness_smoothing: f64,

    /// Hard cap on the share of energy given in one cooperation (default: 0.35).
    pub max_cooperation_share: f64,

    /// Density-scaled bias added to the enemy similarity threshold (default: 0.1).
    pub density_enemy_bias: f64,

    /// Whether event exposure imprints on sensor calibration (default: true).
    pub event_imprinting: bool,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            combat_sharpness: DEFAULT_SHARPNESS,
            attack_range: 1,
            max_sight_radius: crate::genome::MAX_SIGHT_RADIUS,
            senescence_onset: 0.6,
            max_senescence_hazard: 0.5,
            fatigue_activity_damping: 0.5,
            fatigue_per_action: 0.05,
            fatigue_recovery: 0.02,
            fitness_smoothing: 0.1,
            max_cooperation_share: 0.35,
            density_enemy_bias: 0.1,
            event_imprinting: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_melee_only() {
        let tuning = AgentTuning::default();
        assert_eq!(tuning.attack_range, 1);
        assert!((tuning.combat_sharpness - 4.0).abs() < f64::EPSILON);
    }
}
