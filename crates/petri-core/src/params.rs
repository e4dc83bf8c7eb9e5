//! Per-tick parameters passed to [`GridManager::update`].
//!
//! These are the knobs an outer driver may change between ticks. They are
//! loaded from the `tick` section of the YAML config and every field has a
//! default, so an empty section is valid.
//!
//! [`GridManager::update`]: crate::manager::GridManager::update

use petri_world::RegenParams;
use serde::Deserialize;

/// Numeric parameters of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct UpdateParams {
    /// Scales every density effect: metabolic crowding, regen damping, enemy
    /// bias (default: 1.0).
    #[serde(default = "default_one")]
    pub density_effect_multiplier: f64,

    /// Similarity at or above which a neighbour counts as society (default: 0.8).
    #[serde(default = "default_society_similarity")]
    pub society_similarity: f64,

    /// Similarity below which a neighbour counts as an enemy, before the
    /// density bias (default: 0.55).
    #[serde(default = "default_enemy_similarity")]
    pub enemy_similarity: f64,

    /// Scales the strength of every active event (default: 1.0).
    #[serde(default = "default_one")]
    pub event_strength_multiplier: f64,

    /// Share of missing tile energy restored per tick (default: 0.05).
    #[serde(default = "default_energy_regen_rate")]
    pub energy_regen_rate: f64,

    /// Pull of each tile toward its neighbour mean per tick (default: 0.1).
    #[serde(default = "default_energy_diffusion_rate")]
    pub energy_diffusion_rate: f64,

    /// Scales genome mutation rates at breeding (default: 1.0).
    #[serde(default = "default_one")]
    pub mutation_multiplier: f64,

    /// Genetic distance below which a mate counts as too similar (default: 0.05).
    #[serde(default = "default_mating_diversity_threshold")]
    pub mating_diversity_threshold: f64,

    /// Factor applied to reproduction probability for too-similar mates
    /// (default: 0.3).
    #[serde(default = "default_low_diversity_repro_multiplier")]
    pub low_diversity_repro_multiplier: f64,
}

impl UpdateParams {
    /// The grid regeneration view of these parameters.
    pub const fn regen_params(&self) -> RegenParams {
        RegenParams {
            regen_rate: self.energy_regen_rate,
            diffusion_rate: self.energy_diffusion_rate,
            event_strength_multiplier: self.event_strength_multiplier,
            density_effect_multiplier: self.density_effect_multiplier,
        }
    }
}

impl Default for UpdateParams {
    fn default() -> Self {
        Self {
            density_effect_multiplier: default_one(),
            society_similarity: default_society_similarity(),
            enemy_similarity: default_enemy_similarity(),
            event_strength_multiplier: default_one(),
            energy_regen_rate: default_energy_regen_rate(),
            energy_diffusion_rate: default_energy_diffusion_rate(),
            mutation_multiplier: default_one(),
            mating_diversity_threshold: default_mating_diversity_threshold(),
            low_diversity_repro_multiplier: default_low_diversity_repro_multiplier(),
        }
    }
}

const fn default_one() -> f64 {
    1.0
}
const fn default_society_similarity() -> f64 {
    0.8
}
const fn default_enemy_similarity() -> f64 {
    0.55
}
const fn default_energy_regen_rate() -> f64 {
    0.05
}
const fn default_energy_diffusion_rate() -> f64 {
    0.1
}
const fn default_mating_diversity_threshold() -> f64 {
    0.05
}
const fn default_low_diversity_repro_multiplier() -> f64 {
    0.3
}
