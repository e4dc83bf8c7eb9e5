//! Combat odds.
//!
//! Fights are deliberately probabilistic. Each side's power is its net energy
//! after staking the fight cost, scaled by its combat trait. The normalised
//! power difference (the "edge") is shifted by risk tolerance, recovery rate,
//! and local density ("territory"), then squashed through a logistic.

/// Bound on the raw and adjusted edge.
pub const MAX_EDGE: f64 = 0.95;

/// Default logistic sharpness.
pub const DEFAULT_SHARPNESS: f64 = 4.0;

const RISK_WEIGHT: f64 = 0.2;
const RECOVERY_WEIGHT: f64 = 0.15;
const TERRITORY_WEIGHT: f64 = 0.3;

/// Standard logistic function.
pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// One side of a fight, as seen by the odds calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combatant {
    /// Current energy before the stake is deducted.
    pub energy: f64,
    /// Energy staked on the fight.
    pub fight_cost: f64,
    /// Combat power multiplier.
    pub combat_power: f64,
    /// Risk tolerance in `[0, 1]`.
    pub risk_tolerance: f64,
    /// Recovery rate in `[0, 1]`.
    pub recovery_rate: f64,
    /// Local density at this combatant's tile.
    pub local_density: f64,
}

impl Combatant {
    /// Effective fighting power.
    pub fn power(&self) -> f64 {
        (self.energy - self.fight_cost) * self.combat_power
    }
}

/// Adjusted edge of `a` over `b`, in `[-MAX_EDGE, MAX_EDGE]`.
pub fn combat_edge(a: &Combatant, b: &Combatant) -> f64 {
    let pa = a.power();
    let pb = b.power();
    let denom = pa.abs() + pb.abs();
    let base = if denom > f64::EPSILON && denom.is_finite() {
        ((pa - pb) / denom).clamp(-MAX_EDGE, MAX_EDGE)
    } else {
        0.0
    };
    let risk = RISK_WEIGHT * (a.risk_tolerance - b.risk_tolerance);
    let recovery = RECOVERY_WEIGHT * (a.recovery_rate - b.recovery_rate);
    let territory = TERRITORY_WEIGHT * (a.local_density - b.local_density);
    let edge = base + risk + recovery + territory;
    if edge.is_finite() {
        edge.clamp(-MAX_EDGE, MAX_EDGE)
    } else {
        0.0
    }
}

/// Probability that `a` beats `b`.
pub fn win_probability(a: &Combatant, b: &Combatant, sharpness: f64) -> f64 {
    logistic(combat_edge(a, b) * sharpness)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter(energy: f64) -> Combatant {
        Combatant {
            energy,
            fight_cost: 1.0,
            combat_power: 1.0,
            risk_tolerance: 0.5,
            recovery_rate: 0.5,
            local_density: 0.0,
        }
    }

    #[test]
    fn equal_fighters_are_a_coin_flip() {
        let p = win_probability(&fighter(5.0), &fighter(5.0), DEFAULT_SHARPNESS);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn odds_are_complementary() {
        let a = fighter(8.0);
        let b = Combatant {
            risk_tolerance: 0.9,
            ..fighter(3.0)
        };
        let pab = win_probability(&a, &b, DEFAULT_SHARPNESS);
        let pba = win_probability(&b, &a, DEFAULT_SHARPNESS);
        assert!((pab + pba - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stronger_side_is_favoured_but_not_certain() {
        let p = win_probability(&fighter(100.0), &fighter(1.0), DEFAULT_SHARPNESS);
        assert!(p > 0.9);
        assert!(p < 1.0);
    }

    #[test]
    fn territory_favours_denser_side() {
        let home = Combatant {
            local_density: 0.8,
            ..fighter(5.0)
        };
        assert!(combat_edge(&home, &fighter(5.0)) > 0.0);
    }

    #[test]
    fn zero_power_gives_neutral_base() {
        assert!(combat_edge(&fighter(1.0), &fighter(1.0)).abs() < f64::EPSILON);
    }
}
