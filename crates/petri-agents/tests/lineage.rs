//! Integration tests for organisms across generations.
//!
//! These exercise the public surface only: random founders, repeated
//! breeding, and decisions taken by the resulting offspring.

// Integration tests use unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use petri_agents::{
    AgentTuning, Cell, Genome, OutputGroup, Relation, Sensor, SensorReadings,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const MAX: f64 = 10.0;

// =============================================================================
// Helpers
// =============================================================================

fn readings() -> SensorReadings {
    SensorReadings::new()
        .with(Sensor::Energy, 0.8)
        .with(Sensor::EffectiveDensity, 0.2)
        .with(Sensor::EnemyFraction, 0.5)
        .with(Sensor::AllyFraction, 0.5)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn many_generations_stay_valid() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut a = Cell::random(MAX, MAX, &mut rng).unwrap();
    let mut b = Cell::random(MAX, MAX, &mut rng).unwrap();

    for _ in 0..50 {
        let child = a.breed(&mut b, 3.0, MAX, &mut rng).unwrap();
        assert!(Genome::from_bytes(child.genome().bytes().to_vec()).is_ok());
        assert!(child.energy() >= 0.0 && child.energy() <= MAX);
        assert!(child.genome().brain_metrics().is_some());
        b = child;
        a.gain_energy(MAX, MAX);
        b.gain_energy(MAX, MAX);
    }
}

#[test]
fn decisions_are_reproducible_under_same_seed() {
    let run = |seed: u64| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut cell = Cell::random(MAX * 0.9, MAX, &mut rng).unwrap();
        let r = readings();
        let repro = cell.decide_reproduction(&r, 0.2, MAX);
        let fight = cell.choose_interaction_action(Relation::Enemy, &r, MAX, &mut rng);
        let help = cell.choose_interaction_action(Relation::Ally, &r, MAX, &mut rng);
        (repro, fight, help)
    };
    assert_eq!(run(77), run(77));
}

#[test]
fn network_groups_agree_with_connection_counts() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for _ in 0..20 {
        let genome = Genome::random(&mut rng);
        let cell = Cell::new(genome, MAX, MAX).unwrap();
        let r = readings();
        for group in OutputGroup::ALL {
            let out = cell.brain().evaluate_group(group, &r, false);
            let has_edges = cell.brain().group_connection_count(group) > 0;
            assert_eq!(out.has_opinion(), has_edges);
        }
    }
}

#[test]
fn learning_keeps_gains_bounded() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let tuning = AgentTuning::default();
    let mut cell = Cell::random(MAX, MAX, &mut rng).unwrap();
    for _ in 0..200 {
        cell.begin_turn(&tuning);
        cell.observe(&readings());
        let _ = cell.decide_reproduction(&readings(), 0.1, MAX);
        cell.consolidate_feedback(MAX);
    }
    for sensor in Sensor::ALL {
        let gain = cell.brain().gain(sensor);
        assert!((0.25..=3.0).contains(&gain));
        assert!(cell.brain().target(sensor).is_finite());
    }
}
