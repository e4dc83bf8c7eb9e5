//! Organisms for the Petri grid ecosystem.
//!
//! Everything an individual organism is and decides lives here; the grid and
//! the tick pipeline live in `petri-world` and `petri-core`.
//!
//! # Modules
//!
//! - [`genome`] -- Byte genotype, trait accessors, crossover and mutation
//! - [`brain`] -- Pruned neural policy with per-sensor plasticity
//! - [`cell`] -- The organism and its decision surface
//! - [`combat`] -- Probabilistic combat odds
//! - [`intent`] -- Transient fight/cooperate requests
//! - [`config`] -- Behaviour tuning constants
//! - [`error`] -- Error types

pub mod brain;
pub mod cell;
pub mod combat;
pub mod config;
pub mod error;
pub mod genome;
pub mod intent;

pub use brain::{
    Brain, BrainOutput, ExperienceImprint, OutputGroup, Sensor, SensorFeedback, SensorReadings,
};
pub use cell::{
    Cell, EnergyContext, EnergyOutcome, EventExposure, InteractionAction, InteractionChoice,
    InteractionCounters, MoveCandidate, MovementAction, MovementContext, MovementPlan,
    Relation, ReproductionDecision,
};
pub use combat::{Combatant, win_probability};
pub use config::AgentTuning;
pub use error::{AgentError, GenomeError};
pub use genome::{BrainMetrics, GeneSequence, Genome};
pub use intent::{Intent, IntentKind, IntentMetadata};
