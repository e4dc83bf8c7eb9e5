//! Tick pipeline for the Petri grid ecosystem.
//!
//! This crate turns the world of `petri-world` and the organisms of
//! `petri-agents` into a running simulation. One call to
//! [`GridManager::update`] is one tick; it returns a [`Snapshot`] that
//! external collaborators can render or aggregate.
//!
//! # Modules
//!
//! - [`manager`] -- [`GridManager`]: owns the world and runs ticks
//! - [`population`] -- Per-organism tick phases and action priority
//! - [`interaction`] -- Intent queue and fight/cooperation resolution
//! - [`collaborators`] -- Stats, zone, and event-source traits
//! - [`snapshot`] -- Per-tick aggregates
//! - [`params`] -- Per-tick parameters
//! - [`config`] -- YAML configuration
//! - [`failure_log`] -- De-duplicated collaborator failure log
//! - [`error`] -- Error types

pub mod collaborators;
pub mod config;
pub mod error;
pub mod failure_log;
pub mod interaction;
pub mod manager;
pub mod params;
pub mod population;
pub mod snapshot;

pub use collaborators::{
    Collaborators, EventSource, ScheduledEvent, ScheduledEvents, SelectionZones, StatsSink,
    StatsTally, TallySink, ZoneVerdict,
};
pub use config::{ConfigError, SimulationConfig};
pub use error::{CollaboratorError, ManagerError};
pub use failure_log::FailureLog;
pub use interaction::{
    InteractionAdapter, InteractionSystem, ProcessSummary, Resolution, StandardAdapter,
};
pub use manager::{GridManager, ManagerOptions};
pub use params::UpdateParams;
pub use population::{PopulationReport, PopulationSystem, TickContext, diversity_adjusted_probability};
pub use snapshot::{CellSummary, Snapshot, SnapshotEntry};
