//! Shared type definitions for the Petri grid ecosystem.
//!
//! This crate holds the small value types that every other crate in the
//! workspace passes around: arena identifiers, grid geometry, environmental
//! events, and the life-event records emitted by the tick pipeline.
//!
//! # Modules
//!
//! - [`ids`] -- Generational arena identifiers ([`CellId`])
//! - [`geometry`] -- Grid positions and rectangles ([`Position`], [`Rect`])
//! - [`events`] -- Environmental events ([`EventKind`], [`Event`])
//! - [`life`] -- Per-tick life-event records ([`LifeEvent`], [`DeathCause`])

pub mod events;
pub mod geometry;
pub mod ids;
pub mod life;

// Re-export all public types at crate root for convenience.
pub use events::{Event, EventKind};
pub use geometry::{Position, Rect};
pub use ids::CellId;
pub use life::{
    BirthRecord, BlockedRecord, CooperationRecord, DeathCause, DeathRecord, FightRecord,
    LifeEvent, MateChoiceRecord,
};
