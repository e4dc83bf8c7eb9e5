//! The grid substrate of the Petri ecosystem.
//!
//! This crate models the physical world organisms live in: a rectangular
//! grid of tiles holding at most one organism and a bounded amount of
//! energy, an obstacle mask, a local-density field, and the modifiers that
//! environmental events apply to energy regeneration.
//!
//! # Modules
//!
//! - [`grid`] -- [`GridState`]: occupancy, energy double buffer, obstacles,
//!   and the regeneration/diffusion pass.
//! - [`arena`] -- Generational organism arena addressed by [`CellId`].
//! - [`density`] -- Incrementally dirtied local-density field.
//! - [`events`] -- Event effect table and the per-tick cached resolver.
//! - [`obstacles`] -- Obstacle layout presets.
//! - [`error`] -- Error types for grid construction and configuration.
//!
//! [`CellId`]: petri_types::CellId

pub mod arena;
pub mod density;
pub mod error;
pub mod events;
pub mod grid;
pub mod obstacles;

// Re-export primary types at crate root.
pub use arena::CellArena;
pub use density::DensityField;
pub use error::WorldError;
pub use events::{EventEffect, EventEffectResolver, EventEffectTable, RegenScale, TileModifiers};
pub use grid::{DEFAULT_DENSITY_RADIUS, GridState, ObstacleChange, RegenParams};
pub use obstacles::ObstaclePreset;
