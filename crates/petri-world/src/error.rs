//! Error types for the `petri-world` crate.
//!
//! Construction and configuration fail with [`WorldError`]. Spatial
//! contention during a tick (moving onto an occupied or blocked tile) is not
//! an error; those operations return `false` or `None` instead.

use petri_agents::AgentError;

/// Errors that can occur while building or configuring the grid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// The grid has zero rows or columns, or is too large to index.
    #[error("invalid grid dimensions {rows}x{cols}")]
    InvalidDimensions {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
    },

    /// The tile energy cap is zero, negative, or not finite.
    #[error("max tile energy must be positive and finite, got {value}")]
    InvalidEnergyCap {
        /// The rejected value.
        value: f64,
    },

    /// A coordinate lies outside the grid.
    #[error("tile ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Grid rows.
        rows: usize,
        /// Grid columns.
        cols: usize,
    },

    /// An obstacle preset name was not recognised.
    #[error("unknown obstacle preset: {name}")]
    UnknownPreset {
        /// The rejected name.
        name: String,
    },

    /// An organism could not be constructed.
    #[error(transparent)]
    Agent(#[from] AgentError),
}
