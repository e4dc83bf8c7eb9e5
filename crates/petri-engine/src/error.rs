//! Error types for the headless runner.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup, the tick loop, and snapshot export.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: petri_core::ConfigError,
    },

    /// Grid manager construction failed.
    #[error("manager error: {source}")]
    Manager {
        /// The underlying manager error.
        #[from]
        source: petri_core::ManagerError,
    },

    /// Snapshot serialization failed.
    #[error("snapshot encoding error: {source}")]
    Encode {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Writing the snapshot file failed.
    #[error("failed to write snapshot to {}: {source}", path.display())]
    Write {
        /// Destination that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
