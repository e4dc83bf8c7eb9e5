//! Error types for the `petri-core` crate.
//!
//! No error raised inside a tick is fatal. Collaborator failures are caught
//! at the call site, logged once, and treated as no-effect. Only manager
//! construction and configuration loading can fail outright.

use petri_world::WorldError;

/// A failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator refused or failed the call.
    #[error("collaborator call failed: {message}")]
    Failed {
        /// Human-readable detail.
        message: String,
    },

    /// The collaborator cannot serve calls right now.
    #[error("collaborator unavailable: {message}")]
    Unavailable {
        /// Human-readable detail.
        message: String,
    },
}

impl CollaboratorError {
    /// Shorthand for [`CollaboratorError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors that can occur while building a grid manager.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManagerError {
    /// The grid could not be created.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}
