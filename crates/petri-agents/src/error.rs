//! Error types for the petri-agents crate.
//!
//! Genome decoding is the one place in the simulation that fails eagerly:
//! a corrupt byte sequence would silently skew every trait and every brain
//! derived from it, so it is rejected at construction. Everything downstream
//! of a valid genome degrades to neutral defaults instead of erroring.

/// Errors raised while decoding a genome from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenomeError {
    /// The byte sequence is shorter than the fixed base segment.
    #[error("genome too short: {len} bytes, base segment needs {minimum}")]
    TooShort {
        /// Length of the rejected sequence.
        len: usize,
        /// Required minimum length.
        minimum: usize,
    },

    /// The neural tail is not a whole number of gene records.
    #[error("neural segment of {neural_len} bytes is not a multiple of the {record_width}-byte record width")]
    RaggedNeuralSegment {
        /// Length of the trailing neural segment.
        neural_len: usize,
        /// Width of one neural gene record.
        record_width: usize,
    },

    /// The neural tail holds more records than the brain can address.
    #[error("genome carries {count} neural genes, maximum is {maximum}")]
    TooManyNeuralGenes {
        /// Number of records found.
        count: usize,
        /// Maximum permitted.
        maximum: usize,
    },
}

/// Errors that can occur while constructing or mutating organisms.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    /// The genome could not be decoded.
    #[error("invalid genome: {0}")]
    Genome(#[from] GenomeError),

    /// An energy value was NaN or infinite.
    #[error("energy must be finite, got {value}")]
    NonFiniteEnergy {
        /// The rejected value.
        value: f64,
    },

    /// The tile energy cap was zero, negative, or not finite.
    #[error("max tile energy must be positive and finite, got {value}")]
    InvalidEnergyCap {
        /// The rejected value.
        value: f64,
    },
}
