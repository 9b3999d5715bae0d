//! Error types for the oncosynth generation pipeline.
//!
//! All fallible operations return `SynthResult<T>`. Generation itself cannot
//! fail halfway through a patient except on calendar overflow; every other
//! variant is a configuration or caller contract violation reported up front.

use thiserror::Error;

/// The unified error type for the oncosynth crates.
#[derive(Debug, Error)]
pub enum SynthError {
    /// The distribution catalog is malformed (bad TOML, negative or
    /// non-finite weights, missing conditional rows).
    ///
    /// Reported once at startup and fatal to the whole run.
    #[error("catalog error: {reason}")]
    Catalog { reason: String },

    /// A stage label outside the closed enumeration was supplied.
    #[error("unknown stage label '{label}'")]
    UnknownStage { label: String },

    /// The corruption probability is outside `[0, 1]`.
    #[error("corruption probability {value} is outside [0, 1]")]
    InvalidProbability { value: f64 },

    /// Patient identifiers start at 1.
    #[error("patient id {id} is invalid; identifiers start at 1")]
    InvalidPatientId { id: u64 },

    /// Calendar arithmetic left the representable date range.
    #[error("derivation failed: {reason}")]
    Derivation { reason: String },

    /// A record sink could not accept a bundle.
    #[error("sink write failed: {reason}")]
    SinkWriteFailed { reason: String },

    /// A consistency schema could not be compiled or applied.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },
}

/// Convenience alias used throughout the oncosynth crates.
pub type SynthResult<T> = Result<T, SynthError>;
