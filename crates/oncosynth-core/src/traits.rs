//! Trait seams between the generator and its collaborators.
//!
//! - `RecordSink`: where finished bundles go (file, database)
//! - `BundleVerifier`: checks a bundle against a consistency schema
//!
//! The assembler drives both. Generation itself never touches I/O; every
//! side effect happens behind one of these traits.

use oncosynth_contracts::{
    bundle::PatientBundle,
    error::SynthResult,
    verify::{ConsistencyReport, ConsistencySchema},
};

/// A destination for generated patient bundles.
///
/// Bundles arrive in patient-id order. A sink must treat `write()` as
/// append-only; the assembler never rewrites a bundle it has handed off.
pub trait RecordSink: Send + Sync {
    /// Accept one finished bundle.
    ///
    /// A failed write aborts the run with `SynthError::SinkWriteFailed`.
    fn write(&self, bundle: &PatientBundle) -> SynthResult<()>;

    /// Called once after the last bundle of a dataset.
    ///
    /// Implementations may flush, seal, or sign here.
    fn finalize(&self, dataset_id: &str) -> SynthResult<()>;
}

/// A consistency checker for generated bundles.
///
/// Implementations must be deterministic and must not mutate the bundle.
/// A failing report is not an error: corrupted bundles are expected to fail.
pub trait BundleVerifier: Send + Sync {
    /// Check `bundle` against `schema`.
    ///
    /// Returns `passed = true` when every rule holds, otherwise
    /// `passed = false` with one failure per broken rule.
    fn verify(
        &self,
        bundle: &PatientBundle,
        schema: &ConsistencySchema,
    ) -> SynthResult<ConsistencyReport>;
}
