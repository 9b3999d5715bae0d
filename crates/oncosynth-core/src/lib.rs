//! # oncosynth-core
//!
//! The generator: a seeded, reproducible producer of synthetic breast-cancer
//! patient records with controlled defect injection.
//!
//! This crate provides:
//! - The categorical sampler and the perturbation engine
//! - Stage to TNM resolution
//! - The clinical timeline and the comorbidity, drug, and family generators
//! - `Synthesizer`, which assembles one `PatientBundle` per patient
//! - `Assembler`, which drives a dataset run into a `RecordSink`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oncosynth_catalog::Catalog;
//! use oncosynth_core::{GenerationContext, SynthesisConfig, Synthesizer};
//!
//! let synth = Synthesizer::new(Catalog::builtin()?, SynthesisConfig { reference_date });
//! let mut ctx = GenerationContext::seeded(42);
//! let bundle = synth.generate(&mut ctx, 1, 0.05)?;
//! ```
//!
//! The same catalog, reference date, seed, and probability always produce
//! the same bundles.

pub mod ancillary;
pub mod assembler;
pub mod context;
pub mod perturb;
pub mod sampler;
pub mod staging;
pub mod timeline;
pub mod traits;

pub use assembler::{Assembler, Cohort, RunSummary, Synthesizer};
pub use context::{EntryIdAllocator, GenerationContext};
pub use perturb::Perturber;
pub use timeline::{ClinicalTimeline, SynthesisConfig, TimelineGenerator};
pub use traits::{BundleVerifier, RecordSink};
