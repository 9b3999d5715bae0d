//! # oncosynth-verify
//!
//! Consistency checks for generated patient bundles.
//!
//! This crate provides [`engine::ConsistencyVerifier`], which implements the
//! [`oncosynth_core::traits::BundleVerifier`] trait. It checks bundles in two
//! phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate.
//! 2. **Semantic**: path rules (`RequiredField`, `AllowedValues`, `Range`,
//!    `SumOf`, `Contiguous`, `NotBefore`) and named `Custom` rules.
//!
//! [`rules::patient_bundle_schema`] is the built-in schema. Every uncorrupted
//! bundle passes it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use oncosynth_verify::{patient_bundle_schema, ConsistencyVerifier};
//!
//! let verifier = ConsistencyVerifier::with_builtin_rules();
//! let report = verifier.verify(&bundle, &patient_bundle_schema())?;
//! ```

pub mod engine;
pub mod rules;

pub use engine::{ConsistencyVerifier, CustomRuleFn};
pub use rules::patient_bundle_schema;
