//! # oncosynth-catalog
//!
//! The TOML-driven distribution catalog for the oncosynth generator.
//!
//! ## Overview
//!
//! A [`Catalog`] holds every probability table, Gaussian parameter, and
//! conditional table the clinical timeline draws from. It is pure data: it is
//! loaded once, validated once, and then shared read-only by every patient of
//! a run.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use oncosynth_catalog::Catalog;
//!
//! let catalog = Catalog::builtin()?;
//! let custom = Catalog::from_file(Path::new("my_catalog.toml"))?;
//! ```
//!
//! ## Table order
//!
//! Categorical tables are ordered lists. The sampler accumulates weights in
//! declaration order, so the same seed reproduces the same dataset only for
//! the same row order.

pub mod loader;
pub mod model;
pub mod table;

pub use loader::CatalogSummary;
pub use model::Catalog;
pub use table::{
    Bounds, Condition, Gaussian, IntRange, Prevalence, SmokingStatus, SubtypeMap, WeightedEntry,
    WeightedTable,
};

// ── Tests ─────────────────────────────────────────────────────────────────────
