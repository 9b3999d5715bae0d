//! Table and parameter types the catalog is built from.
//!
//! Categorical tables are ordered lists of `{ key, weight }` pairs. Order is
//! significant: the sampler walks keys in declaration order, so reordering a
//! table changes which key a given random draw maps to.
//!
//! Example in TOML:
//! ```toml
//! subtype = [
//!     { key = "PP", weight = 0.1107 },
//!     { key = "PN", weight = 0.7574 },
//! ]
//! ```

use serde::{Deserialize, Serialize};

use oncosynth_contracts::tumor::Subtype;

/// One `{ key, weight }` row as written in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedEntry<K> {
    pub key: K,
    pub weight: f64,
}

/// An ordered, non-empty categorical distribution.
///
/// Weights are non-negative and finite; this is enforced while
/// deserializing, so a `WeightedTable` that exists is always samplable.
/// Weights are expected to sum to roughly 1 but are not renormalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<WeightedEntry<K>>",
    into = "Vec<WeightedEntry<K>>",
    bound(serialize = "K: Serialize + Clone", deserialize = "K: Deserialize<'de>")
)]
pub struct WeightedTable<K: Clone> {
    entries: Vec<(K, f64)>,
}

impl<K: Clone> WeightedTable<K> {
    /// Build a table from `(key, weight)` pairs, rejecting empty tables and
    /// negative or non-finite weights.
    pub fn from_pairs(entries: Vec<(K, f64)>) -> Result<Self, String> {
        if entries.is_empty() {
            return Err("table has no entries".to_string());
        }
        if let Some(pos) = entries
            .iter()
            .position(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(format!(
                "entry {} has weight {}; weights must be finite and non-negative",
                pos, entries[pos].1
            ));
        }
        Ok(Self { entries })
    }

    /// The `(key, weight)` pairs in declaration order. Never empty.
    pub fn weights(&self) -> &[(K, f64)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }
}

impl<K: Clone> TryFrom<Vec<WeightedEntry<K>>> for WeightedTable<K> {
    type Error = String;

    fn try_from(rows: Vec<WeightedEntry<K>>) -> Result<Self, Self::Error> {
        Self::from_pairs(rows.into_iter().map(|e| (e.key, e.weight)).collect())
    }
}

impl<K: Clone> From<WeightedTable<K>> for Vec<WeightedEntry<K>> {
    fn from(table: WeightedTable<K>) -> Self {
        table
            .entries
            .into_iter()
            .map(|(key, weight)| WeightedEntry { key, weight })
            .collect()
    }
}

/// An independent Bernoulli item: `name` occurs with `probability`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prevalence {
    pub name: String,
    pub probability: f64,
}

/// A comorbidity catalog row.
///
/// The row flagged `smoking_history` is expanded into a `smoker` and an
/// `ex-smoker` entry instead of a single flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub probability: f64,
    #[serde(default)]
    pub smoking_history: bool,
}

/// Sub-category of a positive smoking history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmokingStatus {
    Smoker,
    ExSmoker,
}

impl SmokingStatus {
    pub const ALL: [SmokingStatus; 2] = [SmokingStatus::Smoker, SmokingStatus::ExSmoker];

    /// Condition name used for the emitted comorbidity entry.
    pub fn label(self) -> &'static str {
        match self {
            SmokingStatus::Smoker => "smoker",
            SmokingStatus::ExSmoker => "ex-smoker",
        }
    }
}

/// Normal distribution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub mean: f64,
    pub std: f64,
}

/// Half-open integer range `[low, high)`, used for uniform draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub low: i64,
    pub high: i64,
}

/// Closed clamp interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// One value per molecular subtype.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubtypeMap<T> {
    #[serde(rename = "PP")]
    pub pp: T,
    #[serde(rename = "PN")]
    pub pn: T,
    #[serde(rename = "NP")]
    pub np: T,
    #[serde(rename = "NN")]
    pub nn: T,
}

impl<T> SubtypeMap<T> {
    pub fn get(&self, subtype: Subtype) -> &T {
        match subtype {
            Subtype::PP => &self.pp,
            Subtype::PN => &self.pn,
            Subtype::NP => &self.np,
            Subtype::NN => &self.nn,
        }
    }

    pub fn values(&self) -> [&T; 4] {
        [&self.pp, &self.pn, &self.np, &self.nn]
    }
}
