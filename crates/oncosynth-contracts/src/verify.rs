//! Consistency schema and report types.
//!
//! A generated bundle can be checked against a `ConsistencySchema`: a JSON
//! Schema document for the interface contract plus clinical consistency
//! rules. Uncorrupted bundles always pass; corrupted ones may not, which is
//! the point of the defect injection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The full specification a bundle is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencySchema {
    /// Unique identifier for this schema (e.g. "patient-bundle-v1").
    pub schema_id: String,
    /// A JSON Schema document used for structural validation.
    pub json_schema: Value,
    /// Consistency rules evaluated after structural validation.
    pub rules: Vec<ConsistencyRule>,
}

/// A single consistency rule applied to a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyRule {
    /// Unique identifier for this rule, referenced in failure reports.
    pub rule_id: String,
    /// Human-readable description for reports.
    pub description: String,
    /// The check to apply.
    pub rule_type: ConsistencyRuleType,
}

/// The kinds of consistency checks the verifier supports.
///
/// Field paths are dotted paths into the JSON rendering of a bundle, e.g.
/// `"patient.obstetrics.births"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConsistencyRuleType {
    /// The field at `field_path` must be present and non-null.
    RequiredField { field_path: String },

    /// The field at `field_path` must equal one of `allowed`.
    AllowedValues {
        field_path: String,
        allowed: Vec<Value>,
    },

    /// The numeric field at `field_path` must lie in `[min, max]`.
    Range {
        field_path: String,
        min: f64,
        max: f64,
    },

    /// The numeric field at `total` must equal the sum of `parts`.
    SumOf { total: String, parts: Vec<String> },

    /// The array at `array_path` must number its elements `1..=n` in order
    /// through the integer field `field`.
    Contiguous { array_path: String, field: String },

    /// The ISO date at `earlier` must not be after the date at `later`.
    /// Skipped when either side is absent.
    NotBefore { earlier: String, later: String },

    /// Delegate to a named custom function registered with the verifier.
    Custom { function_name: String },
}

/// The result of running every rule in a `ConsistencySchema` on one bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub patient_id: u64,
    /// True only if all rules passed.
    pub passed: bool,
    /// All failures collected during this run. Empty on pass.
    pub failures: Vec<ConsistencyFailure>,
}

/// A single rule failure within a `ConsistencyReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyFailure {
    /// The `rule_id` of the rule that failed.
    pub rule_id: String,
    /// Human-readable explanation of why the rule failed.
    pub message: String,
}
