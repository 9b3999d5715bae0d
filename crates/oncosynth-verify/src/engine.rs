//! Consistency verifier for generated bundles.
//!
//! `ConsistencyVerifier` implements `BundleVerifier` from `oncosynth-core`.
//! Verification runs in two phases:
//!
//! 1. **Structural**: the JSON rendering of the bundle is validated against
//!    `ConsistencySchema::json_schema` using the `jsonschema` crate.
//! 2. **Semantic**: each `ConsistencyRule` in `ConsistencySchema::rules` is
//!    evaluated in order. All failures are collected before returning.
//!
//! Custom rules delegate to typed functions registered via `register_rule`.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, trace};

use oncosynth_contracts::{
    bundle::PatientBundle,
    error::{SynthError, SynthResult},
    verify::{ConsistencyFailure, ConsistencyReport, ConsistencyRuleType, ConsistencySchema},
};
use oncosynth_core::traits::BundleVerifier;

use crate::rules;

/// A caller-supplied consistency check.
///
/// Returns `Some(message)` when the bundle violates the check, `None` when
/// it holds.
pub type CustomRuleFn = Box<dyn Fn(&PatientBundle) -> Option<String> + Send + Sync>;

/// The bundle consistency verifier.
pub struct ConsistencyVerifier {
    custom_rules: HashMap<String, CustomRuleFn>,
}

impl ConsistencyVerifier {
    /// A verifier with no custom rules registered.
    pub fn new() -> Self {
        Self {
            custom_rules: HashMap::new(),
        }
    }

    /// A verifier with every clinical rule of [`rules::patient_bundle_schema`]
    /// registered.
    pub fn with_builtin_rules() -> Self {
        let mut verifier = Self::new();
        for (name, rule) in rules::builtin_custom_rules() {
            verifier.register_rule(name, rule);
        }
        verifier
    }

    /// Register a custom rule under `name`.
    ///
    /// The name must match the `function_name` used in
    /// `ConsistencyRuleType::Custom` rules. Registering the same name twice
    /// replaces the previous function.
    pub fn register_rule(&mut self, name: impl Into<String>, f: CustomRuleFn) {
        self.custom_rules.insert(name.into(), f);
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Resolve a dotted path (e.g. `"patient.obstetrics.births"`) against a
    /// JSON value. Numeric segments index into arrays. Returns `None` when a
    /// segment is missing or the value is JSON `null`.
    fn resolve_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
        let mut current = value;
        for segment in path.split('.') {
            let next = match current {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => current.get(segment),
            };
            match next {
                Some(v) if !v.is_null() => current = v,
                _ => return None,
            }
        }
        Some(current)
    }

    fn resolve_date(value: &Value, path: &str) -> Result<Option<NaiveDate>, String> {
        match Self::resolve_path(value, path) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(Some)
                .ok_or_else(|| format!("field '{path}' is not an ISO date: {v}")),
        }
    }

    fn evaluate(
        &self,
        rule_type: &ConsistencyRuleType,
        bundle: &PatientBundle,
        payload: &Value,
    ) -> Option<String> {
        match rule_type {
            ConsistencyRuleType::RequiredField { field_path } => {
                if Self::resolve_path(payload, field_path).is_none() {
                    Some(format!("required field '{field_path}' is missing or null"))
                } else {
                    None
                }
            }

            ConsistencyRuleType::AllowedValues {
                field_path,
                allowed,
            } => match Self::resolve_path(payload, field_path) {
                None => Some(format!(
                    "field '{field_path}' is missing; cannot check allowed values"
                )),
                Some(actual) if allowed.contains(actual) => None,
                Some(actual) => Some(format!(
                    "field '{field_path}' has value {actual} which is not in the allowed set"
                )),
            },

            ConsistencyRuleType::Range {
                field_path,
                min,
                max,
            } => match Self::resolve_path(payload, field_path).and_then(Value::as_f64) {
                None => Some(format!("field '{field_path}' is missing or not numeric")),
                Some(v) if v < *min || v > *max => Some(format!(
                    "field '{field_path}' = {v} is outside [{min}, {max}]"
                )),
                Some(_) => None,
            },

            ConsistencyRuleType::SumOf { total, parts } => {
                let number = |path: &str| Self::resolve_path(payload, path).and_then(Value::as_f64);
                let Some(expected) = number(total) else {
                    return Some(format!("field '{total}' is missing or not numeric"));
                };
                let mut sum = 0.0;
                for part in parts {
                    match number(part) {
                        Some(v) => sum += v,
                        None => return Some(format!("field '{part}' is missing or not numeric")),
                    }
                }
                if sum == expected {
                    None
                } else {
                    Some(format!(
                        "'{total}' = {expected} but {} sum to {sum}",
                        parts.join(" + ")
                    ))
                }
            }

            ConsistencyRuleType::Contiguous { array_path, field } => {
                let Some(items) = Self::resolve_path(payload, array_path).and_then(Value::as_array)
                else {
                    return None;
                };
                items.iter().enumerate().find_map(|(i, item)| {
                    let expected = i as u64 + 1;
                    match item.get(field).and_then(Value::as_u64) {
                        Some(actual) if actual == expected => None,
                        actual => Some(format!(
                            "'{array_path}[{i}].{field}' is {} but {expected} was expected",
                            actual.map_or_else(|| "missing".to_string(), |a| a.to_string())
                        )),
                    }
                })
            }

            ConsistencyRuleType::NotBefore { earlier, later } => {
                let dates = Self::resolve_date(payload, earlier)
                    .and_then(|e| Self::resolve_date(payload, later).map(|l| (e, l)));
                match dates {
                    Err(message) => Some(message),
                    Ok((Some(e), Some(l))) if e > l => Some(format!(
                        "'{earlier}' ({e}) is after '{later}' ({l})"
                    )),
                    Ok(_) => None,
                }
            }

            ConsistencyRuleType::Custom { function_name } => {
                match self.custom_rules.get(function_name.as_str()) {
                    Some(f) => f(bundle),
                    None => Some(format!(
                        "no custom rule registered for function name '{function_name}'"
                    )),
                }
            }
        }
    }
}

impl Default for ConsistencyVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleVerifier for ConsistencyVerifier {
    /// Verify `bundle` against `schema`.
    ///
    /// Runs structural JSON Schema validation first, then every semantic
    /// rule. All failures are accumulated into one report.
    ///
    /// Returns `Err(SchemaValidation)` when the bundle cannot be rendered as
    /// JSON or the schema document itself does not compile.
    fn verify(
        &self,
        bundle: &PatientBundle,
        schema: &ConsistencySchema,
    ) -> SynthResult<ConsistencyReport> {
        let payload = serde_json::to_value(bundle).map_err(|e| SynthError::SchemaValidation {
            reason: format!("bundle is not representable as JSON: {e}"),
        })?;
        let mut failures: Vec<ConsistencyFailure> = Vec::new();

        // ── Phase 1: JSON Schema structural validation ────────────────────────
        if !schema.json_schema.is_null() {
            let validator = jsonschema::validator_for(&schema.json_schema).map_err(|e| {
                SynthError::SchemaValidation {
                    reason: format!("invalid JSON Schema document '{}': {e}", schema.schema_id),
                }
            })?;
            for error in validator.iter_errors(&payload) {
                let message = format!(
                    "JSON Schema violation at {}: {}",
                    error.instance_path, error
                );
                trace!(schema_id = %schema.schema_id, %message, "structural validation failure");
                failures.push(ConsistencyFailure {
                    rule_id: "json-schema".to_string(),
                    message,
                });
            }
        }

        // ── Phase 2: Semantic rule evaluation ────────────────────────────────
        for rule in &schema.rules {
            if let Some(message) = self.evaluate(&rule.rule_type, bundle, &payload) {
                trace!(rule_id = %rule.rule_id, %message, "consistency rule failed");
                failures.push(ConsistencyFailure {
                    rule_id: rule.rule_id.clone(),
                    message,
                });
            }
        }

        let passed = failures.is_empty();
        debug!(
            schema_id = %schema.schema_id,
            patient_id = bundle.patient_id(),
            passed,
            failure_count = failures.len(),
            "consistency check complete"
        );

        Ok(ConsistencyReport {
            patient_id: bundle.patient_id(),
            passed,
            failures,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use oncosynth_catalog::Catalog;
    use oncosynth_contracts::{
        bundle::PatientBundle,
        error::SynthError,
        verify::{ConsistencyRule, ConsistencyRuleType, ConsistencySchema},
    };
    use oncosynth_core::{traits::BundleVerifier, GenerationContext, SynthesisConfig, Synthesizer};

    use super::ConsistencyVerifier;

    // ── Builder helpers ───────────────────────────────────────────────────────

    fn clean_bundle(seed: u64) -> PatientBundle {
        let synth = Synthesizer::new(
            Catalog::builtin().unwrap(),
            SynthesisConfig {
                reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            },
        );
        let mut ctx = GenerationContext::seeded(seed);
        synth.generate(&mut ctx, 1, 0.0).unwrap()
    }

    fn make_schema(json_schema: serde_json::Value, rules: Vec<ConsistencyRule>) -> ConsistencySchema {
        ConsistencySchema {
            schema_id: "test-schema-v1".to_string(),
            json_schema,
            rules,
        }
    }

    fn rule(id: &str, rule_type: ConsistencyRuleType) -> ConsistencyRule {
        ConsistencyRule {
            rule_id: id.to_string(),
            description: id.to_string(),
            rule_type,
        }
    }

    // ── JSON Schema ───────────────────────────────────────────────────────────

    #[test]
    fn test_schema_pass() {
        let json_schema = json!({
            "type": "object",
            "properties": { "patient": { "type": "object" } },
            "required": ["patient"]
        });
        let report = ConsistencyVerifier::new()
            .verify(&clean_bundle(1), &make_schema(json_schema, vec![]))
            .unwrap();
        assert!(report.passed, "expected pass, failures: {:?}", report.failures);
        assert_eq!(report.patient_id, 1);
    }

    #[test]
    fn test_schema_fail() {
        let json_schema = json!({ "type": "object", "required": ["no_such_field"] });
        let report = ConsistencyVerifier::new()
            .verify(&clean_bundle(1), &make_schema(json_schema, vec![]))
            .unwrap();
        assert!(!report.passed);
        assert_eq!(report.failures[0].rule_id, "json-schema");
    }

    #[test]
    fn test_invalid_schema_document_is_an_error() {
        let json_schema = json!({ "type": 12 });
        let result = ConsistencyVerifier::new().verify(&clean_bundle(1), &make_schema(json_schema, vec![]));
        assert!(matches!(result, Err(SynthError::SchemaValidation { .. })));
    }

    // ── Path rules ────────────────────────────────────────────────────────────

    #[test]
    fn test_required_field_fail() {
        let mut bundle = clean_bundle(2);
        bundle.patient.death_date = None;
        let schema = make_schema(
            serde_json::Value::Null,
            vec![rule(
                "death-date",
                ConsistencyRuleType::RequiredField {
                    field_path: "patient.death_date".to_string(),
                },
            )],
        );
        let report = ConsistencyVerifier::new().verify(&bundle, &schema).unwrap();
        assert!(!report.passed);
        assert!(report.failures[0].message.contains("patient.death_date"));
    }

    #[test]
    fn test_allowed_values_index_into_arrays() {
        let bundle = clean_bundle(3);
        let stage = bundle.stagings[0].stage.label();
        let allowed = |values: Vec<&str>| ConsistencyRuleType::AllowedValues {
            field_path: "stagings.0.stage".to_string(),
            allowed: values.into_iter().map(|v| json!(v)).collect(),
        };

        let pass = make_schema(serde_json::Value::Null, vec![rule("stage", allowed(vec![stage]))]);
        assert!(ConsistencyVerifier::new().verify(&bundle, &pass).unwrap().passed);

        let fail = make_schema(serde_json::Value::Null, vec![rule("stage", allowed(vec!["X"]))]);
        let report = ConsistencyVerifier::new().verify(&bundle, &fail).unwrap();
        assert_eq!(report.failures[0].rule_id, "stage");
    }

    #[test]
    fn test_range() {
        let mut bundle = clean_bundle(4);
        let schema = make_schema(
            serde_json::Value::Null,
            vec![rule(
                "ki67",
                ConsistencyRuleType::Range {
                    field_path: "patient.ki67_percent".to_string(),
                    min: 0.0,
                    max: 100.0,
                },
            )],
        );
        assert!(ConsistencyVerifier::new().verify(&bundle, &schema).unwrap().passed);

        bundle.patient.ki67_percent = 140;
        let report = ConsistencyVerifier::new().verify(&bundle, &schema).unwrap();
        assert!(report.failures[0].message.contains("140"));
    }

    #[test]
    fn test_sum_of() {
        let mut bundle = clean_bundle(5);
        let schema = make_schema(
            serde_json::Value::Null,
            vec![rule(
                "obstetric-sum",
                ConsistencyRuleType::SumOf {
                    total: "patient.obstetrics.pregnancies".to_string(),
                    parts: vec![
                        "patient.obstetrics.births".to_string(),
                        "patient.obstetrics.abortions".to_string(),
                        "patient.obstetrics.caesareans".to_string(),
                    ],
                },
            )],
        );
        assert!(ConsistencyVerifier::new().verify(&bundle, &schema).unwrap().passed);

        bundle.patient.obstetrics.births += 3;
        assert!(!ConsistencyVerifier::new().verify(&bundle, &schema).unwrap().passed);
    }

    #[test]
    fn test_contiguous() {
        let schema = make_schema(
            serde_json::Value::Null,
            vec![rule(
                "cycles",
                ConsistencyRuleType::Contiguous {
                    array_path: "chemotherapy".to_string(),
                    field: "cycle_number".to_string(),
                },
            )],
        );
        let mut bundle = (1..50)
            .map(clean_bundle)
            .find(|b| b.chemotherapy.len() >= 2)
            .expect("some patient in 50 seeds gets chemotherapy");
        assert!(ConsistencyVerifier::new().verify(&bundle, &schema).unwrap().passed);

        bundle.chemotherapy.remove(0);
        let report = ConsistencyVerifier::new().verify(&bundle, &schema).unwrap();
        assert!(report.failures[0].message.contains("chemotherapy[0].cycle_number"));
    }

    #[test]
    fn test_not_before_skips_absent_dates() {
        let mut bundle = clean_bundle(6);
        let schema = make_schema(
            serde_json::Value::Null,
            vec![rule(
                "death-after-diagnosis",
                ConsistencyRuleType::NotBefore {
                    earlier: "patient.diagnosis_date".to_string(),
                    later: "patient.death_date".to_string(),
                },
            )],
        );
        bundle.patient.death_date = None;
        assert!(ConsistencyVerifier::new().verify(&bundle, &schema).unwrap().passed);

        bundle.patient.death_date = NaiveDate::from_ymd_opt(1900, 1, 1);
        assert!(!ConsistencyVerifier::new().verify(&bundle, &schema).unwrap().passed);
    }

    // ── Custom rules ──────────────────────────────────────────────────────────

    #[test]
    fn test_custom_rule_fail() {
        let mut verifier = ConsistencyVerifier::new();
        verifier.register_rule(
            "always-fail",
            Box::new(|bundle| Some(format!("patient {} rejected", bundle.patient_id()))),
        );
        let schema = make_schema(
            serde_json::Value::Null,
            vec![rule(
                "custom-check",
                ConsistencyRuleType::Custom {
                    function_name: "always-fail".to_string(),
                },
            )],
        );
        let report = verifier.verify(&clean_bundle(7), &schema).unwrap();
        assert_eq!(report.failures[0].rule_id, "custom-check");
        assert!(report.failures[0].message.contains("patient 1"));
    }

    #[test]
    fn test_unregistered_custom_rule() {
        let schema = make_schema(
            serde_json::Value::Null,
            vec![rule(
                "phantom-check",
                ConsistencyRuleType::Custom {
                    function_name: "does-not-exist".to_string(),
                },
            )],
        );
        let report = ConsistencyVerifier::new().verify(&clean_bundle(8), &schema).unwrap();
        assert!(!report.passed);
        assert!(report.failures[0].message.contains("does-not-exist"));
    }
}
