//! The built-in consistency schema for patient bundles.
//!
//! Every rule here holds for a bundle generated with corruption probability
//! 0. Corrupted bundles may break any of them; the report then points at the
//! same fields the defect log names.

use serde_json::{json, Value};

use oncosynth_contracts::{
    bundle::PatientBundle,
    treatment::ChemoPhase,
    tumor::{Stage, StagingPhase},
    verify::{ConsistencyRule, ConsistencyRuleType, ConsistencySchema},
};

use crate::engine::CustomRuleFn;

pub const SCHEMA_ID: &str = "patient-bundle-v1";

fn rule(rule_id: &str, description: &str, rule_type: ConsistencyRuleType) -> ConsistencyRule {
    ConsistencyRule {
        rule_id: rule_id.to_string(),
        description: description.to_string(),
        rule_type,
    }
}

fn not_before(rule_id: &str, earlier: &str, later: &str) -> ConsistencyRule {
    rule(
        rule_id,
        &format!("{earlier} must not be after {later}"),
        ConsistencyRuleType::NotBefore {
            earlier: earlier.to_string(),
            later: later.to_string(),
        },
    )
}

fn custom(rule_id: &str, description: &str) -> ConsistencyRule {
    rule(
        rule_id,
        description,
        ConsistencyRuleType::Custom {
            function_name: rule_id.to_string(),
        },
    )
}

fn labels<I: IntoIterator<Item = &'static str>>(values: I) -> Vec<Value> {
    values.into_iter().map(|v| json!(v)).collect()
}

/// The JSON Schema document for the interface contract of a bundle.
pub fn bundle_json_schema() -> Value {
    let stages = labels(Stage::ALL.iter().map(|s| s.label()));
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": [
            "patient", "stagings", "chemotherapy", "surgeries", "radiotherapy",
            "comorbidities", "oral_drugs", "family_history", "defects"
        ],
        "properties": {
            "patient": {
                "type": "object",
                "required": [
                    "patient_id", "birth_date", "diagnosis_date", "age_at_diagnosis",
                    "molecular_subtype", "er_positive", "pr_positive", "her2_positive",
                    "ki67_percent", "neoadjuvant", "gynecology", "obstetrics"
                ],
                "properties": {
                    "patient_id": { "type": "integer", "minimum": 1 },
                    "birth_date": { "type": "string" },
                    "diagnosis_date": { "type": "string" },
                    "age_at_diagnosis": { "type": "integer" },
                    "death_date": { "type": ["string", "null"] },
                    "age_at_death": { "type": ["integer", "null"] },
                    "molecular_subtype": { "enum": ["PP", "PN", "NP", "NN"] },
                    "ki67_percent": { "type": "integer" },
                    "er_positive": { "type": "boolean" },
                    "pr_positive": { "type": "boolean" },
                    "her2_positive": { "type": "boolean" },
                    "neoadjuvant": { "type": "boolean" }
                }
            },
            "stagings": {
                "type": "array",
                "minItems": 1,
                "maxItems": 2,
                "items": {
                    "type": "object",
                    "required": ["phase", "stage", "tnm", "prefix", "grade"],
                    "properties": {
                        "phase": { "enum": ["diagnosis", "post_neoadjuvant"] },
                        "stage": { "enum": stages },
                        "prefix": { "enum": ["C", "P"] },
                        "histological_type": { "enum": ["ductal", "lobular", "other"] },
                        "grade": { "enum": ["1", "2", "3"] },
                        "tnm": {
                            "type": "object",
                            "required": ["t", "n", "m"],
                            "properties": {
                                "t": { "enum": ["0", "1", "2", "3", "4", "IS"] },
                                "n": { "enum": ["0", "1", "2", "3"] },
                                "micro_invasion": { "enum": ["MI", null] },
                                "m": { "enum": ["0", "1"] }
                            }
                        }
                    }
                }
            },
            "chemotherapy": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["regimen", "date", "cycle_number", "phase"],
                    "properties": {
                        "phase": { "enum": ["neoadjuvant", "adjuvant"] },
                        "cycle_number": { "type": "integer", "minimum": 1 }
                    }
                }
            },
            "surgeries": { "type": "array" },
            "radiotherapy": {
                "type": "object",
                "required": ["start_date", "end_date", "dose_gy"]
            },
            "comorbidities": { "type": "array" },
            "oral_drugs": { "type": "array" },
            "family_history": { "type": "array" },
            "defects": { "type": "array" }
        }
    })
}

/// The full built-in schema: structure plus clinical consistency rules.
///
/// Custom rules named here are registered by
/// `ConsistencyVerifier::with_builtin_rules()`.
pub fn patient_bundle_schema() -> ConsistencySchema {
    let obstetric = |field: &str| format!("patient.obstetrics.{field}");
    ConsistencySchema {
        schema_id: SCHEMA_ID.to_string(),
        json_schema: bundle_json_schema(),
        rules: vec![
            rule(
                "ki67-range",
                "Ki-67 is a percentage",
                ConsistencyRuleType::Range {
                    field_path: "patient.ki67_percent".to_string(),
                    min: 0.0,
                    max: 100.0,
                },
            ),
            rule(
                "age-at-diagnosis-range",
                "patients are adults of plausible age",
                ConsistencyRuleType::Range {
                    field_path: "patient.age_at_diagnosis".to_string(),
                    min: 18.0,
                    max: 120.0,
                },
            ),
            rule(
                "radiotherapy-dose-range",
                "radiotherapy dose stays within the clinical window",
                ConsistencyRuleType::Range {
                    field_path: "radiotherapy.dose_gy".to_string(),
                    min: 4.0,
                    max: 70.0,
                },
            ),
            rule(
                "obstetric-sum",
                "pregnancies equal births plus abortions plus caesareans",
                ConsistencyRuleType::SumOf {
                    total: obstetric("pregnancies"),
                    parts: vec![
                        obstetric("births"),
                        obstetric("abortions"),
                        obstetric("caesareans"),
                    ],
                },
            ),
            rule(
                "cycle-numbering",
                "chemotherapy cycles are numbered 1..n",
                ConsistencyRuleType::Contiguous {
                    array_path: "chemotherapy".to_string(),
                    field: "cycle_number".to_string(),
                },
            ),
            not_before("birth-before-diagnosis", "patient.birth_date", "patient.diagnosis_date"),
            not_before(
                "diagnosis-before-treatment",
                "patient.diagnosis_date",
                "patient.first_treatment_date",
            ),
            not_before("diagnosis-before-death", "patient.diagnosis_date", "patient.death_date"),
            not_before(
                "radiotherapy-window",
                "radiotherapy.start_date",
                "radiotherapy.end_date",
            ),
            custom(
                "death-fields-paired",
                "death date and age at death are present together",
            ),
            custom(
                "staging-phases",
                "a post-neoadjuvant staging exists exactly when the neoadjuvant flag is set",
            ),
            custom(
                "surgery-after-neoadjuvant",
                "surgery follows the last neoadjuvant cycle",
            ),
            custom(
                "radiotherapy-after-treatment",
                "radiotherapy starts after every chemotherapy cycle and surgery",
            ),
            custom("stage-iv-not-operated", "stage IV patients are not operated"),
            custom(
                "single-smoking-status",
                "a patient is not both a smoker and an ex-smoker",
            ),
        ],
    }
}

/// The typed checks behind the custom rules of [`patient_bundle_schema`].
pub fn builtin_custom_rules() -> Vec<(&'static str, CustomRuleFn)> {
    vec![
        ("death-fields-paired", Box::new(death_fields_paired) as CustomRuleFn),
        ("staging-phases", Box::new(staging_phases) as CustomRuleFn),
        ("surgery-after-neoadjuvant", Box::new(surgery_after_neoadjuvant) as CustomRuleFn),
        ("radiotherapy-after-treatment", Box::new(radiotherapy_after_treatment) as CustomRuleFn),
        ("stage-iv-not-operated", Box::new(stage_iv_not_operated) as CustomRuleFn),
        ("single-smoking-status", Box::new(single_smoking_status) as CustomRuleFn),
    ]
}

fn death_fields_paired(bundle: &PatientBundle) -> Option<String> {
    let p = &bundle.patient;
    (p.death_date.is_some() != p.age_at_death.is_some()).then(|| {
        format!(
            "death_date is {:?} but age_at_death is {:?}",
            p.death_date, p.age_at_death
        )
    })
}

fn staging_phases(bundle: &PatientBundle) -> Option<String> {
    if bundle.diagnosis_staging().is_none() {
        return Some("no diagnosis staging".to_string());
    }
    let post = bundle
        .stagings
        .iter()
        .filter(|s| s.phase == StagingPhase::PostNeoadjuvant)
        .count();
    let expected = usize::from(bundle.patient.neoadjuvant);
    (post != expected).then(|| {
        format!(
            "neoadjuvant is {} but {post} post-neoadjuvant stagings were recorded",
            bundle.patient.neoadjuvant
        )
    })
}

fn surgery_after_neoadjuvant(bundle: &PatientBundle) -> Option<String> {
    let last_cycle = bundle
        .chemotherapy
        .iter()
        .filter(|c| c.phase == ChemoPhase::Neoadjuvant)
        .map(|c| c.date)
        .max()?;
    let surgery = bundle.surgeries.iter().map(|s| s.date).min()?;
    (surgery < last_cycle).then(|| {
        format!("surgery on {surgery} precedes the neoadjuvant cycle of {last_cycle}")
    })
}

fn radiotherapy_after_treatment(bundle: &PatientBundle) -> Option<String> {
    let last = bundle
        .chemotherapy
        .iter()
        .map(|c| c.date)
        .chain(bundle.surgeries.iter().map(|s| s.date))
        .max()?;
    let start = bundle.radiotherapy.start_date;
    (start < last).then(|| format!("radiotherapy starts on {start} before treatment ends on {last}"))
}

fn stage_iv_not_operated(bundle: &PatientBundle) -> Option<String> {
    let stage = bundle.diagnosis_staging()?.stage;
    (stage == Stage::IV && !bundle.surgeries.is_empty()).then(|| {
        format!(
            "stage IV patient has {} surgical procedures",
            bundle.surgeries.len()
        )
    })
}

fn single_smoking_status(bundle: &PatientBundle) -> Option<String> {
    let present = |name: &str| {
        bundle
            .comorbidities
            .iter()
            .any(|c| c.condition == name && c.present)
    };
    (present("smoker") && present("ex-smoker"))
        .then(|| "both smoker and ex-smoker are present".to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use oncosynth_catalog::Catalog;
    use oncosynth_contracts::bundle::PatientBundle;
    use oncosynth_core::{traits::BundleVerifier, GenerationContext, SynthesisConfig, Synthesizer};

    use super::*;
    use crate::engine::ConsistencyVerifier;

    fn cohort(seed: u64, n: u64, p: f64) -> Vec<PatientBundle> {
        let synth = Synthesizer::new(
            Catalog::builtin().unwrap(),
            SynthesisConfig {
                reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            },
        );
        let mut ctx = GenerationContext::seeded(seed);
        synth.cohort(&mut ctx, n, p).map(Result::unwrap).collect()
    }

    #[test]
    fn test_every_custom_rule_is_registered() {
        let schema = patient_bundle_schema();
        let registered: Vec<&str> = builtin_custom_rules().into_iter().map(|(n, _)| n).collect();
        for rule in &schema.rules {
            if let ConsistencyRuleType::Custom { function_name } = &rule.rule_type {
                assert!(
                    registered.contains(&function_name.as_str()),
                    "{function_name} is not registered"
                );
            }
        }
    }

    #[test]
    fn test_json_schema_compiles() {
        assert!(jsonschema::validator_for(&bundle_json_schema()).is_ok());
    }

    /// Clean bundles satisfy every rule.
    #[test]
    fn test_clean_cohort_is_consistent() {
        let verifier = ConsistencyVerifier::with_builtin_rules();
        let schema = patient_bundle_schema();
        for bundle in cohort(2024, 1_000, 0.0) {
            let report = verifier.verify(&bundle, &schema).unwrap();
            assert!(
                report.passed,
                "patient {} failed: {:?}",
                bundle.patient_id(),
                report.failures
            );
        }
    }

    #[test]
    fn test_corrupted_cohort_is_flagged() {
        let verifier = ConsistencyVerifier::with_builtin_rules();
        let schema = patient_bundle_schema();
        let failing = cohort(2024, 300, 0.3)
            .iter()
            .filter(|b| !verifier.verify(b, &schema).unwrap().passed)
            .count();
        assert!(failing > 0, "p = 0.3 must produce inconsistent bundles");
    }

    #[test]
    fn test_operated_stage_iv_is_flagged() {
        let mut bundle = cohort(5, 200, 0.0)
            .into_iter()
            .find(|b| !b.surgeries.is_empty())
            .unwrap();
        assert_eq!(stage_iv_not_operated(&bundle), None);
        bundle.stagings[0].stage = Stage::IV;
        assert!(stage_iv_not_operated(&bundle).is_some());
    }

    #[test]
    fn test_both_smoking_flags_are_flagged() {
        let mut bundle = cohort(6, 1, 0.0).remove(0);
        for entry in &mut bundle.comorbidities {
            if entry.condition == "smoker" || entry.condition == "ex-smoker" {
                entry.present = true;
            }
        }
        assert!(single_smoking_status(&bundle).is_some());
    }

    #[test]
    fn test_early_radiotherapy_is_flagged() {
        let mut bundle = cohort(7, 200, 0.0)
            .into_iter()
            .find(|b| !b.chemotherapy.is_empty())
            .unwrap();
        assert_eq!(radiotherapy_after_treatment(&bundle), None);
        bundle.radiotherapy.start_date = bundle.patient.diagnosis_date;
        assert!(radiotherapy_after_treatment(&bundle).is_some());
    }
}
