//! The per-patient record: demographics, outcome, markers, history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::tumor::Subtype;

/// Gynecological history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gynecology {
    pub menarche_age: i64,
    /// Menopause occurred before the age at diagnosis.
    pub menopause_before_diagnosis: bool,
    /// Absent when the drawn age is implausible for this patient.
    pub menopause_age: Option<i64>,
}

/// Obstetric history.
///
/// `pregnancies == births + abortions + caesareans` holds for uncorrupted
/// records only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstetrics {
    pub pregnancies: i64,
    pub births: i64,
    pub abortions: i64,
    pub caesareans: i64,
}

/// One synthesized patient.
///
/// `death_date` and `age_at_death` are either both present (deceased) or
/// both absent (alive at the reference date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: u64,
    pub birth_date: NaiveDate,
    pub diagnosis_date: NaiveDate,
    pub age_at_diagnosis: i64,
    /// Earliest of `first_chemotherapy_date` and `first_surgery_date`.
    pub first_treatment_date: Option<NaiveDate>,
    pub first_chemotherapy_date: Option<NaiveDate>,
    pub first_surgery_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub age_at_death: Option<i64>,
    /// The clean subtype draw; marker flags below may have been corrupted.
    pub molecular_subtype: Subtype,
    pub er_positive: bool,
    pub pr_positive: bool,
    pub her2_positive: bool,
    pub ki67_percent: i64,
    pub neoadjuvant: bool,
    pub gynecology: Gynecology,
    pub obstetrics: Obstetrics,
}

impl PatientRecord {
    /// True when the patient is recorded as deceased.
    pub fn is_deceased(&self) -> bool {
        self.death_date.is_some()
    }
}
