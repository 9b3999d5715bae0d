//! The patient bundle handed to record sinks, and its defect log.
//!
//! A `PatientBundle` owns everything generated for one patient. It is created
//! once per generation call and never mutated after hand-off.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ancillary::{ComorbidityEntry, FamilyHistoryEntry, OralDrugEntry},
    patient::PatientRecord,
    treatment::{ChemotherapyCycle, RadiotherapyCourse, SurgeryEvent},
    tumor::{StagingPhase, TumorStaging},
};

/// Unique identifier for one generation run.
///
/// Reported on the run summary. It is never written into a bundle, so
/// identical seeds still produce byte-identical datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// How a field was corrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    /// Signed noise added to a number, then re-clamped.
    NumericNoise,
    /// Boolean negation.
    Flip,
    /// Categorical value re-drawn from the full enumeration.
    Redraw,
    /// Date shifted by a signed offset.
    DateShift,
    /// Set entry dropped.
    EntryRemoved,
    /// Unrelated set entry inserted.
    EntryAdded,
    /// Set entry replaced by an independently drawn one.
    EntryMutated,
}

/// One corruption applied by the perturbation engine.
///
/// `before` and `after` are the JSON renderings of the field value. They may
/// be equal when a re-draw lands on the original value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    pub field: String,
    pub kind: DefectKind,
    pub before: Value,
    pub after: Value,
}

/// Everything generated for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientBundle {
    pub patient: PatientRecord,
    pub stagings: Vec<TumorStaging>,
    pub chemotherapy: Vec<ChemotherapyCycle>,
    pub surgeries: Vec<SurgeryEvent>,
    pub radiotherapy: RadiotherapyCourse,
    pub comorbidities: Vec<ComorbidityEntry>,
    pub oral_drugs: Vec<OralDrugEntry>,
    pub family_history: Vec<FamilyHistoryEntry>,
    /// Every corruption applied to this patient. Empty at probability 0.
    pub defects: Vec<Defect>,
}

impl PatientBundle {
    pub fn patient_id(&self) -> u64 {
        self.patient.patient_id
    }

    /// The staging recorded at diagnosis.
    pub fn diagnosis_staging(&self) -> Option<&TumorStaging> {
        self.staging(StagingPhase::Diagnosis)
    }

    /// The staging recorded after neoadjuvant treatment, if any.
    pub fn post_neoadjuvant_staging(&self) -> Option<&TumorStaging> {
        self.staging(StagingPhase::PostNeoadjuvant)
    }

    fn staging(&self, phase: StagingPhase) -> Option<&TumorStaging> {
        self.stagings.iter().find(|s| s.phase == phase)
    }

    /// True when the perturbation engine corrupted at least one field.
    pub fn is_corrupted(&self) -> bool {
        !self.defects.is_empty()
    }
}
