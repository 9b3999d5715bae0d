//! Catalog schema.
//!
//! A `Catalog` is deserialized from TOML and groups the distribution
//! parameters by the part of the clinical timeline that consumes them. See
//! `catalog/breast_cancer.toml` for the embedded default.

use serde::{Deserialize, Serialize};

use oncosynth_contracts::{
    treatment::SurgeryKind,
    tumor::{Grade, HistologicalType, Stage, Subtype},
};

use crate::table::{
    Bounds, Condition, Gaussian, IntRange, Prevalence, SmokingStatus, SubtypeMap, WeightedTable,
};

/// The complete distribution catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub diagnosis: DiagnosisModel,
    pub survival: SurvivalModel,
    pub gynecology: GynecologyModel,
    pub obstetrics: ObstetricsModel,
    pub markers: MarkerModel,
    pub staging: StagingModel,
    pub chemotherapy: ChemotherapyModel,
    pub surgery: SurgeryModel,
    pub radiotherapy: RadiotherapyModel,
    pub comorbidities: ComorbidityModel,
    pub oral_drugs: OralDrugModel,
    pub family_history: FamilyHistoryModel,
}

/// Age at diagnosis and molecular subtype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisModel {
    pub age: Gaussian,
    pub age_floor: i64,
    /// Uniform day offset applied when placing birth and diagnosis dates.
    pub day_jitter: IntRange,
    pub subtype: WeightedTable<Subtype>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalModel {
    pub death_probability: SubtypeMap<f64>,
    pub mean_days_alive: SubtypeMap<f64>,
    /// Survival standard deviation is `mean_days_alive / days_alive_std_divisor`.
    pub days_alive_std_divisor: f64,
    pub days_alive_floor: i64,
    pub follow_up_jitter_days: IntRange,
    pub follow_up_days: Gaussian,
    pub follow_up_floor: i64,
}

/// Menarche and menopause.
///
/// Menopause draws at or above `early_menopause_threshold` are shifted down
/// by `early_menopause_shift` with `early_menopause_probability`; draws that
/// escape that shift and still reach `late_menopause_threshold` are shifted
/// down by `late_menopause_shift`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GynecologyModel {
    pub menarche_age: Gaussian,
    pub menopause_age: Gaussian,
    pub early_menopause_threshold: i64,
    pub early_menopause_probability: f64,
    pub early_menopause_shift: i64,
    pub late_menopause_threshold: i64,
    pub late_menopause_shift: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstetricsModel {
    pub pregnancies: Gaussian,
    pub abortions: WeightedTable<i64>,
    pub caesareans: WeightedTable<i64>,
}

/// Immunohistochemistry: receptor markers, Ki-67, grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerModel {
    /// Chance that a double hormone-receptor-positive tumor loses one of the two.
    pub single_receptor_loss_probability: f64,
    pub ki67_mean: SubtypeMap<f64>,
    pub ki67_std_divisor: f64,
    /// Chance of a one-step grade shift for PN (down) and NN (up) tumors.
    pub grade_shift_probability: f64,
    pub grade: WeightedTable<Grade>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingModel {
    pub at_diagnosis: WeightedTable<Stage>,
    /// One row per diagnosis stage, validated at load.
    pub after_neoadjuvant: Vec<ConditionalStageTable>,
    pub histological_type: WeightedTable<HistologicalType>,
    pub associated_in_situ: WeightedTable<bool>,
}

impl StagingModel {
    /// The post-neoadjuvant stage distribution for a diagnosis stage.
    pub fn after_neoadjuvant(&self, from: Stage) -> Option<&WeightedTable<Stage>> {
        self.after_neoadjuvant
            .iter()
            .find(|row| row.from == from)
            .map(|row| &row.to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalStageTable {
    pub from: Stage,
    pub to: WeightedTable<Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemotherapyModel {
    pub cycle_interval_days: i64,
    pub neoadjuvant: ChemoPhaseModel,
    pub adjuvant: ChemoPhaseModel,
    pub regimens: RegimenModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemoPhaseModel {
    pub cycles: IntRange,
    pub start_offset_days: IntRange,
}

/// Regimen (schema) identifiers by clinical situation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimenModel {
    pub her2_negative: Vec<u32>,
    pub early_stage: Vec<u32>,
    /// Adjuvant regimen for stage IV.
    pub metastatic_adjuvant: Vec<u32>,
    pub standard: Vec<u32>,
    pub corrupted_neoadjuvant: Vec<u32>,
    pub corrupted_adjuvant: Vec<u32>,
}

impl RegimenModel {
    pub(crate) fn lists(&self) -> [(&'static str, &[u32]); 6] {
        [
            ("her2_negative", self.her2_negative.as_slice()),
            ("early_stage", self.early_stage.as_slice()),
            ("metastatic_adjuvant", self.metastatic_adjuvant.as_slice()),
            ("standard", self.standard.as_slice()),
            ("corrupted_neoadjuvant", self.corrupted_neoadjuvant.as_slice()),
            ("corrupted_adjuvant", self.corrupted_adjuvant.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeryModel {
    pub probability: f64,
    pub offset_days: IntRange,
    pub sentinel_node_biopsy_probability: f64,
    pub procedure: WeightedTable<SurgeryKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiotherapyModel {
    pub start_offset_days: IntRange,
    pub duration_days: Gaussian,
    pub duration_bounds: Bounds,
    pub dose_gy: Gaussian,
    pub dose_bounds: Bounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComorbidityModel {
    /// Emitted in this order; exactly one row carries `smoking_history`.
    pub conditions: Vec<Condition>,
    pub smoking_status: WeightedTable<SmokingStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OralDrugModel {
    /// Chance of dropping one drug when exactly two were drawn.
    pub pair_thinning_probability: f64,
    /// Chance of dropping one drug when more than two were drawn.
    pub list_thinning_probability: f64,
    pub drugs: Vec<Prevalence>,
}

impl OralDrugModel {
    pub fn names(&self) -> Vec<&str> {
        self.drugs.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Relatives' cancers, keyed by UMLS concept identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyHistoryModel {
    pub cancers: Vec<Prevalence>,
}

impl FamilyHistoryModel {
    pub fn cuis(&self) -> Vec<&str> {
        self.cancers.iter().map(|c| c.name.as_str()).collect()
    }
}
