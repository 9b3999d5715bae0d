//! Tumor classification types: stage, molecular subtype, TNM, grade.
//!
//! Every enumeration here is closed. Serialized labels match the clinical
//! notation used in the source registry (`"IIA"`, `"IS"`, `"MI"`, ...), so a
//! persistence collaborator can write them verbatim.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SynthError;

/// Clinical stage label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "0")]
    S0,
    IA,
    IB,
    IIA,
    IIB,
    IIIA,
    IIIB,
    IIIC,
    IV,
}

impl Stage {
    /// Every stage in table order.
    pub const ALL: [Stage; 9] = [
        Stage::S0,
        Stage::IA,
        Stage::IB,
        Stage::IIA,
        Stage::IIB,
        Stage::IIIA,
        Stage::IIIB,
        Stage::IIIC,
        Stage::IV,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::S0 => "0",
            Stage::IA => "IA",
            Stage::IB => "IB",
            Stage::IIA => "IIA",
            Stage::IIB => "IIB",
            Stage::IIIA => "IIIA",
            Stage::IIIB => "IIIB",
            Stage::IIIC => "IIIC",
            Stage::IV => "IV",
        }
    }

    /// Stage IA or IB.
    pub fn is_early(self) -> bool {
        matches!(self, Stage::IA | Stage::IB)
    }

    /// Labels beginning with `"II"`: the stage II and stage III groups.
    ///
    /// Drives neoadjuvant eligibility and lymphadenectomy.
    pub fn is_ii_family(self) -> bool {
        self.label().starts_with("II")
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.label() == s)
            .ok_or_else(|| SynthError::UnknownStage {
                label: s.to_string(),
            })
    }
}

/// Receptor-status subtype: first letter hormone receptor (ER/PR), second
/// letter HER2. `P` = positive, `N` = negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subtype {
    PP,
    PN,
    NP,
    NN,
}

impl Subtype {
    pub const ALL: [Subtype; 4] = [Subtype::PP, Subtype::PN, Subtype::NP, Subtype::NN];

    pub fn hormone_receptor_positive(self) -> bool {
        matches!(self, Subtype::PP | Subtype::PN)
    }

    pub fn her2_positive(self) -> bool {
        matches!(self, Subtype::PP | Subtype::NP)
    }
}

/// Primary tumor extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TCategory {
    #[serde(rename = "0")]
    T0,
    #[serde(rename = "1")]
    T1,
    #[serde(rename = "2")]
    T2,
    #[serde(rename = "3")]
    T3,
    #[serde(rename = "4")]
    T4,
    #[serde(rename = "IS")]
    Tis,
}

impl TCategory {
    pub const ALL: [TCategory; 6] = [
        TCategory::T0,
        TCategory::T1,
        TCategory::T2,
        TCategory::T3,
        TCategory::T4,
        TCategory::Tis,
    ];
}

/// Regional lymph node involvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NCategory {
    #[serde(rename = "0")]
    N0,
    #[serde(rename = "1")]
    N1,
    #[serde(rename = "2")]
    N2,
    #[serde(rename = "3")]
    N3,
}

impl NCategory {
    pub const ALL: [NCategory; 4] = [NCategory::N0, NCategory::N1, NCategory::N2, NCategory::N3];
}

/// Distant metastasis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MCategory {
    #[serde(rename = "0")]
    M0,
    #[serde(rename = "1")]
    M1,
}

impl MCategory {
    pub const ALL: [MCategory; 2] = [MCategory::M0, MCategory::M1];
}

/// Nodal micro-invasion marker (N subcategory `mi`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MicroInvasion {
    #[serde(rename = "MI")]
    Mi,
}

/// The resolved TNM tuple for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tnm {
    pub t: TCategory,
    pub n: NCategory,
    pub micro_invasion: Option<MicroInvasion>,
    pub m: MCategory,
}

/// Histologic grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "1")]
    G1,
    #[serde(rename = "2")]
    G2,
    #[serde(rename = "3")]
    G3,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::G1, Grade::G2, Grade::G3];

    /// One step toward grade 1, saturating.
    pub fn lower(self) -> Self {
        match self {
            Grade::G3 => Grade::G2,
            _ => Grade::G1,
        }
    }

    /// One step toward grade 3, saturating.
    pub fn higher(self) -> Self {
        match self {
            Grade::G1 => Grade::G2,
            _ => Grade::G3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistologicalType {
    Ductal,
    Lobular,
    Other,
}

impl HistologicalType {
    pub const ALL: [HistologicalType; 3] = [
        HistologicalType::Ductal,
        HistologicalType::Lobular,
        HistologicalType::Other,
    ];
}

/// Whether a TNM assessment was clinical (`C`) or pathological (`P`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssessmentPrefix {
    #[serde(rename = "C")]
    Clinical,
    #[serde(rename = "P")]
    Pathological,
}

/// Which point of the care pathway a staging describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingPhase {
    Diagnosis,
    PostNeoadjuvant,
}

/// One tumor staging of a patient.
///
/// Every patient has a `Diagnosis` staging; a `PostNeoadjuvant` staging is
/// present only when the record's neoadjuvant flag is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TumorStaging {
    pub patient_id: u64,
    pub phase: StagingPhase,
    pub stage: Stage,
    pub tnm: Tnm,
    pub prefix: AssessmentPrefix,
    pub histological_type: HistologicalType,
    pub grade: Grade,
    pub associated_in_situ: bool,
    pub invasive: bool,
}
