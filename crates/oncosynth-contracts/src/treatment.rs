//! Treatment events: chemotherapy cycles, surgeries, radiotherapy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Whether a chemotherapy cycle was given before or after surgery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChemoPhase {
    Neoadjuvant,
    Adjuvant,
}

/// One chemotherapy cycle.
///
/// `cycle_number` continues across the neoadjuvant and adjuvant phases; the
/// adjuvant phase does not restart at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChemotherapyCycle {
    pub patient_id: u64,
    /// Regimen (schema) identifier from the source treatment catalog.
    pub regimen: u32,
    pub date: NaiveDate,
    pub cycle_number: u32,
    pub phase: ChemoPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurgeryKind {
    Mastectomy,
    PartialMastectomy,
    SentinelLymphNodeBiopsy,
    Lymphadenectomy,
}

/// One surgical procedure. Procedures of the same intervention share a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurgeryEvent {
    pub patient_id: u64,
    pub procedure: SurgeryKind,
    pub date: NaiveDate,
}

/// The radiotherapy course. Every patient receives exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiotherapyCourse {
    pub patient_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dose_gy: f64,
}
