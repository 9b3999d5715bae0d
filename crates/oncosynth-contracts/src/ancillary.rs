//! Comorbidity, oral drug, and family history entries.

use serde::{Deserialize, Serialize};

/// One comorbidity flag.
///
/// Every patient carries one entry per catalog condition, present or not.
/// `id` comes from the run's `EntryIdAllocator` and is unique across the
/// whole dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComorbidityEntry {
    pub id: u64,
    pub patient_id: u64,
    pub condition: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OralDrugEntry {
    pub patient_id: u64,
    pub drug: String,
}

/// A cancer diagnosed in a relative, as a UMLS concept identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FamilyHistoryEntry {
    pub patient_id: u64,
    pub cancer_cui: String,
}
