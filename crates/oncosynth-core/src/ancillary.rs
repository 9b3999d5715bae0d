//! Comorbidities, oral drugs and family history.
//!
//! These lists hang off the patient record and are drawn after the clinical
//! timeline, from the same random stream.

use rand::Rng;

use oncosynth_catalog::{
    model::{ComorbidityModel, FamilyHistoryModel, OralDrugModel},
    SmokingStatus,
};
use oncosynth_contracts::ancillary::{ComorbidityEntry, FamilyHistoryEntry, OralDrugEntry};

use crate::{
    context::EntryIdAllocator,
    perturb::{Flip, Perturber},
    sampler::{chance, pick, sample},
};

/// One entry per catalog condition, in catalog order.
///
/// The smoking-history condition expands into a `smoker` and an `ex-smoker`
/// entry. Uncorrupted, at most one of the two is present.
pub fn comorbidities<R: Rng + ?Sized>(
    rng: &mut R,
    model: &ComorbidityModel,
    perturber: &mut Perturber,
    ids: &mut EntryIdAllocator,
    patient_id: u64,
) -> Vec<ComorbidityEntry> {
    let mut entries = Vec::with_capacity(model.conditions.len() + 1);
    let mut push = |rng: &mut R, perturber: &mut Perturber, condition: &str, present: bool| {
        let field = format!("comorbidity.{condition}");
        let present = perturber.perturb(rng, &field, present, &Flip);
        entries.push(ComorbidityEntry {
            id: ids.next_id(),
            patient_id,
            condition: condition.to_string(),
            present,
        });
    };

    for condition in &model.conditions {
        if !condition.smoking_history {
            let present = chance(rng, condition.probability);
            push(rng, perturber, &condition.name, present);
            continue;
        }

        let status = if chance(rng, condition.probability) {
            Some(*sample(rng, model.smoking_status.weights()))
        } else {
            None
        };
        for kind in SmokingStatus::ALL {
            push(rng, perturber, kind.label(), status == Some(kind));
        }
    }
    entries
}

/// Oral drugs, drawn only for hormone-receptor-positive patients.
pub fn oral_drugs<R: Rng + ?Sized>(
    rng: &mut R,
    model: &OralDrugModel,
    perturber: &mut Perturber,
    patient_id: u64,
    hormone_receptor_positive: bool,
) -> Vec<OralDrugEntry> {
    let mut drugs: Vec<OralDrugEntry> = Vec::new();
    if hormone_receptor_positive {
        for drug in &model.drugs {
            if chance(rng, drug.probability) {
                drugs.push(OralDrugEntry {
                    patient_id,
                    drug: drug.name.clone(),
                });
            }
        }
    }

    let thin = match drugs.len() {
        2 => chance(rng, model.pair_thinning_probability),
        n if n > 2 => chance(rng, model.list_thinning_probability),
        _ => false,
    };
    if thin {
        let index = rng.gen_range(0..drugs.len());
        drugs.remove(index);
    }

    let names = model.names();
    perturber.perturb_set(rng, "oral_drugs", drugs, |rng: &mut R| OralDrugEntry {
        patient_id,
        drug: pick(rng, &names).to_string(),
    })
}

/// Cancers among relatives, keyed by CUI.
pub fn family_history<R: Rng + ?Sized>(
    rng: &mut R,
    model: &FamilyHistoryModel,
    perturber: &mut Perturber,
    patient_id: u64,
) -> Vec<FamilyHistoryEntry> {
    let mut entries = Vec::new();
    for cancer in &model.cancers {
        if chance(rng, cancer.probability) {
            entries.push(FamilyHistoryEntry {
                patient_id,
                cancer_cui: cancer.name.clone(),
            });
        }
    }

    let cuis = model.cuis();
    perturber.perturb_set(rng, "family_history", entries, |rng: &mut R| {
        FamilyHistoryEntry {
            patient_id,
            cancer_cui: pick(rng, &cuis).to_string(),
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use oncosynth_catalog::Catalog;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(11)
    }

    #[test]
    fn test_comorbidities_follow_catalog_order() {
        let catalog = Catalog::builtin().unwrap();
        let mut rng = rng();
        let mut perturber = Perturber::new(0.0).unwrap();
        let mut ids = EntryIdAllocator::new();

        let entries = comorbidities(&mut rng, &catalog.comorbidities, &mut perturber, &mut ids, 1);

        let mut expected = Vec::new();
        for condition in &catalog.comorbidities.conditions {
            if condition.smoking_history {
                expected.push("smoker".to_string());
                expected.push("ex-smoker".to_string());
            } else {
                expected.push(condition.name.clone());
            }
        }
        let names: Vec<String> = entries.iter().map(|e| e.condition.clone()).collect();
        assert_eq!(names, expected);

        let ids_seen: Vec<u64> = entries.iter().map(|e| e.id).collect();
        let expected_ids: Vec<u64> = (1..=entries.len() as u64).collect();
        assert_eq!(ids_seen, expected_ids, "ids must be consecutive from 1");
        assert_eq!(ids.peek(), entries.len() as u64 + 1);
    }

    #[test]
    fn test_smoking_entries_are_exclusive_when_clean() {
        let catalog = Catalog::builtin().unwrap();
        let mut rng = rng();
        let mut ids = EntryIdAllocator::new();
        let mut smokers = 0;
        for patient_id in 1..=2_000 {
            let mut perturber = Perturber::new(0.0).unwrap();
            let entries = comorbidities(
                &mut rng,
                &catalog.comorbidities,
                &mut perturber,
                &mut ids,
                patient_id,
            );
            let present = |name: &str| {
                entries
                    .iter()
                    .find(|e| e.condition == name)
                    .map(|e| e.present)
                    .unwrap()
            };
            assert!(!(present("smoker") && present("ex-smoker")));
            if present("smoker") || present("ex-smoker") {
                smokers += 1;
            }
        }
        let rate = smokers as f64 / 2_000.0;
        assert!((rate - 0.3631).abs() < 0.04, "smoking history rate {rate}");
    }

    #[test]
    fn test_hormone_negative_patients_take_no_oral_drugs() {
        let catalog = Catalog::builtin().unwrap();
        let mut rng = rng();
        for patient_id in 1..=500 {
            let mut perturber = Perturber::new(0.0).unwrap();
            let drugs = oral_drugs(&mut rng, &catalog.oral_drugs, &mut perturber, patient_id, false);
            assert!(drugs.is_empty());
        }
    }

    #[test]
    fn test_clean_drug_lists_are_thinned() {
        let catalog = Catalog::builtin().unwrap();
        let mut model = catalog.oral_drugs.clone();
        assert!(model.drugs.len() > 2);
        for drug in &mut model.drugs {
            drug.probability = 1.0;
        }
        model.pair_thinning_probability = 1.0;
        model.list_thinning_probability = 1.0;
        let mut rng = rng();

        for patient_id in 1..=50 {
            let mut perturber = Perturber::new(0.0).unwrap();
            let drugs = oral_drugs(&mut rng, &model, &mut perturber, patient_id, true);
            assert_eq!(drugs.len(), model.drugs.len() - 1);
            assert!(perturber.defects().is_empty(), "thinning is not a defect");
        }

        let mut pair = model.clone();
        pair.drugs.truncate(2);
        let mut perturber = Perturber::new(0.0).unwrap();
        let drugs = oral_drugs(&mut rng, &pair, &mut perturber, 1, true);
        assert_eq!(drugs.len(), 1);

        model.list_thinning_probability = 0.0;
        let mut perturber = Perturber::new(0.0).unwrap();
        let drugs = oral_drugs(&mut rng, &model, &mut perturber, 1, true);
        assert_eq!(drugs.len(), model.drugs.len());
    }

    #[test]
    fn test_oral_drugs_are_unique_under_corruption() {
        let catalog = Catalog::builtin().unwrap();
        let names = catalog.oral_drugs.names();
        let mut rng = rng();
        for patient_id in 1..=500 {
            let mut perturber = Perturber::new(0.5).unwrap();
            let drugs = oral_drugs(&mut rng, &catalog.oral_drugs, &mut perturber, patient_id, true);
            let unique: HashSet<&str> = drugs.iter().map(|d| d.drug.as_str()).collect();
            assert_eq!(unique.len(), drugs.len(), "duplicate drugs: {drugs:?}");
            assert!(drugs.iter().all(|d| names.contains(&d.drug.as_str())));
            assert!(drugs.iter().all(|d| d.patient_id == patient_id));
        }
    }

    #[test]
    fn test_family_history_uses_catalog_cuis() {
        let catalog = Catalog::builtin().unwrap();
        let cuis = catalog.family_history.cuis();
        let mut rng = rng();
        for patient_id in 1..=500 {
            let mut perturber = Perturber::new(0.3).unwrap();
            let family =
                family_history(&mut rng, &catalog.family_history, &mut perturber, patient_id);
            assert!(family.iter().all(|f| cuis.contains(&f.cancer_cui.as_str())));
            let unique: HashSet<&str> = family.iter().map(|f| f.cancer_cui.as_str()).collect();
            assert_eq!(unique.len(), family.len());
        }
    }
}
