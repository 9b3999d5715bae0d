//! # oncosynth-contracts
//!
//! Shared record types, defect log, and error contracts for the oncosynth
//! synthetic breast-cancer record generator.
//!
//! All crates in the workspace import from here. No generation logic lives in
//! this crate, only data definitions and error types. The field names and
//! serialized labels of [`bundle::PatientBundle`] are the interface contract
//! with persistence collaborators.

pub mod ancillary;
pub mod bundle;
pub mod error;
pub mod patient;
pub mod treatment;
pub mod tumor;
pub mod verify;

#[cfg(test)]
mod tests {
    use super::*;
    use bundle::{DefectKind, RunId};
    use error::SynthError;
    use tumor::{Grade, MicroInvasion, Stage, Subtype, TCategory};

    // ── Stage labels ─────────────────────────────────────────────────────────

    #[test]
    fn stage_parses_every_label() {
        for stage in Stage::ALL {
            let parsed: Stage = stage.label().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn stage_rejects_unknown_label() {
        let err = "IIID".parse::<Stage>().unwrap_err();
        match err {
            SynthError::UnknownStage { label } => assert_eq!(label, "IIID"),
            other => panic!("expected UnknownStage, got {:?}", other),
        }
    }

    #[test]
    fn stage_serializes_with_clinical_label() {
        assert_eq!(serde_json::to_string(&Stage::S0).unwrap(), "\"0\"");
        assert_eq!(serde_json::to_string(&Stage::IIIC).unwrap(), "\"IIIC\"");

        let decoded: Stage = serde_json::from_str("\"IIB\"").unwrap();
        assert_eq!(decoded, Stage::IIB);
    }

    #[test]
    fn ii_family_covers_stage_two_and_three() {
        let family: Vec<Stage> = Stage::ALL.into_iter().filter(|s| s.is_ii_family()).collect();
        assert_eq!(
            family,
            vec![Stage::IIA, Stage::IIB, Stage::IIIA, Stage::IIIB, Stage::IIIC]
        );
    }

    // ── Subtype markers ──────────────────────────────────────────────────────

    #[test]
    fn subtype_markers_follow_letters() {
        assert!(Subtype::PP.hormone_receptor_positive() && Subtype::PP.her2_positive());
        assert!(Subtype::PN.hormone_receptor_positive() && !Subtype::PN.her2_positive());
        assert!(!Subtype::NP.hormone_receptor_positive() && Subtype::NP.her2_positive());
        assert!(!Subtype::NN.hormone_receptor_positive() && !Subtype::NN.her2_positive());
    }

    // ── TNM labels ───────────────────────────────────────────────────────────

    #[test]
    fn tnm_labels_match_registry_notation() {
        assert_eq!(serde_json::to_string(&TCategory::Tis).unwrap(), "\"IS\"");
        assert_eq!(serde_json::to_string(&TCategory::T3).unwrap(), "\"3\"");
        assert_eq!(serde_json::to_string(&MicroInvasion::Mi).unwrap(), "\"MI\"");
    }

    // ── Grade shifts ─────────────────────────────────────────────────────────

    #[test]
    fn grade_shifts_saturate() {
        assert_eq!(Grade::G1.lower(), Grade::G1);
        assert_eq!(Grade::G2.lower(), Grade::G1);
        assert_eq!(Grade::G3.higher(), Grade::G3);
        assert_eq!(Grade::G1.higher(), Grade::G2);
    }

    // ── RunId ────────────────────────────────────────────────────────────────

    #[test]
    fn run_id_new_produces_unique_values() {
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| RunId::new().0.to_string()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn defect_kind_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&DefectKind::EntryMutated).unwrap(),
            "\"entry_mutated\""
        );
    }

    // ── SynthError display messages ──────────────────────────────────────────

    #[test]
    fn error_catalog_display() {
        let err = SynthError::Catalog {
            reason: "negative weight".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("catalog error"));
        assert!(msg.contains("negative weight"));
    }

    #[test]
    fn error_invalid_probability_display() {
        let msg = SynthError::InvalidProbability { value: 1.5 }.to_string();
        assert!(msg.contains("1.5"));
        assert!(msg.contains("[0, 1]"));
    }

    #[test]
    fn error_invalid_patient_id_display() {
        let msg = SynthError::InvalidPatientId { id: 0 }.to_string();
        assert!(msg.contains("start at 1"));
    }

    #[test]
    fn error_sink_write_failed_display() {
        let err = SynthError::SinkWriteFailed {
            reason: "disk full".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sink write failed"));
        assert!(msg.contains("disk full"));
    }
}
