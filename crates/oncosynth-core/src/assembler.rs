//! Record assembly and dataset runs.
//!
//! `Synthesizer` turns (catalog, context, patient id, p) into one
//! `PatientBundle`. `Assembler` drives a whole dataset run:
//!
//!   Generate → [Verify] → Sink::write → ... → Sink::finalize
//!
//! Verification is advisory. A bundle that fails its consistency schema is
//! still written, because corrupted bundles are expected to fail; the run
//! summary lists every failing report.

use tracing::{debug, info, warn};

use oncosynth_catalog::Catalog;
use oncosynth_contracts::{
    bundle::{PatientBundle, RunId},
    error::{SynthError, SynthResult},
    verify::{ConsistencyReport, ConsistencySchema},
};

use crate::{
    ancillary,
    context::GenerationContext,
    perturb::{check_probability, Perturber},
    timeline::{SynthesisConfig, TimelineGenerator},
    traits::{BundleVerifier, RecordSink},
};

// ── Synthesizer ───────────────────────────────────────────────────────────────

/// Generates patient bundles from a catalog.
///
/// Holds no mutable state; everything that changes between patients lives
/// in the `GenerationContext` passed to each call.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    catalog: Catalog,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(catalog: Catalog, config: SynthesisConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Generate the bundle of `patient_id` with corruption probability
    /// `probability`.
    ///
    /// # Errors
    ///
    /// - `SynthError::InvalidPatientId` when `patient_id` is 0
    /// - `SynthError::InvalidProbability` when `probability` is outside `[0, 1]`
    /// - `SynthError::Derivation` when date arithmetic leaves the calendar
    pub fn generate(
        &self,
        ctx: &mut GenerationContext,
        patient_id: u64,
        probability: f64,
    ) -> SynthResult<PatientBundle> {
        if patient_id == 0 {
            return Err(SynthError::InvalidPatientId { id: patient_id });
        }
        let mut perturber = Perturber::new(probability)?;

        let timeline = TimelineGenerator::new(&self.catalog, &self.config).generate(
            &mut ctx.rng,
            &mut perturber,
            patient_id,
        )?;

        let comorbidities = ancillary::comorbidities(
            &mut ctx.rng,
            &self.catalog.comorbidities,
            &mut perturber,
            &mut ctx.ids,
            patient_id,
        );
        let hormone_receptor_positive =
            timeline.patient.er_positive || timeline.patient.pr_positive;
        let oral_drugs = ancillary::oral_drugs(
            &mut ctx.rng,
            &self.catalog.oral_drugs,
            &mut perturber,
            patient_id,
            hormone_receptor_positive,
        );
        let family_history = ancillary::family_history(
            &mut ctx.rng,
            &self.catalog.family_history,
            &mut perturber,
            patient_id,
        );

        let defects = perturber.into_defects();
        debug!(
            patient_id,
            subtype = ?timeline.patient.molecular_subtype,
            defects = defects.len(),
            "patient generated"
        );

        Ok(PatientBundle {
            patient: timeline.patient,
            stagings: timeline.stagings,
            chemotherapy: timeline.chemotherapy,
            surgeries: timeline.surgeries,
            radiotherapy: timeline.radiotherapy,
            comorbidities,
            oral_drugs,
            family_history,
            defects,
        })
    }

    /// Patients `1..=count`, generated lazily in id order.
    pub fn cohort<'a>(
        &'a self,
        ctx: &'a mut GenerationContext,
        count: u64,
        probability: f64,
    ) -> Cohort<'a> {
        Cohort {
            synthesizer: self,
            ctx,
            next_id: 1,
            last_id: count,
            probability,
        }
    }
}

/// Iterator over a cohort of generated bundles.
pub struct Cohort<'a> {
    synthesizer: &'a Synthesizer,
    ctx: &'a mut GenerationContext,
    next_id: u64,
    last_id: u64,
    probability: f64,
}

impl Iterator for Cohort<'_> {
    type Item = SynthResult<PatientBundle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_id > self.last_id {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        Some(self.synthesizer.generate(self.ctx, id, self.probability))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.last_id.saturating_add(1).saturating_sub(self.next_id) as usize;
        (remaining, Some(remaining))
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────────

/// Outcome of one dataset run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub dataset_id: String,
    /// Fresh per run, even when the seed repeats.
    pub run_id: RunId,
    pub patients: u64,
    pub defects: u64,
    /// Patients with at least one defect.
    pub corrupted_patients: u64,
    /// Failing consistency reports, in patient order.
    pub inconsistent: Vec<ConsistencyReport>,
}

impl RunSummary {
    fn new(dataset_id: &str) -> Self {
        Self {
            dataset_id: dataset_id.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, bundle: &PatientBundle) {
        self.patients += 1;
        self.defects += bundle.defects.len() as u64;
        if bundle.is_corrupted() {
            self.corrupted_patients += 1;
        }
    }
}

/// Drives a dataset run: generates every patient, optionally checks it, and
/// hands it to the sink.
pub struct Assembler {
    synthesizer: Synthesizer,
    sink: Box<dyn RecordSink>,
    verifier: Option<(Box<dyn BundleVerifier>, ConsistencySchema)>,
}

impl Assembler {
    pub fn new(synthesizer: Synthesizer, sink: Box<dyn RecordSink>) -> Self {
        Self {
            synthesizer,
            sink,
            verifier: None,
        }
    }

    /// Check every bundle against `schema` before it is written.
    pub fn with_verifier(
        mut self,
        verifier: Box<dyn BundleVerifier>,
        schema: ConsistencySchema,
    ) -> Self {
        self.verifier = Some((verifier, schema));
        self
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    /// Generate `count` patients into the sink and finalize it under
    /// `dataset_id`.
    ///
    /// # Errors
    ///
    /// Returns `Err` for an invalid probability (before anything is written),
    /// generation failures, verifier errors, and sink failures. A failing
    /// consistency report is not an error.
    pub fn run(
        &self,
        ctx: &mut GenerationContext,
        count: u64,
        probability: f64,
        dataset_id: &str,
    ) -> SynthResult<RunSummary> {
        check_probability(probability)?;
        let mut summary = RunSummary::new(dataset_id);
        info!(
            dataset_id,
            run_id = %summary.run_id.0,
            count,
            probability,
            "dataset run starting"
        );

        for bundle in self.synthesizer.cohort(ctx, count, probability) {
            let bundle = bundle?;

            if let Some((verifier, schema)) = &self.verifier {
                let report = verifier.verify(&bundle, schema)?;
                if !report.passed {
                    let failures = report
                        .failures
                        .iter()
                        .map(|f| format!("[{}] {}", f.rule_id, f.message))
                        .collect::<Vec<_>>()
                        .join("; ");
                    warn!(
                        dataset_id,
                        patient_id = bundle.patient_id(),
                        defects = bundle.defects.len(),
                        failures = %failures,
                        "bundle failed consistency check"
                    );
                    summary.inconsistent.push(report);
                }
            }

            self.sink.write(&bundle)?;
            summary.record(&bundle);
        }

        self.sink.finalize(dataset_id)?;
        info!(
            dataset_id,
            patients = summary.patients,
            defects = summary.defects,
            inconsistent = summary.inconsistent.len(),
            "dataset run finalized"
        );
        Ok(summary)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
