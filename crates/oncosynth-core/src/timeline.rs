//! The clinical timeline of one patient.
//!
//! `TimelineGenerator` walks a patient from birth to outcome:
//!
//!   demographics → survival → dates → gynecology → obstetrics → markers
//!   → staging → neoadjuvant chemo → surgery → adjuvant chemo
//!   → first-treatment dates → radiotherapy → TNM prefixes → tumor corruption
//!
//! Every draw comes from the caller's random source and every corruption
//! goes through the caller's `Perturber`, so the timeline is a pure function
//! of (catalog, reference date, random stream, corruption probability).

use chrono::{Datelike, NaiveDate, TimeDelta};
use rand::Rng;
use tracing::trace;

use oncosynth_catalog::Catalog;
use oncosynth_contracts::{
    bundle::DefectKind,
    error::{SynthError, SynthResult},
    patient::{Gynecology, Obstetrics, PatientRecord},
    treatment::{ChemoPhase, ChemotherapyCycle, RadiotherapyCourse, SurgeryEvent, SurgeryKind},
    tumor::{
        AssessmentPrefix, Grade, HistologicalType, MCategory, MicroInvasion, NCategory, Stage,
        StagingPhase, Subtype, TCategory, Tnm, TumorStaging,
    },
};

use crate::{
    perturb::{DateShift, Flip, MaybeNumeric, Numeric, Offset, Perturber, Redraw},
    sampler::{chance, gaussian, normal, pick, round_half_up, sample, truncate, uniform},
    staging::resolve_tnm,
};

// ── Corruption magnitudes ─────────────────────────────────────────────────────

/// Corrupted death flags are re-drawn true one time in sixteen.
const DEATH_REDRAW: [bool; 16] = {
    let mut flags = [false; 16];
    flags[15] = true;
    flags
};

const SURVIVAL_NOISE: Numeric<i64> =
    Numeric::unbounded(Offset::Gaussian { mean: 700.0, std: 70.0 });
const EVENT_DATE_SHIFT: DateShift = DateShift(Offset::Gaussian {
    mean: 1500.0,
    std: 300.0,
});
const MENARCHE_NOISE: Numeric<i64> =
    Numeric::at_least(Offset::Gaussian { mean: 6.0, std: 2.0 }, 0);
const MENOPAUSE_NOISE: MaybeNumeric = MaybeNumeric {
    present: Offset::Gaussian { mean: 25.0, std: 4.0 },
    absent: (120.0, 10.0),
    min: 0,
};
const OBSTETRIC_NOISE: Numeric<i64> =
    Numeric::at_least(Offset::Gaussian { mean: 6.0, std: 2.0 }, 0);
const KI67_NOISE: Numeric<i64> =
    Numeric::within(Offset::Gaussian { mean: 40.0, std: 8.0 }, 0, 100);
const CYCLE_COUNT_NOISE: Numeric<i64> = Numeric::at_least(Offset::Span { low: -7, high: 8 }, 0);
const NEOADJUVANT_START_SHIFT: DateShift = DateShift(Offset::Uniform { low: 10, high: 20 });
const ADJUVANT_START_SHIFT: DateShift = DateShift(Offset::Uniform { low: 15, high: 35 });
const CYCLE_DATE_SHIFT: DateShift = DateShift(Offset::Uniform { low: 10, high: 20 });
const SURGERY_DATE_SHIFT: DateShift = DateShift(Offset::Uniform { low: 20, high: 35 });
const FIRST_TREATMENT_SHIFT: DateShift = DateShift(Offset::Uniform { low: 50, high: 500 });
const RADIOTHERAPY_DATE_SHIFT: DateShift = DateShift(Offset::Uniform { low: 20, high: 50 });
const RADIOTHERAPY_DOSE_NOISE: Numeric<f64> =
    Numeric::at_least(Offset::Uniform { low: 20, high: 50 }, 0.0);

const PREFIX_REDRAW: [AssessmentPrefix; 4] = [
    AssessmentPrefix::Clinical,
    AssessmentPrefix::Pathological,
    AssessmentPrefix::Pathological,
    AssessmentPrefix::Pathological,
];
const MICRO_INVASION_REDRAW: [Option<MicroInvasion>; 4] =
    [Some(MicroInvasion::Mi), None, None, None];
const INVASIVE_REDRAW: [bool; 4] = [true, true, true, false];
const IN_SITU_REDRAW: [bool; 2] = [false, true];

// ── Types ─────────────────────────────────────────────────────────────────────

/// Run-wide generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisConfig {
    /// The "today" of the dataset. Birth dates are placed backwards from it
    /// and current ages are measured against it.
    pub reference_date: NaiveDate,
}

/// Everything the timeline produces for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalTimeline {
    pub patient: PatientRecord,
    pub stagings: Vec<TumorStaging>,
    pub chemotherapy: Vec<ChemotherapyCycle>,
    pub surgeries: Vec<SurgeryEvent>,
    pub radiotherapy: RadiotherapyCourse,
}

/// The tumor description of one staging phase, before assembly.
struct StagingDraft {
    stage: Stage,
    tnm: Tnm,
    prefix: AssessmentPrefix,
}

pub struct TimelineGenerator<'a> {
    catalog: &'a Catalog,
    config: &'a SynthesisConfig,
}

impl<'a> TimelineGenerator<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a SynthesisConfig) -> Self {
        Self { catalog, config }
    }

    /// Generate the clinical timeline of `patient_id`.
    ///
    /// # Errors
    ///
    /// Returns `SynthError::Derivation` if calendar arithmetic leaves the
    /// representable date range, and `SynthError::Catalog` if the catalog
    /// lacks a post-neoadjuvant row for the drawn stage.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        perturber: &mut Perturber,
        patient_id: u64,
    ) -> SynthResult<ClinicalTimeline> {
        let c = self.catalog;

        // ── Step 1: age at diagnosis and subtype ─────────────────────────────
        let age_at_diagnosis = truncate(normal(rng, &c.diagnosis.age)).max(c.diagnosis.age_floor);
        let subtype = *sample(rng, c.diagnosis.subtype.weights());

        // ── Step 2: survival ─────────────────────────────────────────────────
        let s = &c.survival;
        let deceased = chance(rng, *s.death_probability.get(subtype));
        let deceased = perturber.perturb(rng, "deceased", deceased, &Redraw(&DEATH_REDRAW));

        let mean_alive = *s.mean_days_alive.get(subtype);
        let days_alive = truncate(gaussian(
            rng,
            mean_alive,
            mean_alive / s.days_alive_std_divisor,
        ))
        .max(s.days_alive_floor);
        let days_alive = perturber.perturb(rng, "survival_days", days_alive, &SURVIVAL_NOISE);

        // ── Step 3: birth and diagnosis dates ────────────────────────────────
        let mut follow_up = uniform(rng, &s.follow_up_jitter_days)
            + truncate(normal(rng, &s.follow_up_days));
        follow_up = follow_up.max(s.follow_up_floor);
        if deceased {
            follow_up += days_alive;
        }
        let days_since_birth =
            follow_up + age_at_diagnosis * 365 + uniform(rng, &c.diagnosis.day_jitter);

        let mut birth_date = add_days(self.config.reference_date, -days_since_birth)?;
        if birth_date.month() == 2 && birth_date.day() == 29 {
            birth_date = add_days(birth_date, -5)?;
        }

        let anniversary = NaiveDate::from_ymd_opt(
            birth_date.year() + age_at_diagnosis as i32,
            birth_date.month(),
            birth_date.day(),
        )
        .ok_or_else(|| SynthError::Derivation {
            reason: format!(
                "birth date {} has no {}th anniversary",
                birth_date, age_at_diagnosis
            ),
        })?;
        let diagnosis_date = add_days(anniversary, uniform(rng, &c.diagnosis.day_jitter))?;
        let diagnosis_date =
            perturber.perturb(rng, "diagnosis_date", diagnosis_date, &EVENT_DATE_SHIFT);

        // ── Step 4: death date ───────────────────────────────────────────────
        let projected_death = add_days(diagnosis_date, days_alive)?;
        let projected_age_at_death = age_between(birth_date, projected_death);
        let (death_date, age_at_death) = if deceased {
            let date = perturber.perturb(rng, "death_date", projected_death, &EVENT_DATE_SHIFT);
            (Some(date), Some(projected_age_at_death))
        } else {
            (None, None)
        };

        // ── Step 5: gynecological history ────────────────────────────────────
        let g = &c.gynecology;
        let menarche_age = round_half_up(normal(rng, &g.menarche_age));
        let menarche_age = perturber.perturb(rng, "menarche_age", menarche_age, &MENARCHE_NOISE);

        let mut menopause = round_half_up(normal(rng, &g.menopause_age));
        if menopause >= g.early_menopause_threshold
            && chance(rng, g.early_menopause_probability)
        {
            menopause -= g.early_menopause_shift;
        } else if menopause >= g.late_menopause_threshold {
            menopause -= g.late_menopause_shift;
        }
        let menopause_before_diagnosis = menopause < age_at_diagnosis;
        let current_age = age_between(birth_date, self.config.reference_date);
        let menopause_age = (menopause <= projected_age_at_death && menopause <= current_age)
            .then_some(menopause);

        let gynecology = Gynecology {
            menarche_age,
            menopause_age: perturber.perturb(rng, "menopause_age", menopause_age, &MENOPAUSE_NOISE),
            menopause_before_diagnosis: perturber.perturb(
                rng,
                "menopause_before_diagnosis",
                menopause_before_diagnosis,
                &Flip,
            ),
        };

        // ── Step 6: obstetric history ────────────────────────────────────────
        let o = &c.obstetrics;
        let pregnancies = round_half_up(normal(rng, &o.pregnancies)).max(0);
        let (mut births, mut abortions, mut caesareans) = (0, 0, 0);
        if pregnancies > 0 {
            abortions = (*sample(rng, o.abortions.weights())).min(pregnancies);
            caesareans = (*sample(rng, o.caesareans.weights())).min(pregnancies - abortions);
            births = pregnancies - abortions - caesareans;
        }
        let pregnancies = perturber.perturb(rng, "pregnancies", pregnancies, &OBSTETRIC_NOISE);
        let births = perturber.perturb(rng, "births", births, &OBSTETRIC_NOISE);
        let abortions = perturber.perturb(rng, "abortions", abortions, &OBSTETRIC_NOISE);
        let caesareans = perturber.perturb(rng, "caesareans", caesareans, &OBSTETRIC_NOISE);
        let obstetrics = Obstetrics {
            pregnancies,
            births,
            abortions,
            caesareans,
        };

        // ── Step 7: immunohistochemistry ─────────────────────────────────────
        let m = &c.markers;
        let mut er_positive = subtype.hormone_receptor_positive();
        let mut pr_positive = er_positive;
        if er_positive && pr_positive && chance(rng, m.single_receptor_loss_probability) {
            if chance(rng, 0.5) {
                er_positive = false;
            } else {
                pr_positive = false;
            }
        }
        let her2_positive = subtype.her2_positive();

        let ki67_mean = *m.ki67_mean.get(subtype);
        let ki67 = truncate(gaussian(rng, ki67_mean, ki67_mean / m.ki67_std_divisor)).clamp(0, 100);

        let mut grade = *sample(rng, m.grade.weights());
        match subtype {
            Subtype::PN if chance(rng, m.grade_shift_probability) => grade = grade.lower(),
            Subtype::NN if chance(rng, m.grade_shift_probability) => grade = grade.higher(),
            _ => {}
        }

        let ki67 = perturber.perturb(rng, "ki67_percent", ki67, &KI67_NOISE);
        let er_positive = perturber.perturb(rng, "er_positive", er_positive, &Flip);
        let pr_positive = perturber.perturb(rng, "pr_positive", pr_positive, &Flip);

        // ── Step 8: stage, TNM, tumor descriptors ────────────────────────────
        let st = &c.staging;
        let stage_dx = *sample(rng, st.at_diagnosis.weights());
        let after_neo = st
            .after_neoadjuvant(stage_dx)
            .ok_or_else(|| SynthError::Catalog {
                reason: format!("no post-neoadjuvant row for stage {}", stage_dx),
            })?;
        let stage_neo = *sample(rng, after_neo.weights());
        let tnm_dx = resolve_tnm(rng, stage_dx);
        let tnm_neo = resolve_tnm(rng, stage_neo);

        let mut neoadjuvant =
            (stage_dx.is_early() && subtype != Subtype::PN) || stage_dx.is_ii_family();
        let mut invasive = stage_dx != Stage::S0;
        let mut histological_type = *sample(rng, st.histological_type.weights());
        let mut associated_in_situ = *sample(rng, st.associated_in_situ.weights());

        trace!(
            patient_id,
            stage = %stage_dx,
            stage_after_neoadjuvant = %stage_neo,
            neoadjuvant,
            "tumor staged"
        );

        // ── Step 9: neoadjuvant chemotherapy ─────────────────────────────────
        let mut cursor = diagnosis_date;
        let mut chemotherapy = Vec::new();
        if neoadjuvant {
            let pool = self.regimen_pool(ChemoPhase::Neoadjuvant, subtype, stage_dx);
            chemotherapy = self.chemotherapy_phase(
                rng,
                perturber,
                patient_id,
                ChemoPhase::Neoadjuvant,
                &mut cursor,
                pool,
                1,
            )?;
        }
        let neoadjuvant_cycles = chemotherapy.len() as u32;

        // ── Step 10: surgery ─────────────────────────────────────────────────
        let su = &c.surgery;
        let mut surgery_cursor = cursor;
        let mut surgeries = Vec::new();
        let gate_forced = perturber.fires(rng);
        if stage_dx == Stage::IV && gate_forced {
            perturber.record("surgery_stage_gate", DefectKind::Flip, &false, &true);
        }
        if (stage_dx != Stage::IV || gate_forced) && chance(rng, su.probability) {
            surgery_cursor = add_days(surgery_cursor, uniform(rng, &su.offset_days))?;
            surgery_cursor =
                perturber.perturb(rng, "surgery_date", surgery_cursor, &SURGERY_DATE_SHIFT);

            let mut procedures = vec![*sample(rng, su.procedure.weights())];
            if chance(rng, su.sentinel_node_biopsy_probability) {
                procedures.push(SurgeryKind::SentinelLymphNodeBiopsy);
            }
            if stage_dx.is_ii_family() {
                procedures.push(SurgeryKind::Lymphadenectomy);
            }
            surgeries = procedures
                .into_iter()
                .map(|procedure| SurgeryEvent {
                    patient_id,
                    procedure,
                    date: surgery_cursor,
                })
                .collect();
        }

        // ── Step 11: adjuvant chemotherapy ───────────────────────────────────
        cursor = surgery_cursor;
        if stage_dx != Stage::S0 {
            let pool = self.regimen_pool(ChemoPhase::Adjuvant, subtype, stage_dx);
            let adjuvant = self.chemotherapy_phase(
                rng,
                perturber,
                patient_id,
                ChemoPhase::Adjuvant,
                &mut cursor,
                pool,
                neoadjuvant_cycles + 1,
            )?;
            chemotherapy.extend(adjuvant);
        }
        let mut seen = Vec::with_capacity(chemotherapy.len());
        chemotherapy.retain(|cycle| {
            let key = (cycle.regimen, cycle.date);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });

        // ── Step 12: first-treatment dates ───────────────────────────────────
        let first_chemotherapy_date = chemotherapy.iter().map(|cycle| cycle.date).min().map(|date| {
            perturber.perturb(rng, "first_chemotherapy_date", date, &FIRST_TREATMENT_SHIFT)
        });
        let first_surgery_date = surgeries.iter().map(|event| event.date).min().map(|date| {
            perturber.perturb(rng, "first_surgery_date", date, &FIRST_TREATMENT_SHIFT)
        });
        let first_treatment_date = [first_chemotherapy_date, first_surgery_date]
            .into_iter()
            .flatten()
            .min();

        // ── Step 13: radiotherapy ────────────────────────────────────────────
        let r = &c.radiotherapy;
        let start_date = add_days(cursor, uniform(rng, &r.start_offset_days))?;
        let duration = r
            .duration_bounds
            .clamp(round_half_up(normal(rng, &r.duration_days)) as f64) as i64;
        let end_date = add_days(start_date, duration)?;
        let dose_gy = r.dose_bounds.clamp(normal(rng, &r.dose_gy) + 0.5);
        let radiotherapy = RadiotherapyCourse {
            patient_id,
            start_date: perturber.perturb(
                rng,
                "radiotherapy.start_date",
                start_date,
                &RADIOTHERAPY_DATE_SHIFT,
            ),
            end_date: perturber.perturb(
                rng,
                "radiotherapy.end_date",
                end_date,
                &RADIOTHERAPY_DATE_SHIFT,
            ),
            dose_gy: perturber.perturb(rng, "radiotherapy.dose_gy", dose_gy, &RADIOTHERAPY_DOSE_NOISE),
        };

        // ── Step 14: assessment prefixes ─────────────────────────────────────
        let operated = !surgeries.is_empty();
        let mut dx = StagingDraft {
            stage: stage_dx,
            tnm: tnm_dx,
            prefix: if !operated || neoadjuvant {
                AssessmentPrefix::Clinical
            } else {
                AssessmentPrefix::Pathological
            },
        };
        let mut neo = StagingDraft {
            stage: stage_neo,
            tnm: tnm_neo,
            prefix: if operated {
                AssessmentPrefix::Pathological
            } else {
                AssessmentPrefix::Clinical
            },
        };

        // ── Step 15: tumor corruption ────────────────────────────────────────
        if perturber.is_active() {
            dx.stage = perturber.perturb(rng, "diagnosis.stage", dx.stage, &Redraw(&Stage::ALL));
            neo.stage = perturber.perturb(
                rng,
                "post_neoadjuvant.stage",
                neo.stage,
                &Redraw(&Stage::ALL),
            );
            neoadjuvant = perturber.perturb(rng, "neoadjuvant", neoadjuvant, &Flip);
            corrupt_tnm(rng, perturber, "diagnosis", &mut dx.tnm);
            corrupt_tnm(rng, perturber, "post_neoadjuvant", &mut neo.tnm);
            invasive = perturber.perturb(rng, "invasive", invasive, &Redraw(&INVASIVE_REDRAW));
            histological_type = perturber.perturb(
                rng,
                "histological_type",
                histological_type,
                &Redraw(&HistologicalType::ALL),
            );
            associated_in_situ = perturber.perturb(
                rng,
                "associated_in_situ",
                associated_in_situ,
                &Redraw(&IN_SITU_REDRAW),
            );
            grade = perturber.perturb(rng, "grade", grade, &Redraw(&Grade::ALL));
            dx.prefix = perturber.perturb(rng, "diagnosis.prefix", dx.prefix, &Redraw(&PREFIX_REDRAW));
            neo.prefix = perturber.perturb(
                rng,
                "post_neoadjuvant.prefix",
                neo.prefix,
                &Redraw(&PREFIX_REDRAW),
            );
        }

        // ── Assembly ─────────────────────────────────────────────────────────
        let staging = |phase: StagingPhase, draft: &StagingDraft| TumorStaging {
            patient_id,
            phase,
            stage: draft.stage,
            tnm: draft.tnm,
            prefix: draft.prefix,
            histological_type,
            grade,
            associated_in_situ,
            invasive,
        };
        let mut stagings = vec![staging(StagingPhase::Diagnosis, &dx)];
        if neoadjuvant {
            stagings.push(staging(StagingPhase::PostNeoadjuvant, &neo));
        }

        let patient = PatientRecord {
            patient_id,
            birth_date,
            diagnosis_date,
            age_at_diagnosis,
            first_treatment_date,
            first_chemotherapy_date,
            first_surgery_date,
            death_date,
            age_at_death,
            molecular_subtype: subtype,
            er_positive,
            pr_positive,
            her2_positive,
            ki67_percent: ki67,
            neoadjuvant,
            gynecology,
            obstetrics,
        };

        Ok(ClinicalTimeline {
            patient,
            stagings,
            chemotherapy,
            surgeries,
            radiotherapy,
        })
    }

    /// Regimens eligible for a phase, before corruption.
    fn regimen_pool(&self, phase: ChemoPhase, subtype: Subtype, stage: Stage) -> &'a [u32] {
        let regimens = &self.catalog.chemotherapy.regimens;
        if !subtype.her2_positive() {
            regimens.her2_negative.as_slice()
        } else if stage.is_early() {
            regimens.early_stage.as_slice()
        } else if phase == ChemoPhase::Adjuvant && stage == Stage::IV {
            regimens.metastatic_adjuvant.as_slice()
        } else {
            regimens.standard.as_slice()
        }
    }

    /// Draw one chemotherapy phase starting from `cursor`.
    ///
    /// Leaves `cursor` one cycle interval past the last cycle. Cycles are
    /// numbered from `first_number`.
    #[allow(clippy::too_many_arguments)]
    fn chemotherapy_phase<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        perturber: &mut Perturber,
        patient_id: u64,
        phase: ChemoPhase,
        cursor: &mut NaiveDate,
        pool: &[u32],
        first_number: u32,
    ) -> SynthResult<Vec<ChemotherapyCycle>> {
        let ch = &self.catalog.chemotherapy;
        let regimens = &ch.regimens;
        let (label, model, start_shift, corrupted) = match phase {
            ChemoPhase::Neoadjuvant => (
                "neoadjuvant",
                &ch.neoadjuvant,
                &NEOADJUVANT_START_SHIFT,
                regimens.corrupted_neoadjuvant.as_slice(),
            ),
            ChemoPhase::Adjuvant => (
                "adjuvant",
                &ch.adjuvant,
                &ADJUVANT_START_SHIFT,
                regimens.corrupted_adjuvant.as_slice(),
            ),
        };

        let count = uniform(rng, &model.cycles);
        let count = perturber.perturb(rng, &format!("{label}.cycles"), count, &CYCLE_COUNT_NOISE);

        *cursor = add_days(*cursor, uniform(rng, &model.start_offset_days))?;
        *cursor = perturber.perturb(rng, &format!("{label}.start_date"), *cursor, start_shift);

        let regimen = *pick(rng, pool);
        let regimen =
            perturber.perturb(rng, &format!("{label}.regimen"), regimen, &Redraw(corrupted));

        let mut cycles = Vec::with_capacity(count.max(0) as usize);
        for i in 0..count.max(0) as u32 {
            cycles.push(ChemotherapyCycle {
                patient_id,
                regimen,
                date: *cursor,
                cycle_number: first_number + i,
                phase,
            });
            *cursor = add_days(*cursor, ch.cycle_interval_days)?;
            *cursor = perturber.perturb(
                rng,
                &format!("{label}.cycle_interval"),
                *cursor,
                &CYCLE_DATE_SHIFT,
            );
        }
        Ok(cycles)
    }
}

fn corrupt_tnm<R: Rng + ?Sized>(rng: &mut R, perturber: &mut Perturber, phase: &str, tnm: &mut Tnm) {
    tnm.t = perturber.perturb(rng, &format!("{phase}.t"), tnm.t, &Redraw(&TCategory::ALL));
    tnm.n = perturber.perturb(rng, &format!("{phase}.n"), tnm.n, &Redraw(&NCategory::ALL));
    tnm.micro_invasion = perturber.perturb(
        rng,
        &format!("{phase}.micro_invasion"),
        tnm.micro_invasion,
        &Redraw(&MICRO_INVASION_REDRAW),
    );
    tnm.m = perturber.perturb(rng, &format!("{phase}.m"), tnm.m, &Redraw(&MCategory::ALL));
}

fn add_days(date: NaiveDate, days: i64) -> SynthResult<NaiveDate> {
    date.checked_add_signed(TimeDelta::days(days))
        .ok_or_else(|| SynthError::Derivation {
            reason: format!("{} {:+} days is out of range", date, days),
        })
}

/// Whole years between `born` and `on`.
pub fn age_between(born: NaiveDate, on: NaiveDate) -> i64 {
    let had_birthday = (on.month(), on.day()) >= (born.month(), born.day());
    (on.year() - born.year()) as i64 - i64::from(!had_birthday)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
