//! Catalog loading and validation.
//!
//! `Catalog` is read from a TOML string or file and validated once, before
//! any patient is generated. Structural problems (bad TOML, empty tables,
//! negative weights) surface as `SynthError::Catalog` from the parser; the
//! cross-table checks below run on the parsed value:
//!
//! 1. Probabilities lie in `[0, 1]`.
//! 2. Gaussian parameters are finite with a non-negative deviation.
//! 3. Uniform ranges are non-empty, clamp bounds are ordered.
//! 4. Every stage has exactly one post-neoadjuvant row.
//! 5. Regimen lists are non-empty.
//! 6. Exactly one comorbidity row carries the smoking history.
//!
//! A categorical table whose weights drift from 1 by more than `1e-3` is
//! accepted with a warning; the sampler's last-key fallback absorbs the gap.

use std::{collections::HashSet, path::Path};

use tracing::{debug, warn};

use oncosynth_contracts::{
    error::{SynthError, SynthResult},
    tumor::Stage,
};

use crate::{
    model::Catalog,
    table::{Bounds, Gaussian, IntRange, WeightedTable},
};

/// The catalog shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("../catalog/breast_cancer.toml");

const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

impl Catalog {
    /// The embedded breast-cancer catalog.
    pub fn builtin() -> SynthResult<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `SynthError::Catalog` if the TOML is malformed, does not match
    /// the catalog schema, or fails validation.
    pub fn from_toml_str(s: &str) -> SynthResult<Self> {
        let catalog: Catalog = toml::from_str(s).map_err(|e| SynthError::Catalog {
            reason: format!("failed to parse catalog TOML: {}", e),
        })?;
        catalog.validate()?;
        debug!(
            stages = catalog.staging.at_diagnosis.len(),
            comorbidities = catalog.comorbidities.conditions.len(),
            oral_drugs = catalog.oral_drugs.drugs.len(),
            family_cancers = catalog.family_history.cancers.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Read the file at `path` and parse it as a catalog.
    pub fn from_file(path: &Path) -> SynthResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SynthError::Catalog {
            reason: format!("failed to read catalog file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Run the cross-table checks. Called by every constructor.
    pub fn validate(&self) -> SynthResult<()> {
        let d = &self.diagnosis;
        gaussian("diagnosis.age", &d.age)?;
        range("diagnosis.day_jitter", &d.day_jitter)?;
        weights("diagnosis.subtype", &d.subtype);

        let s = &self.survival;
        for p in s.death_probability.values() {
            probability("survival.death_probability", *p)?;
        }
        for mean in s.mean_days_alive.values() {
            positive("survival.mean_days_alive", *mean)?;
        }
        positive("survival.days_alive_std_divisor", s.days_alive_std_divisor)?;
        range("survival.follow_up_jitter_days", &s.follow_up_jitter_days)?;
        gaussian("survival.follow_up_days", &s.follow_up_days)?;

        let g = &self.gynecology;
        gaussian("gynecology.menarche_age", &g.menarche_age)?;
        gaussian("gynecology.menopause_age", &g.menopause_age)?;
        probability(
            "gynecology.early_menopause_probability",
            g.early_menopause_probability,
        )?;

        let o = &self.obstetrics;
        gaussian("obstetrics.pregnancies", &o.pregnancies)?;
        for (name, table) in [
            ("obstetrics.abortions", &o.abortions),
            ("obstetrics.caesareans", &o.caesareans),
        ] {
            if table.keys().any(|k| *k < 0) {
                return Err(SynthError::Catalog {
                    reason: format!("{} has a negative count key", name),
                });
            }
            weights(name, table);
        }

        let m = &self.markers;
        probability(
            "markers.single_receptor_loss_probability",
            m.single_receptor_loss_probability,
        )?;
        probability("markers.grade_shift_probability", m.grade_shift_probability)?;
        for mean in m.ki67_mean.values() {
            positive("markers.ki67_mean", *mean)?;
        }
        positive("markers.ki67_std_divisor", m.ki67_std_divisor)?;
        weights("markers.grade", &m.grade);

        self.validate_staging()?;

        let c = &self.chemotherapy;
        if c.cycle_interval_days <= 0 {
            return Err(SynthError::Catalog {
                reason: "chemotherapy.cycle_interval_days must be positive".to_string(),
            });
        }
        range("chemotherapy.neoadjuvant.cycles", &c.neoadjuvant.cycles)?;
        range(
            "chemotherapy.neoadjuvant.start_offset_days",
            &c.neoadjuvant.start_offset_days,
        )?;
        range("chemotherapy.adjuvant.cycles", &c.adjuvant.cycles)?;
        range(
            "chemotherapy.adjuvant.start_offset_days",
            &c.adjuvant.start_offset_days,
        )?;
        for (name, list) in c.regimens.lists() {
            if list.is_empty() {
                return Err(SynthError::Catalog {
                    reason: format!("chemotherapy.regimens.{} has no regimens", name),
                });
            }
        }

        let su = &self.surgery;
        probability("surgery.probability", su.probability)?;
        probability(
            "surgery.sentinel_node_biopsy_probability",
            su.sentinel_node_biopsy_probability,
        )?;
        range("surgery.offset_days", &su.offset_days)?;
        weights("surgery.procedure", &su.procedure);

        let r = &self.radiotherapy;
        range("radiotherapy.start_offset_days", &r.start_offset_days)?;
        gaussian("radiotherapy.duration_days", &r.duration_days)?;
        bounds("radiotherapy.duration_bounds", &r.duration_bounds)?;
        gaussian("radiotherapy.dose_gy", &r.dose_gy)?;
        bounds("radiotherapy.dose_bounds", &r.dose_bounds)?;

        self.validate_ancillary()
    }

    fn validate_staging(&self) -> SynthResult<()> {
        let st = &self.staging;
        weights("staging.at_diagnosis", &st.at_diagnosis);
        weights("staging.histological_type", &st.histological_type);
        weights("staging.associated_in_situ", &st.associated_in_situ);

        for stage in Stage::ALL {
            let rows = st
                .after_neoadjuvant
                .iter()
                .filter(|row| row.from == stage)
                .count();
            if rows != 1 {
                return Err(SynthError::Catalog {
                    reason: format!(
                        "staging.after_neoadjuvant must have exactly one row for stage {}, found {}",
                        stage, rows
                    ),
                });
            }
        }
        for row in &st.after_neoadjuvant {
            weights(&format!("staging.after_neoadjuvant[{}]", row.from), &row.to);
        }
        Ok(())
    }

    fn validate_ancillary(&self) -> SynthResult<()> {
        let co = &self.comorbidities;
        let smoking_rows = co.conditions.iter().filter(|c| c.smoking_history).count();
        if smoking_rows != 1 {
            return Err(SynthError::Catalog {
                reason: format!(
                    "comorbidities must flag exactly one smoking_history row, found {}",
                    smoking_rows
                ),
            });
        }
        weights("comorbidities.smoking_status", &co.smoking_status);

        let mut seen = HashSet::new();
        for condition in &co.conditions {
            probability(
                &format!("comorbidities.{}", condition.name),
                condition.probability,
            )?;
            if !seen.insert(condition.name.as_str()) {
                return Err(SynthError::Catalog {
                    reason: format!("comorbidity '{}' is listed twice", condition.name),
                });
            }
        }

        let od = &self.oral_drugs;
        probability("oral_drugs.pair_thinning_probability", od.pair_thinning_probability)?;
        probability("oral_drugs.list_thinning_probability", od.list_thinning_probability)?;
        if od.drugs.is_empty() {
            return Err(SynthError::Catalog {
                reason: "oral_drugs.drugs is empty".to_string(),
            });
        }
        for drug in &od.drugs {
            probability(&format!("oral_drugs.{}", drug.name), drug.probability)?;
        }

        let fh = &self.family_history;
        if fh.cancers.is_empty() {
            return Err(SynthError::Catalog {
                reason: "family_history.cancers is empty".to_string(),
            });
        }
        for cancer in &fh.cancers {
            probability(&format!("family_history.{}", cancer.name), cancer.probability)?;
        }
        Ok(())
    }

    /// Table sizes, for display.
    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            stages: self.staging.at_diagnosis.len(),
            post_neoadjuvant_rows: self.staging.after_neoadjuvant.len(),
            comorbidities: self.comorbidities.conditions.len(),
            oral_drugs: self.oral_drugs.drugs.len(),
            family_cancers: self.family_history.cancers.len(),
            regimens: self
                .chemotherapy
                .regimens
                .lists()
                .iter()
                .flat_map(|(_, list)| list.iter())
                .collect::<HashSet<_>>()
                .len(),
        }
    }
}

/// Sizes of the main catalog tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSummary {
    pub stages: usize,
    pub post_neoadjuvant_rows: usize,
    pub comorbidities: usize,
    pub oral_drugs: usize,
    pub family_cancers: usize,
    /// Distinct regimen identifiers across all lists.
    pub regimens: usize,
}

// ── Checks ────────────────────────────────────────────────────────────────────

fn weights<K: Clone>(name: &str, table: &WeightedTable<K>) {
    let total = table.total_weight();
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        warn!(table = %name, total, "table weights do not sum to 1");
    }
}

fn probability(name: &str, p: f64) -> SynthResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(SynthError::Catalog {
            reason: format!("{} = {} is not a probability", name, p),
        });
    }
    Ok(())
}

fn positive(name: &str, value: f64) -> SynthResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SynthError::Catalog {
            reason: format!("{} = {} must be positive", name, value),
        });
    }
    Ok(())
}

fn gaussian(name: &str, g: &Gaussian) -> SynthResult<()> {
    if !g.mean.is_finite() || !g.std.is_finite() || g.std < 0.0 {
        return Err(SynthError::Catalog {
            reason: format!(
                "{} has invalid parameters (mean {}, std {})",
                name, g.mean, g.std
            ),
        });
    }
    Ok(())
}

fn range(name: &str, r: &IntRange) -> SynthResult<()> {
    if r.low >= r.high {
        return Err(SynthError::Catalog {
            reason: format!("{} is empty: [{}, {})", name, r.low, r.high),
        });
    }
    Ok(())
}

fn bounds(name: &str, b: &Bounds) -> SynthResult<()> {
    if !b.min.is_finite() || !b.max.is_finite() || b.min > b.max {
        return Err(SynthError::Catalog {
            reason: format!("{} is invalid: [{}, {}]", name, b.min, b.max),
        });
    }
    Ok(())
}
