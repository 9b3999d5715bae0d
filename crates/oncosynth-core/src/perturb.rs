//! Field-level corruption with a defect log.
//!
//! A `Perturber` carries the corruption probability `p` of one patient and
//! the defects applied so far. Every perturbable field goes through
//! [`Perturber::perturb`]: one Bernoulli(`p`) draw decides whether the field
//! is corrupted, and the field's [`FieldKind`] decides how.
//!
//! The Bernoulli draw is taken whether or not `p` is zero, so the random
//! stream of a patient has the same shape at every corruption level.

use chrono::{NaiveDate, TimeDelta};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use oncosynth_contracts::{
    bundle::{Defect, DefectKind},
    error::{SynthError, SynthResult},
};

use crate::sampler::{chance, gaussian, pick, sign, truncate};

// ── Offsets ───────────────────────────────────────────────────────────────────

/// The signed amount a numeric or date field is moved by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Offset {
    /// `N(mean, std)` magnitude with a random sign.
    Gaussian { mean: f64, std: f64 },
    /// Uniform magnitude in `[low, high)` with a random sign.
    Uniform { low: i64, high: i64 },
    /// Uniform signed value in `[low, high)`.
    Span { low: i64, high: i64 },
}

impl Offset {
    /// Draw an integer offset. Gaussian magnitudes are truncated toward zero.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        match *self {
            Offset::Gaussian { mean, std } => {
                let magnitude = gaussian(rng, mean, std);
                truncate(magnitude * sign(rng) as f64)
            }
            Offset::Uniform { low, high } => {
                let magnitude = rng.gen_range(low..high);
                magnitude * sign(rng)
            }
            Offset::Span { low, high } => rng.gen_range(low..high),
        }
    }

    /// Draw a real-valued offset. Gaussian magnitudes are not truncated.
    pub fn draw_real<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Offset::Gaussian { mean, std } => {
                let magnitude = gaussian(rng, mean, std);
                magnitude * sign(rng) as f64
            }
            _ => self.draw(rng) as f64,
        }
    }
}

// ── Field kinds ───────────────────────────────────────────────────────────────

/// How a field of type `T` is corrupted once the Bernoulli draw fires.
pub trait FieldKind<T> {
    fn defect_kind(&self) -> DefectKind;

    fn corrupt<R: Rng + ?Sized>(&self, rng: &mut R, value: T) -> T;
}

/// Numeric noise, re-clamped to the field's valid range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Numeric<N> {
    pub offset: Offset,
    pub min: Option<N>,
    pub max: Option<N>,
}

impl<N> Numeric<N> {
    pub const fn unbounded(offset: Offset) -> Self {
        Self {
            offset,
            min: None,
            max: None,
        }
    }

    pub const fn at_least(offset: Offset, min: N) -> Self {
        Self {
            offset,
            min: Some(min),
            max: None,
        }
    }

    pub const fn within(offset: Offset, min: N, max: N) -> Self {
        Self {
            offset,
            min: Some(min),
            max: Some(max),
        }
    }
}

impl FieldKind<i64> for Numeric<i64> {
    fn defect_kind(&self) -> DefectKind {
        DefectKind::NumericNoise
    }

    fn corrupt<R: Rng + ?Sized>(&self, rng: &mut R, value: i64) -> i64 {
        let mut out = value + self.offset.draw(rng);
        if let Some(min) = self.min {
            out = out.max(min);
        }
        if let Some(max) = self.max {
            out = out.min(max);
        }
        out
    }
}

impl FieldKind<f64> for Numeric<f64> {
    fn defect_kind(&self) -> DefectKind {
        DefectKind::NumericNoise
    }

    fn corrupt<R: Rng + ?Sized>(&self, rng: &mut R, value: f64) -> f64 {
        let mut out = value + self.offset.draw_real(rng);
        if let Some(min) = self.min {
            out = out.max(min);
        }
        if let Some(max) = self.max {
            out = out.min(max);
        }
        out
    }
}

/// Boolean negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flip;

impl FieldKind<bool> for Flip {
    fn defect_kind(&self) -> DefectKind {
        DefectKind::Flip
    }

    fn corrupt<R: Rng + ?Sized>(&self, _rng: &mut R, value: bool) -> bool {
        !value
    }
}

/// Uniform re-draw from a list. Repeated values bias the re-draw.
#[derive(Debug, Clone, Copy)]
pub struct Redraw<'a, T>(pub &'a [T]);

impl<T: Clone> FieldKind<T> for Redraw<'_, T> {
    fn defect_kind(&self) -> DefectKind {
        DefectKind::Redraw
    }

    fn corrupt<R: Rng + ?Sized>(&self, rng: &mut R, _value: T) -> T {
        pick(rng, self.0).clone()
    }
}

/// A signed shift of a date by a number of days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateShift(pub Offset);

impl FieldKind<NaiveDate> for DateShift {
    fn defect_kind(&self) -> DefectKind {
        DefectKind::DateShift
    }

    fn corrupt<R: Rng + ?Sized>(&self, rng: &mut R, value: NaiveDate) -> NaiveDate {
        let days = self.0.draw(rng);
        value
            .checked_add_signed(TimeDelta::days(days))
            .unwrap_or(value)
    }
}

/// An optional integer: present values get numeric noise, absent values
/// become an implausible present value drawn from `absent`. Either way the
/// result is clamped to at least `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaybeNumeric {
    pub present: Offset,
    pub absent: (f64, f64),
    pub min: i64,
}

impl FieldKind<Option<i64>> for MaybeNumeric {
    fn defect_kind(&self) -> DefectKind {
        DefectKind::NumericNoise
    }

    fn corrupt<R: Rng + ?Sized>(&self, rng: &mut R, value: Option<i64>) -> Option<i64> {
        let out = match value {
            Some(v) => v + self.present.draw(rng),
            None => {
                let (mean, std) = self.absent;
                truncate(gaussian(rng, mean, std))
            }
        };
        Some(out.max(self.min))
    }
}

// ── Perturber ─────────────────────────────────────────────────────────────────

/// Accept `p` only if it lies in `[0, 1]`.
pub fn check_probability(p: f64) -> SynthResult<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(SynthError::InvalidProbability { value: p })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetAction {
    Remove,
    Add,
    Mutate,
}

const SET_ACTIONS: [SetAction; 3] = [SetAction::Remove, SetAction::Add, SetAction::Mutate];

/// Applies Bernoulli(`p`) corruption and records every defect.
#[derive(Debug, Clone)]
pub struct Perturber {
    probability: f64,
    defects: Vec<Defect>,
}

impl Perturber {
    /// Returns `SynthError::InvalidProbability` unless `0 <= p <= 1`.
    pub fn new(probability: f64) -> SynthResult<Self> {
        Ok(Self {
            probability: check_probability(probability)?,
            defects: Vec::new(),
        })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// True when corruption is possible at all.
    pub fn is_active(&self) -> bool {
        self.probability > 0.0
    }

    /// One Bernoulli(`p`) draw.
    pub fn fires<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        chance(rng, self.probability)
    }

    /// Corrupt `value` with probability `p` according to `kind`.
    ///
    /// Returns the value unchanged when the draw does not fire. Otherwise
    /// returns the corrupted value and appends a defect for `field`.
    pub fn perturb<T, K, R>(&mut self, rng: &mut R, field: &str, value: T, kind: &K) -> T
    where
        T: Clone + Serialize,
        K: FieldKind<T>,
        R: Rng + ?Sized,
    {
        if !self.fires(rng) {
            return value;
        }
        let before = value.clone();
        let after = kind.corrupt(rng, value);
        self.record(field, kind.defect_kind(), &before, &after);
        after
    }

    /// Corrupt a set-valued field.
    ///
    /// Each existing entry is independently selected with probability `p`;
    /// a selected entry is removed, joined by an unrelated entry from
    /// `fresh`, or replaced by one (remove then add). Added entries are
    /// appended, then duplicates are dropped keeping the first occurrence.
    pub fn perturb_set<T, F, R>(
        &mut self,
        rng: &mut R,
        field: &str,
        entries: Vec<T>,
        mut fresh: F,
    ) -> Vec<T>
    where
        T: Clone + PartialEq + Serialize,
        F: FnMut(&mut R) -> T,
        R: Rng + ?Sized,
    {
        let mut kept = Vec::with_capacity(entries.len());
        let mut added = Vec::new();

        for entry in entries {
            if !self.fires(rng) {
                kept.push(entry);
                continue;
            }
            match *pick(rng, &SET_ACTIONS) {
                SetAction::Remove => {
                    self.record(field, DefectKind::EntryRemoved, &entry, &Value::Null);
                }
                SetAction::Add => {
                    let extra = fresh(rng);
                    self.record(field, DefectKind::EntryAdded, &Value::Null, &extra);
                    kept.push(entry);
                    added.push(extra);
                }
                SetAction::Mutate => {
                    let replacement = fresh(rng);
                    self.record(field, DefectKind::EntryMutated, &entry, &replacement);
                    added.push(replacement);
                }
            }
        }

        let mut out: Vec<T> = Vec::with_capacity(kept.len() + added.len());
        for entry in kept.into_iter().chain(added) {
            if !out.contains(&entry) {
                out.push(entry);
            }
        }
        out
    }

    /// Append a defect directly, for corruptions that are not a single
    /// field transform.
    pub fn record<B: Serialize, A: Serialize>(
        &mut self,
        field: &str,
        kind: DefectKind,
        before: &B,
        after: &A,
    ) {
        trace!(field, ?kind, "defect injected");
        self.defects.push(Defect {
            field: field.to_string(),
            kind,
            before: serde_json::to_value(before).unwrap_or(Value::Null),
            after: serde_json::to_value(after).unwrap_or(Value::Null),
        });
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn into_defects(self) -> Vec<Defect> {
        self.defects
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(99)
    }

    const NOISE: Numeric<i64> = Numeric::unbounded(Offset::Gaussian { mean: 6.0, std: 2.0 });

    #[test]
    fn test_probability_outside_unit_interval_is_rejected() {
        for p in [-0.1, 1.01, f64::NAN] {
            match Perturber::new(p) {
                Err(SynthError::InvalidProbability { .. }) => {}
                other => panic!("expected InvalidProbability for {p}, got {:?}", other),
            }
        }
        assert!(Perturber::new(0.0).is_ok());
        assert!(Perturber::new(1.0).is_ok());
    }

    #[test]
    fn test_zero_probability_is_identity() {
        let mut rng = rng();
        let mut perturber = Perturber::new(0.0).unwrap();
        let date = NaiveDate::from_ymd_opt(2020, 5, 17).unwrap();

        for _ in 0..1_000 {
            assert_eq!(perturber.perturb(&mut rng, "count", 3, &NOISE), 3);
            assert!(perturber.perturb(&mut rng, "flag", true, &Flip));
            let shift = DateShift(Offset::Uniform { low: 10, high: 20 });
            assert_eq!(perturber.perturb(&mut rng, "date", date, &shift), date);
        }
        let set = perturber.perturb_set(&mut rng, "set", vec![1, 2, 3], |_| 99);
        assert_eq!(set, vec![1, 2, 3]);
        assert!(perturber.defects().is_empty());
    }

    #[test]
    fn test_full_probability_always_records() {
        let mut rng = rng();
        let mut perturber = Perturber::new(1.0).unwrap();

        let flipped = perturber.perturb(&mut rng, "er_positive", true, &Flip);
        assert!(!flipped);

        let defects = perturber.into_defects();
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].field, "er_positive");
        assert_eq!(defects[0].kind, DefectKind::Flip);
        assert_eq!(defects[0].before, Value::Bool(true));
        assert_eq!(defects[0].after, Value::Bool(false));
    }

    #[test]
    fn test_numeric_noise_is_clamped() {
        let mut rng = rng();
        let mut perturber = Perturber::new(1.0).unwrap();
        let kind = Numeric::within(Offset::Gaussian { mean: 40.0, std: 8.0 }, 0, 100);
        for _ in 0..500 {
            let v = perturber.perturb(&mut rng, "ki67_percent", 50, &kind);
            assert!((0..=100).contains(&v), "ki67 {v} escaped clamp");
        }
    }

    #[test]
    fn test_span_offset_is_signed() {
        let mut rng = rng();
        let offset = Offset::Span { low: -7, high: 8 };
        let draws: Vec<i64> = (0..1_000).map(|_| offset.draw(&mut rng)).collect();
        assert!(draws.iter().all(|d| (-7..8).contains(d)));
        assert!(draws.iter().any(|d| *d < 0) && draws.iter().any(|d| *d > 0));
    }

    #[test]
    fn test_uniform_offset_magnitude() {
        let mut rng = rng();
        let offset = Offset::Uniform { low: 10, high: 20 };
        for _ in 0..1_000 {
            let d = offset.draw(&mut rng).abs();
            assert!((10..20).contains(&d), "magnitude {d} out of range");
        }
    }

    #[test]
    fn test_maybe_numeric_absent_becomes_implausible() {
        let mut rng = rng();
        let mut perturber = Perturber::new(1.0).unwrap();
        let kind = MaybeNumeric {
            present: Offset::Gaussian { mean: 25.0, std: 4.0 },
            absent: (120.0, 10.0),
            min: 0,
        };
        let v = perturber.perturb(&mut rng, "menopause_age", None, &kind);
        let age = v.expect("absent value must become present");
        assert!(age > 60, "implausible age expected, got {age}");
    }

    #[test]
    fn test_maybe_numeric_present_is_clamped() {
        let mut rng = rng();
        let mut perturber = Perturber::new(1.0).unwrap();
        let kind = MaybeNumeric {
            present: Offset::Gaussian { mean: 25.0, std: 4.0 },
            absent: (120.0, 10.0),
            min: 0,
        };
        let ages: Vec<i64> = (0..500)
            .map(|_| {
                perturber
                    .perturb(&mut rng, "menopause_age", Some(3), &kind)
                    .expect("present value stays present")
            })
            .collect();
        assert!(ages.iter().all(|a| *a >= 0), "negative age escaped clamp");
        assert!(ages.contains(&0), "downward noise must land on the floor");
        assert!(ages.iter().any(|a| *a > 3), "upward noise must survive");
    }

    #[test]
    fn test_redraw_stays_in_enumeration() {
        let mut rng = rng();
        let mut perturber = Perturber::new(1.0).unwrap();
        let choices = ['C', 'P', 'P', 'P'];
        for _ in 0..200 {
            let v = perturber.perturb(&mut rng, "prefix", 'C', &Redraw(&choices));
            assert!(v == 'C' || v == 'P');
        }
    }

    #[test]
    fn test_perturb_set_deduplicates_and_logs() {
        let mut rng = rng();
        let mut perturber = Perturber::new(1.0).unwrap();
        let out = perturber.perturb_set(&mut rng, "oral_drugs", vec![1, 2, 3, 4], |_| 7);

        let unique: HashSet<i32> = out.iter().copied().collect();
        assert_eq!(unique.len(), out.len(), "duplicates survived: {out:?}");
        assert_eq!(perturber.defects().len(), 4, "one defect per selected entry");
        assert!(perturber.defects().iter().all(|d| matches!(
            d.kind,
            DefectKind::EntryRemoved | DefectKind::EntryAdded | DefectKind::EntryMutated
        )));
    }
}
