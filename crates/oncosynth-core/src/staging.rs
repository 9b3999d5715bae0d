//! Stage to TNM resolution.
//!
//! Each stage maps to one [`TnmRule`]. Rules are plain data: fixed
//! categories, weighted tables, joint (T, N) tables, or a Bernoulli branch
//! between a fixed pair and another rule.

use rand::Rng;

use oncosynth_contracts::{
    error::SynthResult,
    tumor::{
        MCategory::{self, M0, M1},
        MicroInvasion,
        NCategory::{self, N0, N1, N2, N3},
        Stage,
        TCategory::{self, Tis, T0, T1, T2, T3, T4},
        Tnm,
    },
};

use crate::sampler::{chance, sample};

/// One TNM component: either fixed or drawn from a weighted table.
#[derive(Debug, Clone, Copy)]
pub enum Component<C: 'static> {
    Fixed(C),
    Weighted(&'static [(C, f64)]),
}

impl<C: Copy> Component<C> {
    fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> C {
        match self {
            Component::Fixed(c) => *c,
            Component::Weighted(table) => *sample(rng, table),
        }
    }
}

/// How the TNM triple of one stage is drawn.
#[derive(Debug, Clone, Copy)]
pub enum TnmRule {
    /// T and N drawn independently (T first).
    Independent {
        t: Component<TCategory>,
        n: Component<NCategory>,
        micro_invasion: Option<MicroInvasion>,
        m: MCategory,
    },
    /// T and N drawn together from one table.
    Joint {
        pairs: &'static [((TCategory, NCategory), f64)],
        m: MCategory,
    },
    /// With probability `p` the fixed pair `hit`, otherwise `miss`.
    Branch {
        p: f64,
        hit: (TCategory, NCategory),
        m: MCategory,
        miss: &'static TnmRule,
    },
}

const STAGE_0: TnmRule = TnmRule::Independent {
    t: Component::Fixed(Tis),
    n: Component::Fixed(N0),
    micro_invasion: None,
    m: M0,
};

const STAGE_IA: TnmRule = TnmRule::Independent {
    t: Component::Fixed(T1),
    n: Component::Fixed(N0),
    micro_invasion: None,
    m: M0,
};

const STAGE_IB: TnmRule = TnmRule::Independent {
    t: Component::Weighted(&[(T1, 0.78), (T0, 0.22)]),
    n: Component::Fixed(N1),
    micro_invasion: Some(MicroInvasion::Mi),
    m: M0,
};

const STAGE_IIA: TnmRule = TnmRule::Joint {
    pairs: &[((T0, N1), 0.30), ((T1, N1), 0.25), ((T2, N0), 0.45)],
    m: M0,
};

const STAGE_IIB: TnmRule = TnmRule::Joint {
    pairs: &[((T2, N1), 0.85), ((T3, N0), 0.15)],
    m: M0,
};

const STAGE_IIIA_OTHERWISE: TnmRule = TnmRule::Independent {
    t: Component::Weighted(&[(T0, 0.5), (T1, 0.1), (T2, 0.3), (T3, 0.1)]),
    n: Component::Fixed(N2),
    micro_invasion: None,
    m: M0,
};

const STAGE_IIIA: TnmRule = TnmRule::Branch {
    p: 0.2,
    hit: (T3, N1),
    m: M0,
    miss: &STAGE_IIIA_OTHERWISE,
};

const STAGE_IIIB: TnmRule = TnmRule::Independent {
    t: Component::Fixed(T4),
    n: Component::Weighted(&[(N0, 0.1), (N1, 0.4), (N2, 0.5)]),
    micro_invasion: None,
    m: M0,
};

const STAGE_IIIC: TnmRule = TnmRule::Independent {
    t: Component::Weighted(&[(T0, 0.45), (T1, 0.1), (T2, 0.25), (T3, 0.15), (T4, 0.05)]),
    n: Component::Fixed(N3),
    micro_invasion: None,
    m: M0,
};

const STAGE_IV: TnmRule = TnmRule::Independent {
    t: Component::Weighted(&[(T0, 0.4), (T1, 0.1), (T2, 0.2), (T3, 0.1), (T4, 0.2)]),
    n: Component::Weighted(&[(N0, 0.1), (N1, 0.35), (N2, 0.25), (N3, 0.3)]),
    micro_invasion: None,
    m: M1,
};

/// The TNM rule table, one entry per stage.
pub const TNM_RULES: [(Stage, TnmRule); 9] = [
    (Stage::S0, STAGE_0),
    (Stage::IA, STAGE_IA),
    (Stage::IB, STAGE_IB),
    (Stage::IIA, STAGE_IIA),
    (Stage::IIB, STAGE_IIB),
    (Stage::IIIA, STAGE_IIIA),
    (Stage::IIIB, STAGE_IIIB),
    (Stage::IIIC, STAGE_IIIC),
    (Stage::IV, STAGE_IV),
];

impl TnmRule {
    /// The rule for `stage`.
    pub fn for_stage(stage: Stage) -> &'static TnmRule {
        match stage {
            Stage::S0 => &STAGE_0,
            Stage::IA => &STAGE_IA,
            Stage::IB => &STAGE_IB,
            Stage::IIA => &STAGE_IIA,
            Stage::IIB => &STAGE_IIB,
            Stage::IIIA => &STAGE_IIIA,
            Stage::IIIB => &STAGE_IIIB,
            Stage::IIIC => &STAGE_IIIC,
            Stage::IV => &STAGE_IV,
        }
    }

    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Tnm {
        match self {
            TnmRule::Independent {
                t,
                n,
                micro_invasion,
                m,
            } => {
                let t = t.resolve(rng);
                let n = n.resolve(rng);
                Tnm {
                    t,
                    n,
                    micro_invasion: *micro_invasion,
                    m: *m,
                }
            }
            TnmRule::Joint { pairs, m } => {
                let (t, n) = *sample(rng, pairs);
                Tnm {
                    t,
                    n,
                    micro_invasion: None,
                    m: *m,
                }
            }
            TnmRule::Branch { p, hit, m, miss } => {
                if chance(rng, *p) {
                    Tnm {
                        t: hit.0,
                        n: hit.1,
                        micro_invasion: None,
                        m: *m,
                    }
                } else {
                    miss.resolve(rng)
                }
            }
        }
    }
}

/// Draw the TNM triple for `stage`.
pub fn resolve_tnm<R: Rng + ?Sized>(rng: &mut R, stage: Stage) -> Tnm {
    TnmRule::for_stage(stage).resolve(rng)
}

/// Draw the TNM triple for a stage label such as `"IIIA"`.
///
/// Returns `SynthError::UnknownStage` for labels outside the enumeration.
pub fn resolve_label<R: Rng + ?Sized>(rng: &mut R, label: &str) -> SynthResult<Tnm> {
    let stage: Stage = label.parse()?;
    Ok(resolve_tnm(rng, stage))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use oncosynth_contracts::error::SynthError;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(3)
    }

    #[test]
    fn test_rule_table_covers_every_stage_in_order() {
        let stages: Vec<Stage> = TNM_RULES.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
    }

    #[test]
    fn test_stage_zero_is_in_situ() {
        let mut rng = rng();
        for _ in 0..100 {
            let tnm = resolve_tnm(&mut rng, Stage::S0);
            assert_eq!(tnm.t, TCategory::Tis);
            assert_eq!(tnm.n, NCategory::N0);
            assert_eq!(tnm.micro_invasion, None);
            assert_eq!(tnm.m, MCategory::M0);
        }
    }

    #[test]
    fn test_stage_ib_carries_micro_invasion() {
        let mut rng = rng();
        for _ in 0..100 {
            let tnm = resolve_tnm(&mut rng, Stage::IB);
            assert_eq!(tnm.micro_invasion, Some(MicroInvasion::Mi));
            assert!(matches!(tnm.t, TCategory::T0 | TCategory::T1));
            assert_eq!(tnm.n, NCategory::N1);
        }
    }

    #[test]
    fn test_categories_stay_within_stage_support() {
        let mut rng = rng();
        for stage in Stage::ALL {
            for _ in 0..10_000 {
                let tnm = resolve_tnm(&mut rng, stage);
                let ok = match stage {
                    Stage::S0 => tnm.t == Tis && tnm.n == N0,
                    Stage::IA => tnm.t == T1 && tnm.n == N0,
                    Stage::IB => matches!(tnm.t, T0 | T1) && tnm.n == N1,
                    Stage::IIA => matches!((tnm.t, tnm.n), (T0, N1) | (T1, N1) | (T2, N0)),
                    Stage::IIB => matches!((tnm.t, tnm.n), (T2, N1) | (T3, N0)),
                    Stage::IIIA => {
                        (tnm.t, tnm.n) == (T3, N1) || (tnm.t != T4 && tnm.t != Tis && tnm.n == N2)
                    }
                    Stage::IIIB => tnm.t == T4 && matches!(tnm.n, N0 | N1 | N2),
                    Stage::IIIC => tnm.t != Tis && tnm.n == N3,
                    Stage::IV => tnm.t != Tis,
                };
                assert!(ok, "stage {stage} produced {:?}", tnm);
                let expected_m = if stage == Stage::IV { M1 } else { M0 };
                assert_eq!(tnm.m, expected_m, "stage {stage}");
                if stage != Stage::IB {
                    assert_eq!(tnm.micro_invasion, None);
                }
            }
        }
    }

    #[test]
    fn test_iiia_branch_frequency() {
        let mut rng = rng();
        let hits = (0..10_000)
            .filter(|_| {
                let tnm = resolve_tnm(&mut rng, Stage::IIIA);
                tnm.t == T3 && tnm.n == N1
            })
            .count() as f64
            / 10_000.0;
        assert!((hits - 0.2).abs() < 0.02, "observed {hits}");
    }

    #[test]
    fn test_unknown_label_fails_fast() {
        let mut rng = rng();
        match resolve_label(&mut rng, "V") {
            Err(SynthError::UnknownStage { label }) => assert_eq!(label, "V"),
            other => panic!("expected UnknownStage, got {:?}", other),
        }
        assert!(resolve_label(&mut rng, "IIB").is_ok());
    }
}
