//! Random draws: categorical tables, Bernoulli trials, Gaussians, ranges.
//!
//! Every function takes the random source explicitly. Table draws consume
//! exactly one uniform value, so the draw sequence of a patient depends only
//! on the branches taken, never on table sizes.

use rand::Rng;
use rand_distr::StandardNormal;
use tracing::trace;

use oncosynth_catalog::{Gaussian, IntRange};

/// Draw one key from an ordered weighted table.
///
/// Walks the entries in order accumulating weight and returns the first key
/// whose cumulative weight exceeds a uniform draw in `[0, 1)`. When the
/// weights sum to slightly less than the draw, the last key is returned.
///
/// # Panics
///
/// Panics if `table` is empty. `WeightedTable` and the static TNM tables are
/// non-empty by construction.
pub fn sample<'a, K, R: Rng + ?Sized>(rng: &mut R, table: &'a [(K, f64)]) -> &'a K {
    let r: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (key, weight) in table {
        cumulative += weight;
        if r < cumulative {
            return key;
        }
    }
    trace!(draw = r, cumulative, "weighted draw fell through to last key");
    &table[table.len() - 1].0
}

/// A Bernoulli trial with success probability `p`.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}

/// A normal draw with the given mean and standard deviation.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + std * z
}

pub fn normal<R: Rng + ?Sized>(rng: &mut R, params: &Gaussian) -> f64 {
    gaussian(rng, params.mean, params.std)
}

/// A uniform integer in the half-open range `[low, high)`.
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, range: &IntRange) -> i64 {
    rng.gen_range(range.low..range.high)
}

/// `+1` or `-1` with equal probability.
pub fn sign<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    if rng.gen::<bool>() {
        1
    } else {
        -1
    }
}

/// A uniform choice from `items`. A single-element list consumes no draw.
///
/// # Panics
///
/// Panics if `items` is empty.
pub fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> &'a T {
    match items {
        [only] => only,
        _ => &items[rng.gen_range(0..items.len())],
    }
}

/// Truncate toward zero, the way integer fields are derived from draws.
pub fn truncate(x: f64) -> i64 {
    x as i64
}

/// Round half up for non-negative values (`truncate(x + 0.5)`).
pub fn round_half_up(x: f64) -> i64 {
    truncate(x + 0.5)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use oncosynth_catalog::Catalog;
    use oncosynth_contracts::tumor::{Stage, Subtype};

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(20240601)
    }

    fn frequencies<K: PartialEq + Copy>(draws: &[K], keys: &[K]) -> Vec<f64> {
        keys.iter()
            .map(|k| draws.iter().filter(|d| *d == k).count() as f64 / draws.len() as f64)
            .collect()
    }

    #[test]
    fn test_subtype_frequencies_match_weights() {
        let catalog = Catalog::builtin().unwrap();
        let table = catalog.diagnosis.subtype.weights();
        let mut rng = rng();

        let draws: Vec<Subtype> = (0..10_000).map(|_| *sample(&mut rng, table)).collect();
        let observed = frequencies(&draws, &Subtype::ALL);

        for ((key, weight), freq) in table.iter().zip(observed) {
            assert!(
                (freq - weight).abs() < 0.02,
                "{key:?}: expected {weight}, observed {freq}"
            );
        }
    }

    #[test]
    fn test_stage_frequencies_match_weights() {
        let catalog = Catalog::builtin().unwrap();
        let table = catalog.staging.at_diagnosis.weights();
        let mut rng = rng();

        let draws: Vec<Stage> = (0..10_000).map(|_| *sample(&mut rng, table)).collect();
        let observed = frequencies(&draws, &Stage::ALL);

        for ((key, weight), freq) in table.iter().zip(observed) {
            assert!(
                (freq - weight).abs() < 0.02,
                "{key}: expected {weight}, observed {freq}"
            );
        }
    }

    #[test]
    fn test_short_table_falls_back_to_last_key() {
        // Weights sum to 0; every draw falls through.
        let table = [("a", 0.0), ("b", 0.0)];
        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(*sample(&mut rng, &table), "b");
        }
    }

    #[test]
    fn test_zero_weight_key_is_never_drawn() {
        let table = [("never", 0.0), ("always", 1.0)];
        let mut rng = rng();
        for _ in 0..1_000 {
            assert_eq!(*sample(&mut rng, &table), "always");
        }
    }

    #[test]
    fn test_sample_consumes_one_draw() {
        let table = [(1, 0.25), (2, 0.25), (3, 0.25), (4, 0.25)];
        let mut a = rng();
        let mut b = rng();
        sample(&mut a, &table);
        let _: f64 = b.gen();
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_pick_single_element_consumes_nothing() {
        let mut a = rng();
        let mut b = rng();
        assert_eq!(*pick(&mut a, &[21u32]), 21);
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = rng();
        assert!((0..1_000).all(|_| !chance(&mut rng, 0.0)));
        assert!((0..1_000).all(|_| chance(&mut rng, 1.0)));
    }

    #[test]
    fn test_gaussian_mean() {
        let mut rng = rng();
        let mean = (0..10_000).map(|_| gaussian(&mut rng, 57.0, 10.0)).sum::<f64>() / 10_000.0;
        assert!((mean - 57.0).abs() < 0.5, "sample mean {mean}");
    }

    #[test]
    fn test_uniform_is_half_open() {
        let mut rng = rng();
        let range = IntRange { low: 3, high: 6 };
        let draws: Vec<i64> = (0..1_000).map(|_| uniform(&mut rng, &range)).collect();
        assert!(draws.iter().all(|d| (3..6).contains(d)));
        assert!(draws.contains(&3) && draws.contains(&5));
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(truncate(-0.9), 0);
        assert_eq!(truncate(12.99), 12);
        assert_eq!(round_half_up(12.5), 13);
        assert_eq!(round_half_up(12.49), 12);
    }
}
