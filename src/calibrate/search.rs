//! Bounded hyperparameter search primitives.
//!
//! The search box is a fixed 4-dimensional rectangle over
//! `(k, bias, regress, smooth)`. Points are normalized to `[0, 1]^4`
//! internally and decoded to actual values at evaluation time, which keeps
//! the samplers independent of the box geometry.
//!
//! Two samplers cover the two search stages:
//! - Latin hypercube for the design stage: each dimension is divided into N
//!   equal strata with exactly one sample per stratum, giving uniform
//!   per-axis coverage that plain random sampling lacks.
//! - An acquisition step for refinement: candidates score by distance from
//!   already-evaluated points (exploration) plus proximity to the best
//!   point found so far (exploitation), and the top candidate is evaluated
//!   next.

use rand::prelude::*;

use crate::rating::{HyperParams, Mode};

/// Inclusive bounds for one search dimension.
#[derive(Debug, Clone, Copy)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    pub fn new(min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "inverted range");
        Self { min, max }
    }

    /// Convert normalized [0, 1] value to an actual parameter value.
    pub fn decode(&self, normalized: f64) -> f64 {
        let t = normalized.clamp(0.0, 1.0);
        self.min + t * (self.max - self.min)
    }

    /// Convert an actual value to normalized [0, 1].
    pub fn encode(&self, value: f64) -> f64 {
        if self.max > self.min {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else {
            0.5
        }
    }
}

/// The bounded box searched for one mode.
#[derive(Debug, Clone, Copy)]
pub struct SearchBox {
    pub k: ParamRange,
    pub bias: ParamRange,
    pub regress: ParamRange,
    pub smooth: ParamRange,
}

impl SearchBox {
    /// Spread-mode box.
    pub fn fermi() -> Self {
        Self {
            k: ParamRange::new(0.09, 0.15),
            bias: ParamRange::new(0.19, 0.25),
            regress: ParamRange::new(0.58, 0.68),
            smooth: ParamRange::new(9.0, 9.4),
        }
    }

    /// Total-mode box. Totals carry no home advantage, so the bias bounds
    /// pin it to (effectively) zero.
    pub fn bose() -> Self {
        Self {
            k: ParamRange::new(0.0, 0.3),
            bias: ParamRange::new(-1e-3, 1e-3),
            regress: ParamRange::new(0.5, 1.0),
            smooth: ParamRange::new(0.0, 9.4),
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Fermi => Self::fermi(),
            Mode::Bose => Self::bose(),
        }
    }

    /// Decode a normalized point into hyperparameters.
    pub fn decode(&self, normalized: [f64; 4]) -> HyperParams {
        HyperParams {
            k: self.k.decode(normalized[0]),
            bias: self.bias.decode(normalized[1]),
            regress: self.regress.decode(normalized[2]),
            smooth: self.smooth.decode(normalized[3]),
        }
    }
}

pub const NDIM: usize = 4;

/// Latin hypercube sample of `[0, 1]^4`: one point per stratum per dimension.
pub fn sample_lhs<R: Rng>(n_samples: usize, rng: &mut R) -> Vec<[f64; 4]> {
    let strata: Vec<Vec<usize>> = (0..NDIM)
        .map(|_| {
            let mut perm: Vec<usize> = (0..n_samples).collect();
            perm.shuffle(rng);
            perm
        })
        .collect();

    (0..n_samples)
        .map(|i| {
            let mut point = [0.0; NDIM];
            for (d, slot) in point.iter_mut().enumerate() {
                let stratum = strata[d][i];
                let lower = stratum as f64 / n_samples as f64;
                let upper = (stratum + 1) as f64 / n_samples as f64;
                *slot = lower + rng.gen::<f64>() * (upper - lower);
            }
            point
        })
        .collect()
}

/// Random uniform sample of `[0, 1]^4`.
pub fn sample_random<R: Rng>(n_samples: usize, rng: &mut R) -> Vec<[f64; 4]> {
    (0..n_samples)
        .map(|_| {
            let mut point = [0.0; NDIM];
            for slot in point.iter_mut() {
                *slot = rng.gen();
            }
            point
        })
        .collect()
}

/// Candidate pool size per acquisition step.
const N_CANDIDATES: usize = 1000;
/// Exploitation weight relative to the exploration (distance) term.
const EXPLOIT_WEIGHT: f64 = 0.3;

/// Pick the next point to evaluate given the `(point, objective)` history of
/// a minimization run. Balances distance from explored regions against
/// proximity to the best-scoring region.
pub fn next_candidate<R: Rng>(history: &[([f64; 4], f64)], rng: &mut R) -> [f64; 4] {
    if history.is_empty() {
        let mut point = [0.0; NDIM];
        for slot in point.iter_mut() {
            *slot = rng.gen();
        }
        return point;
    }

    let best = history
        .iter()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(p, _)| *p)
        .unwrap_or([0.5; NDIM]);

    sample_random(N_CANDIDATES, rng)
        .into_iter()
        .max_by(|a, b| {
            let score_a = acquisition(a, &best, history);
            let score_b = acquisition(b, &best, history);
            score_a
                .partial_cmp(&score_b)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or([0.5; NDIM])
}

fn acquisition(point: &[f64; 4], best: &[f64; 4], history: &[([f64; 4], f64)]) -> f64 {
    let nearest = history
        .iter()
        .map(|(h, _)| distance(point, h))
        .fold(f64::INFINITY, f64::min);
    let pull = 1.0 / (1.0 + distance(point, best));
    nearest + EXPLOIT_WEIGHT * pull
}

/// Normalized L2 distance in the unit box.
fn distance(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let sum_sq: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(av, bv)| (av - bv).powi(2))
        .sum();
    (sum_sq / NDIM as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn range_decode_hits_the_endpoints_and_midpoint() {
        let range = ParamRange::new(0.0, 10.0);
        assert_relative_eq!(range.decode(0.0), 0.0);
        assert_relative_eq!(range.decode(0.5), 5.0);
        assert_relative_eq!(range.decode(1.0), 10.0);
    }

    #[test]
    fn range_roundtrips_through_encode() {
        let range = ParamRange::new(0.09, 0.15);
        for v in [0.09, 0.11, 0.13, 0.15] {
            assert_relative_eq!(range.decode(range.encode(v)), v, epsilon = 1e-12);
        }
    }

    #[test]
    fn box_decode_stays_inside_the_bounds() {
        let bx = SearchBox::fermi();
        let mut rng = StdRng::seed_from_u64(7);
        for point in sample_random(100, &mut rng) {
            let p = bx.decode(point);
            assert!((0.09..=0.15).contains(&p.k), "k out of box: {}", p.k);
            assert!((0.19..=0.25).contains(&p.bias), "bias out of box: {}", p.bias);
            assert!((0.58..=0.68).contains(&p.regress), "regress out of box: {}", p.regress);
            assert!((9.0..=9.4).contains(&p.smooth), "smooth out of box: {}", p.smooth);
        }
    }

    #[test]
    fn lhs_places_one_sample_per_stratum() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 10;
        let samples = sample_lhs(n, &mut rng);
        assert_eq!(samples.len(), n);
        for d in 0..NDIM {
            let mut hit = vec![false; n];
            for s in &samples {
                let stratum = ((s[d] * n as f64) as usize).min(n - 1);
                assert!(!hit[stratum], "two samples in stratum {} of dim {}", stratum, d);
                hit[stratum] = true;
            }
        }
    }

    #[test]
    fn lhs_is_reproducible_per_seed() {
        let mut a = StdRng::seed_from_u64(1720);
        let mut b = StdRng::seed_from_u64(1720);
        assert_eq!(sample_lhs(8, &mut a), sample_lhs(8, &mut b));
    }

    #[test]
    fn next_candidate_avoids_a_crowded_corner() {
        let mut rng = StdRng::seed_from_u64(3);
        // History piled up near the origin; the next candidate should leave it.
        let history: Vec<([f64; 4], f64)> = (0..25)
            .map(|i| {
                let t = i as f64 / 250.0;
                ([t, t, t, t], 1.0)
            })
            .collect();
        let next = next_candidate(&history, &mut rng);
        let origin_dist = distance(&next, &[0.0; 4]);
        assert!(
            origin_dist > 0.25,
            "candidate should explore away from the cluster, got distance {:.3}",
            origin_dist
        );
    }

    #[test]
    fn next_candidate_with_no_history_is_in_the_unit_box() {
        let mut rng = StdRng::seed_from_u64(9);
        let point = next_candidate(&[], &mut rng);
        assert!(point.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
