//! Two-stage bounded hyperparameter search.
//!
//! Stage one evaluates a Latin-hypercube design over the mode's search box;
//! stage two refines with an acquisition loop that trades off exploring
//! unvisited regions against sampling near the incumbent best. Every
//! evaluation fits the rating model from scratch on the full comparison
//! history and scores it with the chosen objective.

pub mod cache;
pub mod search;

use anyhow::{bail, Result};
use clap::ValueEnum;
use rand::prelude::*;
use tracing::{debug, info};

use crate::rating::metrics::{self, RatingMetrics};
use crate::rating::{Comparison, HyperParams, Melo, Mode};
use search::SearchBox;

/// What the search minimizes.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Standard deviation of the one-step-ahead residuals
    #[value(name = "std")]
    ResidualStd,
    /// Mean cross-entropy of the line probabilities
    #[value(name = "entropy")]
    Entropy,
}

impl Objective {
    fn score(&self, m: &RatingMetrics) -> f64 {
        match self {
            Objective::ResidualStd => m.std_dev,
            Objective::Entropy => m.cross_entropy,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationOptions {
    pub objective: Objective,
    /// Latin-hypercube design points evaluated in stage one.
    pub design_points: usize,
    /// Acquisition-driven evaluations in stage two.
    pub refine_points: usize,
    /// RNG seed; equal seeds reproduce the whole search.
    pub seed: u64,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            objective: Objective::ResidualStd,
            design_points: 50,
            refine_points: 25,
            seed: 1720,
        }
    }
}

/// The winning vector and its scores.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    pub mode: Mode,
    pub params: HyperParams,
    pub objective_value: f64,
    pub metrics: RatingMetrics,
    pub evaluations: usize,
}

/// Search the mode's box for the hyperparameters minimizing the objective.
pub fn calibrate_mode(
    comparisons: &[Comparison],
    mode: Mode,
    opts: &CalibrationOptions,
) -> Result<CalibrationOutcome> {
    if comparisons.is_empty() {
        bail!("no comparisons to calibrate on; ingest games first");
    }
    if opts.design_points == 0 {
        bail!("calibration needs at least one design point");
    }

    let search_box = SearchBox::for_mode(mode);
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let total = opts.design_points + opts.refine_points;

    let mut history: Vec<([f64; 4], f64)> = Vec::with_capacity(total);
    let mut best: Option<(HyperParams, f64, RatingMetrics)> = None;

    let design = search::sample_lhs(opts.design_points, &mut rng);
    for (i, point) in design.into_iter().enumerate() {
        let (value, m) = evaluate(comparisons, mode, &search_box, point, opts.objective);
        info!(
            "mode={} design point {}/{}: objective={:.4}",
            mode.label(),
            i + 1,
            total,
            value
        );
        history.push((point, value));
        if best.as_ref().map_or(true, |(_, b, _)| value < *b) {
            best = Some((search_box.decode(point), value, m));
        }
    }

    for i in 0..opts.refine_points {
        let point = search::next_candidate(&history, &mut rng);
        let (value, m) = evaluate(comparisons, mode, &search_box, point, opts.objective);
        info!(
            "mode={} refinement point {}/{}: objective={:.4}",
            mode.label(),
            opts.design_points + i + 1,
            total,
            value
        );
        history.push((point, value));
        if best.as_ref().map_or(true, |(_, b, _)| value < *b) {
            best = Some((search_box.decode(point), value, m));
        }
    }

    // design_points >= 1, so at least one evaluation ran.
    let (params, objective_value, best_metrics) =
        best.ok_or_else(|| anyhow::anyhow!("search produced no evaluations"))?;
    debug!(
        "mode={} best of {} evaluations: k={:.4} bias={:.4} regress={:.4} smooth={:.4}",
        mode.label(),
        history.len(),
        params.k,
        params.bias,
        params.regress,
        params.smooth
    );

    Ok(CalibrationOutcome {
        mode,
        params,
        objective_value,
        metrics: best_metrics,
        evaluations: history.len(),
    })
}

fn evaluate(
    comparisons: &[Comparison],
    mode: Mode,
    search_box: &SearchBox,
    point: [f64; 4],
    objective: Objective,
) -> (f64, RatingMetrics) {
    let params = search_box.decode(point);
    let mut model = Melo::new(mode, params);
    model.fit(comparisons);
    let m = metrics::summarize(&model);
    (objective.score(&m), m)
}
