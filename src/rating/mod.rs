//! Margin-dependent Elo ratings for paired comparisons.
//!
//! Classic Elo predicts a single win probability per matchup. This model
//! instead rates each team against a ladder of handicap lines, so a matchup
//! produces a full survival curve `P(value > line)`: enough to forecast
//! point-spread and game-total distributions, not just winners.
//!
//! Two symmetry modes:
//! - **Fermi**: the compared value is antisymmetric under home/away
//!   interchange (point spreads). A team's rating at line `l` plays against
//!   the opponent's rating at `-l`, and updates push the two apart.
//! - **Bose**: the value is symmetric (game totals). Ratings at the same
//!   line add, and updates move both teams together.
//!
//! Fitting walks the comparisons in date order and records the forecast for
//! each game *before* updating on its outcome, so the stored residuals are
//! honest one-step-ahead errors.

pub mod metrics;

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Probability clamp for logit/log computations.
const EPS: f64 = 1e-6;

/// Idle gap (days) after which a team's rating regresses toward the prior.
/// Anything shorter is an in-season gap and leaves the rating untouched;
/// anything longer is treated as an off-season break.
const REGRESS_GAP_DAYS: i64 = 140;

/// Symmetry of the compared value under home/away interchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Antisymmetric values (point spreads): swapping teams negates the value.
    Fermi,
    /// Symmetric values (game totals): swapping teams leaves the value fixed.
    Bose,
}

impl Mode {
    /// Handicap-line ladder used for this mode.
    ///
    /// Spreads span every half-point from -60.5 to +60.5; totals span
    /// -115.5 to +299.5. Half-point lines never push against an integer
    /// score, so `value > line` is unambiguous.
    pub fn lines(self) -> Vec<f64> {
        match self {
            Mode::Fermi => (0..122).map(|i| -60.5 + i as f64).collect(),
            Mode::Bose => (0..416).map(|i| -115.5 + i as f64).collect(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Fermi => "fermi",
            Mode::Bose => "bose",
        }
    }
}

/// Hyperparameters controlling the rating dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    /// Rating update step per comparison.
    pub k: f64,
    /// Constant home advantage added to every predicted logit.
    pub bias: f64,
    /// Fraction of a rating retained across an off-season gap
    /// (1.0 = no regression, 0.0 = full reset to the prior).
    pub regress: f64,
    /// Scale over which the binary outcome is softened across nearby lines
    /// (0.0 = hard step).
    pub smooth: f64,
}

impl HyperParams {
    pub fn as_array(&self) -> [f64; 4] {
        [self.k, self.bias, self.regress, self.smooth]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        Self {
            k: values[0],
            bias: values[1],
            regress: values[2],
            smooth: values[3],
        }
    }
}

/// A single dated paired comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub date: NaiveDate,
    /// First label (the home side).
    pub label1: String,
    /// Second label (the away side).
    pub label2: String,
    /// Observed value: spread (Fermi) or total (Bose).
    pub value: f64,
}

/// One-step-ahead record captured during fitting, before the update.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub observed: f64,
    pub predicted_mean: f64,
    /// Mean binary cross-entropy of the line probabilities for this game.
    pub cross_entropy: f64,
}

/// Matchup forecast: the full survival curve plus point summaries.
#[derive(Debug, Clone)]
pub struct Forecast {
    lines: Vec<f64>,
    survival: Vec<f64>,
    pub mean: f64,
    pub median: f64,
}

impl Forecast {
    /// Interpolated `P(value > x)`.
    pub fn prob_above(&self, x: f64) -> f64 {
        let n = self.lines.len();
        if x <= self.lines[0] {
            return self.survival[0];
        }
        if x >= self.lines[n - 1] {
            return self.survival[n - 1];
        }
        let mut i = 0;
        while i + 1 < n && self.lines[i + 1] < x {
            i += 1;
        }
        let t = (x - self.lines[i]) / (self.lines[i + 1] - self.lines[i]);
        self.survival[i] + t * (self.survival[i + 1] - self.survival[i])
    }
}

#[derive(Debug, Clone)]
struct RatingState {
    vector: Vec<f64>,
    last_seen: NaiveDate,
}

/// The rating model itself. Construct, `fit` on chronological comparisons,
/// then query forecasts, residuals, and rankings.
#[derive(Debug, Clone)]
pub struct Melo {
    mode: Mode,
    params: HyperParams,
    lines: Vec<f64>,
    /// Per-line prior rating, derived from sample outcome frequencies.
    prior: Vec<f64>,
    ratings: HashMap<String, RatingState>,
    history: Vec<StepRecord>,
}

impl Melo {
    pub fn new(mode: Mode, params: HyperParams) -> Self {
        let lines = mode.lines();
        Self {
            mode,
            params,
            prior: vec![0.0; lines.len()],
            lines,
            ratings: HashMap::new(),
            history: Vec::new(),
        }
    }

    /// Override the default line ladder. Lines must be strictly ascending;
    /// Fermi mode additionally expects them symmetric about zero so each
    /// line has a mirror.
    pub fn with_lines(mode: Mode, params: HyperParams, lines: Vec<f64>) -> Self {
        debug_assert!(lines.windows(2).all(|w| w[0] < w[1]), "lines not ascending");
        Self {
            mode,
            params,
            prior: vec![0.0; lines.len()],
            lines,
            ratings: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    /// One-step-ahead residuals (observed − predicted mean), one per game.
    pub fn residuals(&self) -> Vec<f64> {
        self.history
            .iter()
            .map(|r| r.observed - r.predicted_mean)
            .collect()
    }

    /// Index of the opponent-side line paired with line `i`.
    fn conjugate(&self, i: usize) -> usize {
        match self.mode {
            Mode::Fermi => self.lines.len() - 1 - i,
            Mode::Bose => i,
        }
    }

    /// Sequentially fit the model. Comparisons are sorted by date first, so
    /// callers may pass them in any order. Refitting replaces all state.
    pub fn fit(&mut self, comparisons: &[Comparison]) {
        self.ratings.clear();
        self.history.clear();
        if comparisons.is_empty() {
            return;
        }

        let mut ordered: Vec<&Comparison> = comparisons.iter().collect();
        ordered.sort_by_key(|c| c.date);

        self.prior = self.prior_from_sample(&ordered);

        for cmp in ordered {
            let r1 = self.current_vector(&cmp.label1, cmp.date);
            let r2 = self.current_vector(&cmp.label2, cmp.date);
            let survival = self.survival_from(&r1, &r2);

            let predicted_mean = mean_from_survival(&self.lines, &survival);
            let cross_entropy = self.game_cross_entropy(&survival, cmp.value);
            self.history.push(StepRecord {
                observed: cmp.value,
                predicted_mean,
                cross_entropy,
            });

            self.update(cmp, r1, r2, &survival);
        }
    }

    /// Forecast the value distribution for a matchup at the given date,
    /// using ratings as of the end of the fitted history. Unseen labels
    /// fall back to the prior (an average team).
    pub fn forecast(&self, date: NaiveDate, label1: &str, label2: &str) -> Forecast {
        let r1 = self.current_vector(label1, date);
        let r2 = self.current_vector(label2, date);
        let survival = self.survival_from(&r1, &r2);
        Forecast {
            mean: mean_from_survival(&self.lines, &survival),
            median: median_from_survival(&self.lines, &survival),
            survival,
            lines: self.lines.clone(),
        }
    }

    /// Every rated label with its forecast mean against an average (prior)
    /// opponent at the given date, strongest first.
    pub fn rank(&self, date: NaiveDate) -> Vec<(String, f64)> {
        let prior = self.prior.clone();
        let mut table: Vec<(String, f64)> = self
            .ratings
            .keys()
            .map(|label| {
                let r1 = self.current_vector(label, date);
                let survival = self.survival_from(&r1, &prior);
                (label.clone(), mean_from_survival(&self.lines, &survival))
            })
            .collect();
        table.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        table
    }

    // ── Fitting internals ────────────────────────────────────────────────────

    /// Prior rating vector: half the logit of the sample frequency of
    /// `value > line`. Two prior-rated teams then predict the league-average
    /// survival curve at every line.
    fn prior_from_sample(&self, ordered: &[&Comparison]) -> Vec<f64> {
        let n = ordered.len() as f64;
        self.lines
            .iter()
            .map(|&line| {
                let above = ordered.iter().filter(|c| c.value > line).count() as f64;
                logit(above / n) / 2.0
            })
            .collect()
    }

    /// A label's rating vector as of `date`: the stored vector regressed
    /// toward the prior when the idle gap spans an off-season, or the prior
    /// itself for labels never seen.
    fn current_vector(&self, label: &str, date: NaiveDate) -> Vec<f64> {
        match self.ratings.get(label) {
            None => self.prior.clone(),
            Some(state) => {
                let gap = (date - state.last_seen).num_days();
                if gap < REGRESS_GAP_DAYS {
                    state.vector.clone()
                } else {
                    state
                        .vector
                        .iter()
                        .zip(self.prior.iter())
                        .map(|(&r, &p)| p + self.params.regress * (r - p))
                        .collect()
                }
            }
        }
    }

    /// Predicted survival curve for label1's value given both rating vectors.
    fn survival_from(&self, r1: &[f64], r2: &[f64]) -> Vec<f64> {
        (0..self.lines.len())
            .map(|i| {
                let j = self.conjugate(i);
                let z = match self.mode {
                    Mode::Fermi => r1[i] - r2[j],
                    Mode::Bose => r1[i] + r2[j],
                };
                sigmoid(z + self.params.bias)
            })
            .collect()
    }

    /// Smoothed observed outcome at every line for the given value.
    fn outcomes(&self, value: f64) -> Vec<f64> {
        self.lines
            .iter()
            .map(|&line| smoothed_outcome(value, line, self.params.smooth))
            .collect()
    }

    fn game_cross_entropy(&self, survival: &[f64], value: f64) -> f64 {
        let total: f64 = self
            .lines
            .iter()
            .zip(survival.iter())
            .map(|(&line, &p)| {
                let p = p.clamp(EPS, 1.0 - EPS);
                if value > line {
                    -p.ln()
                } else {
                    -(1.0 - p).ln()
                }
            })
            .sum();
        total / self.lines.len() as f64
    }

    fn update(&mut self, cmp: &Comparison, mut r1: Vec<f64>, mut r2: Vec<f64>, survival: &[f64]) {
        let outcomes = self.outcomes(cmp.value);
        for i in 0..self.lines.len() {
            let err = outcomes[i] - survival[i];
            let j = self.conjugate(i);
            r1[i] += self.params.k * err;
            match self.mode {
                Mode::Fermi => r2[j] -= self.params.k * err,
                Mode::Bose => r2[j] += self.params.k * err,
            }
        }
        self.ratings.insert(
            cmp.label1.clone(),
            RatingState {
                vector: r1,
                last_seen: cmp.date,
            },
        );
        self.ratings.insert(
            cmp.label2.clone(),
            RatingState {
                vector: r2,
                last_seen: cmp.date,
            },
        );
    }
}

// ── Math utilities ───────────────────────────────────────────────────────────

/// Numerically stable logistic sigmoid.
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

pub(crate) fn logit(p: f64) -> f64 {
    let p = p.clamp(EPS, 1.0 - EPS);
    (p / (1.0 - p)).ln()
}

/// Softened `value > line` indicator: a logistic ramp of scale `smooth`
/// centered on the value, collapsing to a hard step at `smooth == 0`.
fn smoothed_outcome(value: f64, line: f64, smooth: f64) -> f64 {
    if smooth <= 0.0 {
        if value > line {
            1.0
        } else {
            0.0
        }
    } else {
        sigmoid((value - line) / smooth)
    }
}

/// Distribution mean from a survival curve: `E[V] = l_0 + ∫ S(l) dl` by the
/// trapezoid rule, valid while the distribution is contained in the ladder.
fn mean_from_survival(lines: &[f64], survival: &[f64]) -> f64 {
    let mut mean = lines[0];
    for i in 0..lines.len() - 1 {
        mean += 0.5 * (survival[i] + survival[i + 1]) * (lines[i + 1] - lines[i]);
    }
    mean
}

/// Distribution median: the interpolated line where the survival curve
/// crosses one half.
fn median_from_survival(lines: &[f64], survival: &[f64]) -> f64 {
    let n = lines.len();
    if survival[0] < 0.5 {
        return lines[0];
    }
    for i in 0..n - 1 {
        if survival[i] >= 0.5 && survival[i + 1] < 0.5 {
            let t = (survival[i] - 0.5) / (survival[i] - survival[i + 1]);
            return lines[i] + t * (lines[i + 1] - lines[i]);
        }
    }
    lines[n - 1]
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn cmp(date: &str, home: &str, away: &str, value: f64) -> Comparison {
        Comparison {
            date: d(date),
            label1: home.into(),
            label2: away.into(),
            value,
        }
    }

    fn small_params() -> HyperParams {
        HyperParams {
            k: 0.1,
            bias: 0.0,
            regress: 0.6,
            smooth: 0.0,
        }
    }

    fn small_lines() -> Vec<f64> {
        (0..22).map(|i| -10.5 + i as f64).collect()
    }

    /// Alternating home/away schedule between a strong and a weak team.
    fn lopsided_schedule(games: usize, margin: f64) -> Vec<Comparison> {
        (0..games)
            .map(|i| {
                let date = d("2023-10-01") + chrono::Duration::days(i as i64 * 2);
                if i % 2 == 0 {
                    cmp(&date.to_string(), "STR", "WEA", margin)
                } else {
                    cmp(&date.to_string(), "WEA", "STR", -margin)
                }
            })
            .collect()
    }

    #[test]
    fn sigmoid_matches_logit_inverse() {
        for p in [0.05, 0.3, 0.5, 0.77, 0.99] {
            assert_relative_eq!(sigmoid(logit(p)), p, epsilon = 1e-9);
        }
    }

    #[test]
    fn smoothed_outcome_is_step_when_smooth_zero() {
        assert_relative_eq!(smoothed_outcome(3.0, 2.5, 0.0), 1.0);
        assert_relative_eq!(smoothed_outcome(3.0, 3.5, 0.0), 0.0);
    }

    #[test]
    fn smoothed_outcome_softens_near_the_value() {
        let near = smoothed_outcome(3.0, 2.5, 5.0);
        let far = smoothed_outcome(3.0, -9.5, 5.0);
        assert!(near > 0.5 && near < 0.7, "near-line outcome soft, got {:.3}", near);
        assert!(far > 0.9, "far-below line should be near 1, got {:.3}", far);
    }

    #[test]
    fn mean_from_survival_recovers_point_mass() {
        let lines: Vec<f64> = (0..6).map(|i| -2.5 + i as f64).collect();
        // Point mass at 0: value exceeds every negative line only.
        let sf = vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let mean = mean_from_survival(&lines, &sf);
        assert!(mean.abs() < 0.6, "point mass at 0 gave mean {:.3}", mean);
    }

    #[test]
    fn median_crosses_at_half() {
        let lines = vec![-1.5, -0.5, 0.5, 1.5];
        let sf = vec![1.0, 0.75, 0.25, 0.0];
        // Crossing halfway between -0.5 and 0.5.
        assert_relative_eq!(median_from_survival(&lines, &sf), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn unseen_labels_forecast_the_league_average() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        // Balanced sample: every margin appears with both signs.
        let games = vec![
            cmp("2023-10-01", "A", "B", 4.0),
            cmp("2023-10-02", "B", "A", -4.0),
            cmp("2023-10-03", "A", "B", 2.0),
            cmp("2023-10-04", "B", "A", -2.0),
        ];
        melo.fit(&games);
        let fc = melo.forecast(d("2023-11-01"), "X", "Y");
        assert!(
            fc.mean.abs() < 0.8,
            "two unseen teams should forecast near zero, got {:.3}",
            fc.mean
        );
    }

    #[test]
    fn stronger_team_earns_positive_spread_forecast() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        melo.fit(&lopsided_schedule(30, 6.0));
        let fc = melo.forecast(d("2024-01-15"), "STR", "WEA");
        assert!(
            fc.mean > 1.0,
            "strong team should be favored by a clear margin, got {:.3}",
            fc.mean
        );
        assert!(fc.prob_above(0.0) > 0.6);
    }

    #[test]
    fn fermi_forecast_is_antisymmetric() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        melo.fit(&lopsided_schedule(30, 6.0));
        let ab = melo.forecast(d("2024-01-15"), "STR", "WEA");
        let ba = melo.forecast(d("2024-01-15"), "WEA", "STR");
        assert_relative_eq!(ab.mean, -ba.mean, epsilon = 1e-6);
    }

    #[test]
    fn home_bias_shifts_the_forecast_up() {
        let mut flat = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        let mut biased = Melo::with_lines(
            Mode::Fermi,
            HyperParams {
                bias: 0.4,
                ..small_params()
            },
            small_lines(),
        );
        let games = lopsided_schedule(10, 4.0);
        flat.fit(&games);
        biased.fit(&games);
        let f0 = flat.forecast(d("2023-12-01"), "STR", "WEA");
        let f1 = biased.forecast(d("2023-12-01"), "STR", "WEA");
        assert!(
            f1.mean > f0.mean,
            "bias should raise the home forecast: {:.3} vs {:.3}",
            f1.mean,
            f0.mean
        );
    }

    #[test]
    fn bose_totals_rise_for_high_scoring_teams() {
        let lines: Vec<f64> = (0..61).map(|i| 149.5 + i as f64).collect();
        let params = HyperParams {
            k: 0.1,
            bias: 0.0,
            regress: 0.7,
            smooth: 0.0,
        };
        let mut melo = Melo::with_lines(Mode::Bose, params, lines);
        let mut games = Vec::new();
        for i in 0..20 {
            let date = d("2023-10-01") + chrono::Duration::days(i * 2);
            // Pace-and-space teams combine for 200, grinders for 160.
            games.push(cmp(&date.to_string(), "RUN", "GUN", 200.0));
            games.push(cmp(&date.to_string(), "GRD", "SLW", 160.0));
        }
        melo.fit(&games);
        let hot = melo.forecast(d("2023-12-15"), "RUN", "GUN");
        let cold = melo.forecast(d("2023-12-15"), "GRD", "SLW");
        assert!(
            hot.mean > cold.mean + 10.0,
            "fast pairing should forecast well above slow pairing: {:.1} vs {:.1}",
            hot.mean,
            cold.mean
        );
    }

    #[test]
    fn off_season_gap_regresses_toward_the_prior() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        melo.fit(&lopsided_schedule(30, 6.0));
        let last = d("2023-10-01") + chrono::Duration::days(29 * 2);
        let in_season = melo.forecast(last + chrono::Duration::days(7), "STR", "WEA");
        let next_season = melo.forecast(last + chrono::Duration::days(200), "STR", "WEA");
        assert!(
            next_season.mean < in_season.mean,
            "a 200-day gap should shrink the edge: {:.3} vs {:.3}",
            next_season.mean,
            in_season.mean
        );
        assert!(
            next_season.mean > 0.0,
            "partial regression should keep some edge, got {:.3}",
            next_season.mean
        );
    }

    #[test]
    fn residuals_are_one_per_game_and_shrink_with_learning() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        let games = lopsided_schedule(40, 6.0);
        melo.fit(&games);
        let res = melo.residuals();
        assert_eq!(res.len(), games.len());
        // Later one-step-ahead errors should be smaller than the cold start.
        let early: f64 = res[..5].iter().map(|r| r.abs()).sum::<f64>() / 5.0;
        let late: f64 = res[res.len() - 5..].iter().map(|r| r.abs()).sum::<f64>() / 5.0;
        assert!(
            late < early,
            "learning should reduce |residual|: early {:.3}, late {:.3}",
            early,
            late
        );
    }

    #[test]
    fn fit_handles_unsorted_input() {
        let mut sorted = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        let mut shuffled = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        let games = lopsided_schedule(12, 4.0);
        let mut reversed = games.clone();
        reversed.reverse();
        sorted.fit(&games);
        shuffled.fit(&reversed);
        let a = sorted.forecast(d("2023-12-01"), "STR", "WEA");
        let b = shuffled.forecast(d("2023-12-01"), "STR", "WEA");
        assert_relative_eq!(a.mean, b.mean, epsilon = 1e-9);
    }

    #[test]
    fn rank_orders_strong_above_weak() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        melo.fit(&lopsided_schedule(30, 6.0));
        let table = melo.rank(d("2024-01-15"));
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].0, "STR");
        assert!(table[0].1 > table[1].1);
    }

    #[test]
    fn forecast_prob_above_is_monotone_decreasing() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        melo.fit(&lopsided_schedule(20, 4.0));
        let fc = melo.forecast(d("2023-12-01"), "STR", "WEA");
        let mut prev = fc.prob_above(-10.0);
        for x in [-5.0, -1.0, 0.0, 1.0, 5.0, 10.0] {
            let p = fc.prob_above(x);
            assert!(p <= prev + 1e-12, "survival must not increase at {}", x);
            prev = p;
        }
    }

    #[test]
    fn empty_fit_is_a_no_op() {
        let mut melo = Melo::with_lines(Mode::Fermi, small_params(), small_lines());
        melo.fit(&[]);
        assert!(melo.history().is_empty());
        assert!(melo.residuals().is_empty());
    }
}
