//! Summary statistics over a fitted model's one-step-ahead record.

use super::Melo;

/// Aggregate forecast quality for one fitted model.
#[derive(Debug, Clone, Copy)]
pub struct RatingMetrics {
    /// Standard deviation of the one-step-ahead residuals.
    pub std_dev: f64,
    /// Mean absolute one-step-ahead residual.
    pub mean_abs_err: f64,
    /// Mean binary cross-entropy of the line probabilities.
    pub cross_entropy: f64,
}

/// Summarize a fitted model. A model with no history scores zero across the
/// board; callers guard against fitting on empty data before this matters.
pub fn summarize(model: &Melo) -> RatingMetrics {
    let residuals = model.residuals();
    if residuals.is_empty() {
        return RatingMetrics {
            std_dev: 0.0,
            mean_abs_err: 0.0,
            cross_entropy: 0.0,
        };
    }
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
    let entropy = model.history().iter().map(|s| s.cross_entropy).sum::<f64>() / n;

    RatingMetrics {
        std_dev: var.sqrt(),
        mean_abs_err: mae,
        cross_entropy: entropy,
    }
}
