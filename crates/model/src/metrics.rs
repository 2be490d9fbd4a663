//! Evaluation metrics over a backtest batch.

use serde::{Deserialize, Serialize};

use airsense_core::numeric::{mean, round_dp};

/// Model quality over a batch of `(actual, predicted)` pairs, rounded the
/// way the dashboard reports them (MAE/RMSE to 2 decimals, R² to 3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub n_samples: usize,
}

impl Metrics {
    /// Compute MAE, RMSE and R² over paired slices of equal, non-zero length.
    pub fn from_pairs(actual: &[f64], predicted: &[f64]) -> Self {
        debug_assert_eq!(actual.len(), predicted.len());
        debug_assert!(!actual.is_empty());

        let n = actual.len() as f64;
        let mae = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).abs())
            .sum::<f64>()
            / n;

        let ss_res = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p) * (a - p))
            .sum::<f64>();
        let rmse = (ss_res / n).sqrt();

        let y_mean = mean(actual);
        let ss_tot = actual.iter().map(|a| (a - y_mean) * (a - y_mean)).sum::<f64>();
        // Constant actuals make R² undefined; report 0 rather than ±inf.
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            mae: round_dp(mae, 2),
            rmse: round_dp(rmse, 2),
            r2: round_dp(r2, 3),
            n_samples: actual.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_batch() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [1.1, 1.8, 3.3];
        let m = Metrics::from_pairs(&actual, &predicted);

        assert_eq!(m.mae, 0.2);
        // sqrt(0.14 / 3) = 0.2160...
        assert_eq!(m.rmse, 0.22);
        // 1 - 0.14 / 2.0
        assert_eq!(m.r2, 0.93);
        assert_eq!(m.n_samples, 3);
    }

    #[test]
    fn perfect_predictions() {
        let m = Metrics::from_pairs(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn constant_actuals_do_not_blow_up() {
        let m = Metrics::from_pairs(&[2.0, 2.0], &[1.0, 3.0]);
        assert_eq!(m.r2, 0.0);
    }
}
