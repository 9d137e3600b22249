//! Statistical primitives for the correlation engine
//!
//! Pearson correlation with a two-sided p-value from Student's t
//! distribution. Failures are returned as a typed reason instead of being
//! swallowed, so callers can tell "not computable" from "not significant".

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;

/// Why a correlation could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CorrelationFailure {
    /// Fewer than three paired observations
    TooFewSamples { samples: usize },
    /// The two series have different lengths
    LengthMismatch { x: usize, y: usize },
    /// One of the series is constant
    ZeroVariance,
    /// A value or intermediate result was NaN or infinite
    NonFinite,
}

impl fmt::Display for CorrelationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationFailure::TooFewSamples { samples } => {
                write!(f, "too few samples ({})", samples)
            }
            CorrelationFailure::LengthMismatch { x, y } => {
                write!(f, "series length mismatch ({} vs {})", x, y)
            }
            CorrelationFailure::ZeroVariance => write!(f, "zero variance in input series"),
            CorrelationFailure::NonFinite => write!(f, "non-finite values in input series"),
        }
    }
}

/// A computed Pearson correlation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PearsonResult {
    /// Correlation coefficient in [-1, 1]
    pub coefficient: f64,
    /// Two-sided p-value for the null hypothesis of no correlation
    pub p_value: f64,
    /// Number of paired observations
    pub samples: usize,
}

/// Outcome of a correlation attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrelationOutcome {
    Computed(PearsonResult),
    Failed(CorrelationFailure),
}

impl CorrelationOutcome {
    pub fn is_computed(&self) -> bool {
        matches!(self, CorrelationOutcome::Computed(_))
    }
}

impl From<Result<PearsonResult, CorrelationFailure>> for CorrelationOutcome {
    fn from(result: Result<PearsonResult, CorrelationFailure>) -> Self {
        match result {
            Ok(pearson) => CorrelationOutcome::Computed(pearson),
            Err(failure) => CorrelationOutcome::Failed(failure),
        }
    }
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Pearson correlation coefficient and two-sided p-value
pub fn pearson(x: &[f64], y: &[f64]) -> Result<PearsonResult, CorrelationFailure> {
    if x.len() != y.len() {
        return Err(CorrelationFailure::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    let n = x.len();
    if n < 3 {
        return Err(CorrelationFailure::TooFewSamples { samples: n });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(CorrelationFailure::NonFinite);
    }

    // Two-pass over centred values; the one-pass sum-of-squares form loses
    // precision on large, nearly constant inputs.
    let mean_x = mean(x).ok_or(CorrelationFailure::TooFewSamples { samples: n })?;
    let mean_y = mean(y).ok_or(CorrelationFailure::TooFewSamples { samples: n })?;

    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_yy = 0.0;
    for (xv, yv) in x.iter().zip(y.iter()) {
        let dx = xv - mean_x;
        let dy = yv - mean_y;
        sum_xy += dx * dy;
        sum_xx += dx * dx;
        sum_yy += dy * dy;
    }

    // Sums of squared deviations below the rounding noise of the mean
    let samples = n as f64;
    let noise_floor = |mean: f64| samples * (samples * f64::EPSILON * mean.abs().max(1.0)).powi(2);
    if sum_xx <= noise_floor(mean_x) || sum_yy <= noise_floor(mean_y) {
        return Err(CorrelationFailure::ZeroVariance);
    }

    let coefficient = (sum_xy / (sum_xx * sum_yy).sqrt()).clamp(-1.0, 1.0);
    if !coefficient.is_finite() {
        return Err(CorrelationFailure::NonFinite);
    }

    let p_value = two_sided_p_value(coefficient, n)?;

    Ok(PearsonResult {
        coefficient,
        p_value,
        samples: n,
    })
}

/// p-value of `t = r * sqrt((n - 2) / (1 - r^2))` under Student's t with
/// `n - 2` degrees of freedom
fn two_sided_p_value(coefficient: f64, n: usize) -> Result<f64, CorrelationFailure> {
    let degrees_of_freedom = (n - 2) as f64;
    let denominator = 1.0 - coefficient * coefficient;
    if denominator <= 0.0 {
        // Perfect linear relationship
        return Ok(0.0);
    }

    let t_stat = coefficient * (degrees_of_freedom / denominator).sqrt();
    let distribution = StudentsT::new(0.0, 1.0, degrees_of_freedom)
        .map_err(|_| CorrelationFailure::TooFewSamples { samples: n })?;

    let p_value = 2.0 * (1.0 - distribution.cdf(t_stat.abs()));
    if !p_value.is_finite() {
        return Err(CorrelationFailure::NonFinite);
    }

    Ok(p_value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {} to be within {} of {}",
            actual,
            tolerance,
            expected
        );
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0, 6.0]), Some(4.0));
    }

    #[test]
    fn test_perfect_positive_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        let result = pearson(&x, &y).unwrap();

        assert_close(result.coefficient, 1.0, 1e-12);
        assert_close(result.p_value, 0.0, 1e-9);
        assert_eq!(result.samples, 5);
    }

    #[test]
    fn test_perfect_negative_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [8.0, 6.0, 4.0, 2.0];
        let result = pearson(&x, &y).unwrap();
        assert_close(result.coefficient, -1.0, 1e-12);
    }

    #[test]
    fn test_known_coefficient_and_p_value() {
        // r = 0.8, n = 5 -> t = 0.8 * sqrt(3 / 0.36) = 2.3094, p = 0.1041
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let result = pearson(&x, &y).unwrap();

        assert_close(result.coefficient, 0.8, 1e-12);
        assert_close(result.p_value, 0.1041, 1e-3);
    }

    #[test]
    fn test_uncorrelated_series() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 3.0, 1.0, 2.0];
        let result = pearson(&x, &y).unwrap();

        assert_close(result.coefficient, 0.0, 1e-12);
        assert_close(result.p_value, 1.0, 1e-9);
    }

    #[test]
    fn test_zero_variance_fails() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [-5.0; 5];
        assert_eq!(pearson(&x, &y), Err(CorrelationFailure::ZeroVariance));
        assert_eq!(pearson(&y, &x), Err(CorrelationFailure::ZeroVariance));
    }

    #[test]
    fn test_variance_guard_is_scale_aware() {
        // Tiny but genuine spread is still correlated
        let x = [1e-9, 2e-9, 3e-9, 4e-9, 5e-9];
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let result = pearson(&x, &y).unwrap();
        assert_close(result.coefficient, 0.8, 1e-9);

        // Rounding noise around a constant is not
        let flat = [0.1; 7];
        let z = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(pearson(&flat, &z), Err(CorrelationFailure::ZeroVariance));
    }

    #[test]
    fn test_too_few_samples_and_mismatch() {
        assert_eq!(
            pearson(&[1.0, 2.0], &[1.0, 2.0]),
            Err(CorrelationFailure::TooFewSamples { samples: 2 })
        );
        assert_eq!(
            pearson(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
            Err(CorrelationFailure::LengthMismatch { x: 3, y: 2 })
        );
    }

    #[test]
    fn test_non_finite_input() {
        let x = [1.0, 2.0, f64::NAN, 4.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(pearson(&x, &y), Err(CorrelationFailure::NonFinite));
    }

    #[test]
    fn test_outcome_conversion() {
        let outcome: CorrelationOutcome = pearson(&[1.0, 2.0, 3.0], &[3.0, 3.0, 3.0]).into();
        assert!(!outcome.is_computed());
        assert_eq!(
            outcome,
            CorrelationOutcome::Failed(CorrelationFailure::ZeroVariance)
        );
    }

    #[test]
    fn test_failure_serializes_with_reason_tag() {
        let json = serde_json::to_string(&CorrelationFailure::ZeroVariance).unwrap();
        assert_eq!(json, r#"{"reason":"zero_variance"}"#);
    }
}
