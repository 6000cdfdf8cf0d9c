//! Poisson and Gamma deviance.
//!
//! ```text
//! Poisson: D = 2 Σ w_i (y_i ln(y_i/ŷ_i) - (y_i - ŷ_i))      y ln y -> 0 at y = 0
//! Gamma:   D = 2 Σ w_i (-ln(y_i/ŷ_i) + (y_i - ŷ_i)/ŷ_i)
//! ```
//!
//! Missing responses (`NaN`) drop out of both the sum and the count. The scaled
//! form divides by the number of observed responses, not by the weight sum.

use crate::domain::Family;
use crate::error::CvError;

/// Deviance for `family`. `weights = None` means unit weights.
pub fn deviance(
    family: Family,
    y: &[f64],
    yhat: &[f64],
    weights: Option<&[f64]>,
    scaled: bool,
) -> Result<f64, CvError> {
    check_lengths(y, yhat, weights)?;

    if let Some((i, v)) = yhat
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v > 0.0))
    {
        return Err(CvError::domain(format!(
            "Predicted mean at index {i} is {v}; predictions must be finite and > 0."
        )));
    }
    if let Some(w) = weights {
        if let Some((i, v)) = w.iter().enumerate().find(|(_, v)| !(v.is_finite() && **v >= 0.0)) {
            return Err(CvError::domain(format!(
                "Weight at index {i} is {v}; weights must be finite and >= 0."
            )));
        }
    }

    let mut total = 0.0;
    let mut count = 0usize;
    for i in 0..y.len() {
        let yi = y[i];
        if yi.is_nan() {
            continue;
        }
        let mu = yhat[i];
        let wi = weights.map_or(1.0, |w| w[i]);
        let unit = match family {
            Family::Poisson => {
                if !(yi.is_finite() && yi >= 0.0) {
                    return Err(CvError::domain(format!(
                        "Poisson response at index {i} is {yi}; must be >= 0."
                    )));
                }
                poisson_unit(yi, mu)
            }
            Family::Gamma => {
                if !(yi.is_finite() && yi > 0.0) {
                    return Err(CvError::domain(format!(
                        "Gamma response at index {i} is {yi}; must be > 0."
                    )));
                }
                gamma_unit(yi, mu)
            }
        };
        total += wi * unit;
        count += 1;
    }

    if count == 0 {
        return Err(CvError::domain("No observed responses to score."));
    }

    let d = 2.0 * total;
    Ok(if scaled { d / count as f64 } else { d })
}

pub fn poisson_deviance(
    y: &[f64],
    yhat: &[f64],
    weights: Option<&[f64]>,
    scaled: bool,
) -> Result<f64, CvError> {
    deviance(Family::Poisson, y, yhat, weights, scaled)
}

pub fn gamma_deviance(
    y: &[f64],
    yhat: &[f64],
    weights: Option<&[f64]>,
    scaled: bool,
) -> Result<f64, CvError> {
    deviance(Family::Gamma, y, yhat, weights, scaled)
}

fn poisson_unit(y: f64, mu: f64) -> f64 {
    let log_term = if y == 0.0 { 0.0 } else { y * (y / mu).ln() };
    log_term - (y - mu)
}

fn gamma_unit(y: f64, mu: f64) -> f64 {
    -(y / mu).ln() + (y - mu) / mu
}

fn check_lengths(y: &[f64], yhat: &[f64], weights: Option<&[f64]>) -> Result<(), CvError> {
    if yhat.len() != y.len() {
        return Err(CvError::InputLengthMismatch {
            what: "predictions",
            expected: y.len(),
            actual: yhat.len(),
        });
    }
    if let Some(w) = weights {
        if w.len() != y.len() {
            return Err(CvError::InputLengthMismatch {
                what: "weights",
                expected: y.len(),
                actual: w.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisson_matches_hand_computation() {
        let y = [0.0, 2.0, 4.0, 0.0, 6.0];
        let yhat = [1.0; 5];
        let expected = 2.0
            * ((0.0 - (0.0 - 1.0))
                + (2.0 * 2f64.ln() - (2.0 - 1.0))
                + (4.0 * 4f64.ln() - (4.0 - 1.0))
                + (0.0 - (0.0 - 1.0))
                + (6.0 * 6f64.ln() - (6.0 - 1.0)));

        let d = poisson_deviance(&y, &yhat, None, false).unwrap();
        assert!(((d - expected) / expected).abs() < 1e-9, "d={d} expected={expected}");

        let scaled = poisson_deviance(&y, &yhat, None, true).unwrap();
        assert!(((scaled - expected / 5.0) / expected).abs() < 1e-9);
    }

    #[test]
    fn perfect_fit_has_zero_deviance() {
        let counts = [1.0, 3.0, 7.0, 2.0];
        assert!(poisson_deviance(&counts, &counts, None, true).unwrap().abs() < 1e-12);

        let severities = [120.0, 80.5, 3000.0];
        assert!(gamma_deviance(&severities, &severities, None, true).unwrap().abs() < 1e-12);
    }

    #[test]
    fn deviance_is_non_negative() {
        let y = [0.0, 1.0, 5.0, 2.0, 0.0, 9.0];
        let yhat = [0.3, 2.0, 1.1, 2.5, 0.01, 4.0];
        let w = [1.0, 0.5, 2.0, 1.0, 3.0, 0.2];
        assert!(poisson_deviance(&y, &yhat, Some(&w), false).unwrap() >= 0.0);

        let y = [10.0, 200.0, 35.0];
        let yhat = [50.0, 60.0, 70.0];
        assert!(gamma_deviance(&y, &yhat, Some(&w[..3]), true).unwrap() >= 0.0);
    }

    #[test]
    fn scaled_divides_by_observation_count_not_weight_sum() {
        let y = [2.0, 0.0];
        let yhat = [1.0, 1.0];
        let w = [4.0, 4.0];
        let raw = poisson_deviance(&y, &yhat, Some(&w), false).unwrap();
        let scaled = poisson_deviance(&y, &yhat, Some(&w), true).unwrap();
        assert!((scaled - raw / 2.0).abs() < 1e-12);
    }

    #[test]
    fn missing_responses_are_excluded_from_sum_and_count() {
        let with_missing = poisson_deviance(&[2.0, f64::NAN, 0.0], &[1.0, 5.0, 1.0], None, true).unwrap();
        let without = poisson_deviance(&[2.0, 0.0], &[1.0, 1.0], None, true).unwrap();
        assert!((with_missing - without).abs() < 1e-12);
    }

    #[test]
    fn non_positive_prediction_is_a_domain_error() {
        let err = poisson_deviance(&[1.0, 2.0], &[1.0, 0.0], None, true).unwrap_err();
        assert!(matches!(err, CvError::DomainError(_)));
    }

    #[test]
    fn length_mismatch_is_reported() {
        let err = gamma_deviance(&[1.0, 2.0], &[1.0], None, true).unwrap_err();
        assert!(matches!(err, CvError::InputLengthMismatch { what: "predictions", .. }));

        let err = gamma_deviance(&[1.0], &[1.0], Some(&[1.0, 1.0]), true).unwrap_err();
        assert!(matches!(err, CvError::InputLengthMismatch { what: "weights", .. }));
    }

    #[test]
    fn response_support_is_enforced() {
        assert!(poisson_deviance(&[-1.0], &[1.0], None, true).is_err());
        assert!(gamma_deviance(&[0.0], &[1.0], None, true).is_err());
    }
}
