//! Parameter grid construction.
//!
//! Penalty grids (cost-complexity, ridge lambda, credibility k) span several
//! orders of magnitude, so the default builder is log-spaced. Grids are ordered
//! from the largest value (simplest model) down, matching how complexity paths
//! are usually reported.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive), descending.
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::new(
            2,
            format!("Invalid grid range: min={min}, max={max} (must be finite, >0, and max>min)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_max - step * i as f64).exp());
    }
    // Pin the endpoints exactly.
    out[0] = max;
    out[steps - 1] = min;
    Ok(out)
}

/// Parse an explicit grid such as `"0.1,0.01,0.001"`.
///
/// Order is preserved; duplicates are rejected because they would make the
/// score matrix ambiguous.
pub fn parse_grid(spec: &str) -> Result<Vec<f64>, AppError> {
    let mut out = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let v: f64 = part
            .parse()
            .map_err(|_| AppError::new(2, format!("Invalid grid value '{part}'.")))?;
        if !v.is_finite() || v < 0.0 {
            return Err(AppError::new(
                2,
                format!("Grid value {v} must be finite and >= 0."),
            ));
        }
        if out.contains(&v) {
            return Err(AppError::new(2, format!("Duplicate grid value {v}.")));
        }
        out.push(v);
    }
    if out.is_empty() {
        return Err(AppError::new(2, "Grid is empty."));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints_descending() {
        let v = log_space(0.001, 10.0, 5).unwrap();
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 10.0);
        assert_eq!(v[4], 0.001);
        assert!(v.windows(2).all(|w| w[0] > w[1]));
        assert!((v[2] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert!(log_space(0.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 1.0, 5).is_err());
        assert!(log_space(0.1, 1.0, 1).is_err());
    }

    #[test]
    fn parse_grid_keeps_order() {
        let g = parse_grid("0.1, 0.01,0.001").unwrap();
        assert_eq!(g, vec![0.1, 0.01, 0.001]);
    }

    #[test]
    fn parse_grid_rejects_garbage_and_duplicates() {
        assert!(parse_grid("0.1,abc").is_err());
        assert!(parse_grid("0.1,0.1").is_err());
        assert!(parse_grid("-1").is_err());
        assert!(parse_grid(" , ").is_err());
    }
}
