//! Weighted and ridge-penalized least squares.
//!
//! The GLM learner solves one of these per IRLS step:
//!
//! ```text
//! minimize Σ w_i (z_i - x_i^T β)^2 + λ Σ_{j in penalized} β_j^2
//! ```
//!
//! We scale rows by `sqrt(w_i)`, append `sqrt(λ) e_j` pseudo-rows for each
//! penalized coefficient, and solve the resulting ordinary least squares problem
//! with SVD (nalgebra's `QR::solve` only handles square systems).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted ridge regression via an augmented design.
///
/// `penalized[j]` says whether column `j` receives the `lambda` penalty
/// (the intercept normally does not).
pub fn solve_ridge(
    x: &DMatrix<f64>,
    z: &DVector<f64>,
    w: &DVector<f64>,
    lambda: f64,
    penalized: &[bool],
) -> Option<DVector<f64>> {
    let (n, p) = x.shape();
    if z.len() != n || w.len() != n || penalized.len() != p {
        return None;
    }
    if !(lambda.is_finite() && lambda >= 0.0) {
        return None;
    }

    let n_pen = if lambda > 0.0 {
        penalized.iter().filter(|&&b| b).count()
    } else {
        0
    };
    let mut xa = DMatrix::<f64>::zeros(n + n_pen, p);
    let mut za = DVector::<f64>::zeros(n + n_pen);

    for i in 0..n {
        let sw = w[i].max(0.0).sqrt();
        for j in 0..p {
            xa[(i, j)] = x[(i, j)] * sw;
        }
        za[i] = z[i] * sw;
    }

    if n_pen > 0 {
        let sl = lambda.sqrt();
        let mut row = n;
        for (j, &pen) in penalized.iter().enumerate() {
            if pen {
                xa[(row, j)] = sl;
                row += 1;
            }
        }
    }

    solve_least_squares(&xa, &za)
}
