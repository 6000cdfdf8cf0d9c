//! Design matrix construction for linear-predictor learners.
//!
//! The encoding is learned from the training rows only, then applied unchanged
//! to validation rows:
//!
//! - continuous covariates are centred and scaled by the training moments
//!   (a missing value becomes 0, i.e. the training mean)
//! - categorical covariates are one-hot encoded against the first level in
//!   sorted order; levels unseen in training map to that baseline
//!
//! Column 0 is always the intercept.

use std::collections::BTreeSet;

use nalgebra::DMatrix;

use crate::domain::{Covariate, Observation};

#[derive(Debug, Clone)]
enum Term {
    Continuous { col: usize, mean: f64, scale: f64 },
    Categorical { col: usize, levels: Vec<String> },
}

impl Term {
    fn width(&self) -> usize {
        match self {
            Term::Continuous { .. } => 1,
            Term::Categorical { levels, .. } => levels.len(),
        }
    }
}

/// A frozen covariate encoding.
#[derive(Debug, Clone)]
pub struct DesignSpec {
    terms: Vec<Term>,
}

impl DesignSpec {
    pub fn learn(rows: &[&Observation]) -> Result<Self, String> {
        let Some(first) = rows.first() else {
            return Err("Cannot build a design from an empty training subset.".to_string());
        };
        let n_cov = first.covariates.len();

        let mut terms = Vec::with_capacity(n_cov);
        for col in 0..n_cov {
            match &first.covariates[col] {
                Covariate::Continuous(_) => {
                    let values: Vec<f64> = rows
                        .iter()
                        .filter_map(|r| r.covariates.get(col).and_then(Covariate::as_f64))
                        .filter(|v| v.is_finite())
                        .collect();
                    let (mean, sd) = moments(&values);
                    let scale = if sd > 1e-12 { sd } else { 1.0 };
                    terms.push(Term::Continuous { col, mean, scale });
                }
                Covariate::Categorical(_) => {
                    let seen: BTreeSet<&str> = rows
                        .iter()
                        .filter_map(|r| r.covariates.get(col).and_then(Covariate::as_str))
                        .collect();
                    // First level is the baseline.
                    let levels = seen.into_iter().skip(1).map(str::to_string).collect();
                    terms.push(Term::Categorical { col, levels });
                }
            }
        }

        Ok(Self { terms })
    }

    /// Number of design columns, intercept included.
    pub fn n_columns(&self) -> usize {
        1 + self.terms.iter().map(Term::width).sum::<usize>()
    }

    /// Penalty mask: everything except the intercept.
    pub fn penalized(&self) -> Vec<bool> {
        let mut mask = vec![true; self.n_columns()];
        mask[0] = false;
        mask
    }

    pub fn matrix(&self, rows: &[&Observation]) -> DMatrix<f64> {
        let p = self.n_columns();
        let mut x = DMatrix::<f64>::zeros(rows.len(), p);
        for (i, row) in rows.iter().enumerate() {
            x[(i, 0)] = 1.0;
            let mut j = 1;
            for term in &self.terms {
                match term {
                    Term::Continuous { col, mean, scale } => {
                        let v = row
                            .covariates
                            .get(*col)
                            .and_then(Covariate::as_f64)
                            .filter(|v| v.is_finite())
                            .map_or(0.0, |v| (v - mean) / scale);
                        x[(i, j)] = v;
                    }
                    Term::Categorical { col, levels } => {
                        let value = row.covariates.get(*col).and_then(Covariate::as_str);
                        if let Some(pos) = value.and_then(|v| levels.iter().position(|l| l == v)) {
                            x[(i, j + pos)] = 1.0;
                        }
                    }
                }
                j += term.width();
            }
        }
        x
    }
}

fn moments(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}
