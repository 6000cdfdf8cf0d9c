//! Parameter selection from a score matrix.
//!
//! Two rules:
//! 1. Minimum: the grid value with the smallest mean deviance. Exact ties go
//!    to the value implying the simpler model.
//! 2. One standard error: among values whose mean is within
//!    `min + se[argmin]`, the simplest one.
//!
//! Which end of the grid is "simpler" is a property of the parameter, carried
//! by `Parsimony`. Grid order itself plays no role.

use serde::Serialize;

use crate::cv::evaluator::ScoreMatrix;
use crate::domain::{Parsimony, SelectionRule};
use crate::error::CvError;

/// Outcome of applying a selection rule to a score matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub rule: SelectionRule,
    pub parsimony: Parsimony,
    /// Grid index and value with the minimum mean score.
    pub min_index: usize,
    pub min_param: f64,
    pub min_mean: f64,
    /// `min + se[argmin]`; only set under the one-SE rule.
    pub threshold: Option<f64>,
    /// Grid index and value picked by `rule`.
    pub selected_index: usize,
    pub selected_param: f64,
    pub selected_mean: f64,
}

/// Grid value with the smallest mean score.
pub fn select_minimum(grid: &[f64], mean_scores: &[f64], parsimony: Parsimony) -> Result<f64, CvError> {
    check_aligned(grid, mean_scores, "mean scores")?;
    Ok(grid[argmin(grid, mean_scores, parsimony)?])
}

/// Simplest grid value whose mean score is within one standard error of the minimum.
pub fn select_one_se(
    grid: &[f64],
    mean_scores: &[f64],
    std_errs: &[f64],
    parsimony: Parsimony,
) -> Result<f64, CvError> {
    check_aligned(grid, mean_scores, "mean scores")?;
    check_aligned(grid, std_errs, "standard errors")?;
    let (idx, _) = one_se_index(grid, mean_scores, std_errs, parsimony)?;
    Ok(grid[idx])
}

/// Apply `rule` to the per-parameter means and standard errors of `matrix`.
pub fn select(matrix: &ScoreMatrix, rule: SelectionRule, parsimony: Parsimony) -> Result<Selection, CvError> {
    let grid = matrix.params();
    let means = matrix.means();
    let min_index = argmin(grid, &means, parsimony)?;

    let (selected_index, threshold) = match rule {
        SelectionRule::Min => (min_index, None),
        SelectionRule::OneSe => {
            let std_errs = matrix.std_errs();
            let (idx, threshold) = one_se_index(grid, &means, &std_errs, parsimony)?;
            (idx, Some(threshold))
        }
    };

    let selection = Selection {
        rule,
        parsimony,
        min_index,
        min_param: grid[min_index],
        min_mean: means[min_index],
        threshold,
        selected_index,
        selected_param: grid[selected_index],
        selected_mean: means[selected_index],
    };
    tracing::info!(
        rule = ?rule,
        min_param = selection.min_param,
        selected = selection.selected_param,
        mean = selection.selected_mean,
        "selected grid value"
    );
    Ok(selection)
}

fn check_aligned(grid: &[f64], values: &[f64], what: &'static str) -> Result<(), CvError> {
    if grid.is_empty() {
        return Err(CvError::EmptyGridError);
    }
    if values.len() != grid.len() {
        return Err(CvError::InputLengthMismatch {
            what,
            expected: grid.len(),
            actual: values.len(),
        });
    }
    Ok(())
}

fn argmin(grid: &[f64], means: &[f64], parsimony: Parsimony) -> Result<usize, CvError> {
    if grid.is_empty() {
        return Err(CvError::EmptyGridError);
    }
    let mut best: Option<usize> = None;
    for (i, &m) in means.iter().enumerate() {
        if !m.is_finite() {
            continue;
        }
        best = match best {
            None => Some(i),
            Some(b) if m < means[b] || (m == means[b] && parsimony.simpler(grid[i], grid[b])) => Some(i),
            keep => keep,
        };
    }
    best.ok_or_else(|| CvError::domain("No grid value has a finite mean score."))
}

fn one_se_index(
    grid: &[f64],
    means: &[f64],
    std_errs: &[f64],
    parsimony: Parsimony,
) -> Result<(usize, f64), CvError> {
    let min_index = argmin(grid, means, parsimony)?;
    let se = std_errs[min_index];
    if !(se.is_finite() && se >= 0.0) {
        return Err(CvError::domain(format!(
            "Standard error {se} at grid value {} is not a finite non-negative number.",
            grid[min_index]
        )));
    }
    let threshold = means[min_index] + se;

    let mut pick = min_index;
    for (i, &m) in means.iter().enumerate() {
        if m.is_finite() && m <= threshold && parsimony.simpler(grid[i], grid[pick]) {
            pick = i;
        }
    }
    Ok((pick, threshold))
}
