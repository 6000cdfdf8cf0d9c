//! Grid evaluation: refit per (grid value, split), score the validation fold.
//!
//! Every cell of the score matrix is an independent task: it reads only its
//! own training/validation rows and grid value and produces one deviance. The
//! tasks run on rayon's pool (or sequentially) and the results are reshaped
//! into a params x splits matrix afterwards. A single failing cell aborts the
//! whole run; a partially filled matrix is never returned.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cv::folds::FoldAssignment;
use crate::domain::{Dataset, Family, FoldSplit, Observation};
use crate::error::CvError;
use crate::math::deviance;
use crate::models::{FittedModel, Learner};

/// How validation predictions are turned into a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOptions {
    pub family: Family,
    /// Divide the deviance by the number of observed responses.
    pub scaled: bool,
    /// Multiply predictions by validation exposure before scoring
    /// (learners that predict per-unit-exposure rates).
    pub exposure_adjust: bool,
    /// Use each row's exposure as its deviance weight.
    pub weight_by_exposure: bool,
    pub parallel: bool,
}

impl EvalOptions {
    pub fn for_family(family: Family) -> Self {
        Self {
            family,
            scaled: true,
            exposure_adjust: family.default_exposure_adjust(),
            weight_by_exposure: family.default_weight_by_exposure(),
            parallel: true,
        }
    }
}

/// Deviance per (grid value, split).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMatrix {
    params: Vec<f64>,
    splits: Vec<FoldSplit>,
    /// `scores[i][j]`: grid value `i`, split `j`.
    scores: Vec<Vec<f64>>,
}

/// Mean and standard error of one grid value's scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub param: f64,
    pub mean: f64,
    pub std_err: f64,
}

impl ScoreMatrix {
    pub fn from_rows(
        params: Vec<f64>,
        splits: Vec<FoldSplit>,
        scores: Vec<Vec<f64>>,
    ) -> Result<Self, CvError> {
        if params.is_empty() {
            return Err(CvError::EmptyGridError);
        }
        if scores.len() != params.len() {
            return Err(CvError::InputLengthMismatch {
                what: "score rows",
                expected: params.len(),
                actual: scores.len(),
            });
        }
        if let Some(row) = scores.iter().find(|r| r.len() != splits.len()) {
            return Err(CvError::InputLengthMismatch {
                what: "score columns",
                expected: splits.len(),
                actual: row.len(),
            });
        }
        Ok(Self {
            params,
            splits,
            scores,
        })
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn splits(&self) -> &[FoldSplit] {
        &self.splits
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.scores[i]
    }

    pub fn mean(&self, i: usize) -> f64 {
        let row = &self.scores[i];
        if row.is_empty() {
            return f64::NAN;
        }
        row.iter().sum::<f64>() / row.len() as f64
    }

    /// Sample standard deviation across splits over `sqrt(n_splits)`.
    pub fn std_err(&self, i: usize) -> f64 {
        let row = &self.scores[i];
        let n = row.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean(i);
        let var = row.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / (n as f64 - 1.0);
        (var / n as f64).sqrt()
    }

    pub fn means(&self) -> Vec<f64> {
        (0..self.params.len()).map(|i| self.mean(i)).collect()
    }

    pub fn std_errs(&self) -> Vec<f64> {
        (0..self.params.len()).map(|i| self.std_err(i)).collect()
    }

    pub fn summary(&self) -> Vec<GridPoint> {
        (0..self.params.len())
            .map(|i| GridPoint {
                param: self.params[i],
                mean: self.mean(i),
                std_err: self.std_err(i),
            })
            .collect()
    }

    /// Keep only the splits matching `keep` (same column order).
    pub fn restrict_splits(&self, keep: impl Fn(&FoldSplit) -> bool) -> ScoreMatrix {
        let cols: Vec<usize> = (0..self.splits.len()).filter(|&j| keep(&self.splits[j])).collect();
        ScoreMatrix {
            params: self.params.clone(),
            splits: cols.iter().map(|&j| self.splits[j].clone()).collect(),
            scores: self
                .scores
                .iter()
                .map(|row| cols.iter().map(|&j| row[j]).collect())
                .collect(),
        }
    }
}

/// Convert per-unit-exposure rates into expected counts.
pub fn adjust_for_exposure(predictions: &mut [f64], rows: &[&Observation]) {
    for (p, row) in predictions.iter_mut().zip(rows) {
        *p *= row.exposure;
    }
}

/// Evaluate every grid value on every split.
pub fn evaluate_grid<L: Learner>(
    data: &Dataset,
    assignment: &FoldAssignment,
    grid: &[f64],
    splits: &[FoldSplit],
    learner: &L,
    opts: EvalOptions,
) -> Result<ScoreMatrix, CvError> {
    if grid.is_empty() {
        return Err(CvError::EmptyGridError);
    }
    if assignment.labels().len() != data.len() {
        return Err(CvError::InputLengthMismatch {
            what: "fold labels",
            expected: data.len(),
            actual: assignment.labels().len(),
        });
    }
    if splits.is_empty() {
        return Err(CvError::InvalidFoldCount {
            k: assignment.k(),
            n: data.len(),
        });
    }

    let subsets: Vec<(Vec<&Observation>, Vec<&Observation>)> = splits
        .iter()
        .map(|s| {
            let train = data.subset(&assignment.indices_in(&s.training));
            let valid = data.subset(&assignment.indices_in(&[s.validation]));
            (train, valid)
        })
        .collect();

    let m = splits.len();
    let tasks: Vec<(usize, usize)> = (0..grid.len())
        .flat_map(|i| (0..m).map(move |j| (i, j)))
        .collect();

    tracing::info!(
        learner = learner.name(),
        grid = grid.len(),
        splits = m,
        parallel = opts.parallel,
        "evaluating grid"
    );

    let run = |&(i, j): &(usize, usize)| -> Result<f64, CvError> {
        let (train, valid) = &subsets[j];
        score_split(grid[i], &splits[j], train, valid, learner, opts)
    };
    let cells: Vec<f64> = if opts.parallel {
        tasks.par_iter().map(&run).collect::<Result<Vec<_>, _>>()?
    } else {
        tasks.iter().map(&run).collect::<Result<Vec<_>, _>>()?
    };

    let scores = cells.chunks(m).map(<[f64]>::to_vec).collect();
    ScoreMatrix::from_rows(grid.to_vec(), splits.to_vec(), scores)
}

/// Fit `learner` on `train` with `param` and score it on `valid`.
///
/// Any failure is reported as `FitFailure` tagged with `param` and `split`.
pub fn score_split<L: Learner>(
    param: f64,
    split: &FoldSplit,
    train: &[&Observation],
    valid: &[&Observation],
    learner: &L,
    opts: EvalOptions,
) -> Result<f64, CvError> {
    let fail = |reason: String| CvError::FitFailure {
        param,
        split: split.clone(),
        reason,
    };

    if train.is_empty() || valid.is_empty() {
        return Err(fail(format!(
            "empty subset (training rows={}, validation rows={})",
            train.len(),
            valid.len()
        )));
    }

    let model = learner.fit(train, param).map_err(|e| fail(format!("fit: {e}")))?;
    let mut predictions = model.predict(valid).map_err(|e| fail(format!("predict: {e}")))?;
    if predictions.len() != valid.len() {
        return Err(fail(format!(
            "predict returned {} values for {} rows",
            predictions.len(),
            valid.len()
        )));
    }

    if opts.exposure_adjust {
        adjust_for_exposure(&mut predictions, valid);
    }
    if let Some((idx, v)) = predictions
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v > 0.0))
    {
        return Err(fail(format!("prediction {v} for row '{}' is not a positive mean", valid[idx].id)));
    }

    let y: Vec<f64> = valid.iter().map(|r| r.response).collect();
    let weights: Option<Vec<f64>> = opts
        .weight_by_exposure
        .then(|| valid.iter().map(|r| r.exposure).collect());
    let score = deviance(opts.family, &y, &predictions, weights.as_deref(), opts.scaled)
        .map_err(|e| fail(e.to_string()))?;

    tracing::debug!(param, split = %split, score, "scored cell");
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::folds::assign_folds;
    use crate::cv::rotator::enumerate_splits;
    use crate::domain::{ColumnKind, ColumnSpec, Covariate, SortKey};
    use crate::models::{FnLearner, FnModel};

    fn area_of(i: usize) -> &'static str {
        if i % 3 == 0 { "A" } else { "B" }
    }

    fn dataset() -> Dataset {
        let rows = (0..12)
            .map(|i| Observation {
                id: format!("P{i}"),
                response: (i % 4) as f64,
                exposure: if i % 2 == 0 { 1.0 } else { 0.5 },
                covariates: vec![Covariate::Categorical(area_of(i).to_string())],
            })
            .collect();
        let columns = vec![ColumnSpec {
            name: "area".to_string(),
            kind: ColumnKind::Categorical,
        }];
        Dataset::new(columns, rows).unwrap()
    }

    /// Predicts the grid value as a per-unit-exposure rate.
    struct ConstantRate;

    struct ConstantModel(f64);

    impl FittedModel for ConstantModel {
        fn predict(&self, rows: &[&Observation]) -> Result<Vec<f64>, String> {
            Ok(vec![self.0; rows.len()])
        }
    }

    impl Learner for ConstantRate {
        type Model = ConstantModel;

        fn name(&self) -> &str {
            "constant"
        }

        fn fit(&self, _train: &[&Observation], param: f64) -> Result<ConstantModel, String> {
            Ok(ConstantModel(param))
        }
    }

    #[test]
    fn exposure_adjustment_scales_rates_to_counts() {
        let a = Observation {
            id: "a".to_string(),
            response: 1.0,
            exposure: 2.0,
            covariates: vec![],
        };
        let b = Observation {
            id: "b".to_string(),
            response: 0.0,
            exposure: 0.5,
            covariates: vec![],
        };
        let mut preds = vec![0.1, 0.2];
        adjust_for_exposure(&mut preds, &[&a, &b]);
        assert!((preds[0] - 0.2).abs() < 1e-15);
        assert!((preds[1] - 0.1).abs() < 1e-15);

        let adjusted = deviance(Family::Poisson, &[1.0, 0.0], &preds, None, true).unwrap();
        let expected = deviance(Family::Poisson, &[1.0, 0.0], &[0.2, 0.1], None, true).unwrap();
        assert_eq!(adjusted, expected);
    }

    #[test]
    fn score_matrix_has_one_cell_per_grid_value_and_split() {
        let data = dataset();
        let folds = assign_folds(&data, 3, &[SortKey::Response]).unwrap();
        let splits = enumerate_splits(folds.fold_ids(), None).unwrap();
        let learner = ConstantRate;

        let grid = [0.5, 1.0, 2.0];
        let matrix = evaluate_grid(&data, &folds, &grid, &splits, &learner, EvalOptions::for_family(Family::Poisson)).unwrap();
        assert_eq!(matrix.params(), &grid);
        assert_eq!(matrix.splits().len(), 3);
        for i in 0..grid.len() {
            assert_eq!(matrix.row(i).len(), 3);
            assert!(matrix.row(i).iter().all(|s| s.is_finite() && *s >= 0.0));
        }
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let data = dataset();
        let folds = assign_folds(&data, 4, &[SortKey::Response, SortKey::Exposure]).unwrap();
        let splits = enumerate_splits(folds.fold_ids(), Some(4)).unwrap();
        let learner = ConstantRate;
        let grid = [0.25, 0.75, 1.5];

        let mut opts = EvalOptions::for_family(Family::Poisson);
        let par = evaluate_grid(&data, &folds, &grid, &splits, &learner, opts).unwrap();
        opts.parallel = false;
        let seq = evaluate_grid(&data, &folds, &grid, &splits, &learner, opts).unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn cell_scores_match_a_direct_deviance_call() {
        let data = dataset();
        let folds = assign_folds(&data, 2, &[SortKey::Response]).unwrap();
        let splits = enumerate_splits(folds.fold_ids(), None).unwrap();
        let learner = ConstantRate;
        let opts = EvalOptions::for_family(Family::Poisson);
        let matrix = evaluate_grid(&data, &folds, &[0.8], &splits, &learner, opts).unwrap();

        let valid = data.subset(&folds.indices_in(&[splits[0].validation]));
        let y: Vec<f64> = valid.iter().map(|r| r.response).collect();
        let yhat: Vec<f64> = valid.iter().map(|r| 0.8 * r.exposure).collect();
        let expected = deviance(Family::Poisson, &y, &yhat, None, true).unwrap();
        assert!((matrix.row(0)[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn failing_fit_is_tagged_with_grid_value_and_split() {
        let data = dataset();
        let folds = assign_folds(&data, 3, &[SortKey::Response]).unwrap();
        let splits = enumerate_splits(folds.fold_ids(), None).unwrap();
        let learner = FnLearner::new("picky", |_train: &[&Observation], param: f64| {
            if param > 1.0 {
                return Err("singular fit".to_string());
            }
            Ok(FnModel(move |rows: &[&Observation]| Ok::<_, String>(vec![0.5; rows.len()])))
        });

        let err = evaluate_grid(&data, &folds, &[0.5, 2.0], &splits, &learner, EvalOptions::for_family(Family::Poisson))
            .unwrap_err();
        match err {
            CvError::FitFailure { param, split, reason } => {
                assert_eq!(param, 2.0);
                assert!(splits.contains(&split));
                assert!(reason.contains("singular fit"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_positive_predictions_abort_the_run() {
        let data = dataset();
        let folds = assign_folds(&data, 2, &[SortKey::Response]).unwrap();
        let splits = enumerate_splits(folds.fold_ids(), None).unwrap();
        let learner = ConstantRate;
        let err = evaluate_grid(&data, &folds, &[0.0], &splits, &learner, EvalOptions::for_family(Family::Poisson))
            .unwrap_err();
        assert!(matches!(err, CvError::FitFailure { param, .. } if param == 0.0));
    }

    #[test]
    fn empty_grid_is_rejected() {
        let data = dataset();
        let folds = assign_folds(&data, 2, &[SortKey::Response]).unwrap();
        let splits = enumerate_splits(folds.fold_ids(), None).unwrap();
        let learner = ConstantRate;
        let err = evaluate_grid(&data, &folds, &[], &splits, &learner, EvalOptions::for_family(Family::Poisson))
            .unwrap_err();
        assert!(matches!(err, CvError::EmptyGridError));
    }

    #[test]
    fn std_err_uses_sample_deviation() {
        let splits = enumerate_splits(1..=3, None).unwrap();
        let matrix = ScoreMatrix::from_rows(vec![1.0], splits, vec![vec![1.0, 2.0, 3.0]]).unwrap();
        assert!((matrix.mean(0) - 2.0).abs() < 1e-12);
        // sd = 1, se = 1/sqrt(3)
        assert!((matrix.std_err(0) - 1.0 / 3f64.sqrt()).abs() < 1e-12);
    }
}
