//! Shared cross-validation pipeline.
//!
//! load/simulate -> validate responses -> assign folds -> rotate -> evaluate grid
//! -> select -> (optional) refit on all non-test folds and score the test fold
//!
//! Front-ends only deal with presentation and exports.

use crate::cv::{
    assign_folds, evaluate_grid, score_split, select, EvalOptions, FoldAssignment, FoldRotator, ScoreMatrix,
    Selection,
};
use crate::data::simulate_portfolio;
use crate::domain::{ColumnKind, CvConfig, DataSource, Dataset, FoldSplit, LearnerKind, SortKey};
use crate::error::AppError;
use crate::io::ingest::{load_dataset, ColumnRoles, IngestedData};
use crate::models::{CredibilityLearner, GlmLearner, Learner};

/// Deviance of the selected grid value on the withheld test fold.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HoldoutScore {
    pub test_fold: usize,
    pub param: f64,
    pub deviance: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// All computed outputs of a single `cv run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub learner: String,
    pub sort_keys: Vec<String>,
    pub assignment: FoldAssignment,
    pub scores: ScoreMatrix,
    pub selection: Selection,
    pub holdout: Option<HoldoutScore>,
}

/// Load (or simulate) the data, then run the search.
pub fn run_cv(config: &CvConfig) -> Result<RunOutput, AppError> {
    let ingest = load_source(&config.source)?;
    run_cv_with_data(config, ingest)
}

pub fn load_source(source: &DataSource) -> Result<IngestedData, AppError> {
    match source {
        DataSource::Csv {
            path,
            response_col,
            exposure_col,
        } => {
            let roles = ColumnRoles {
                response: response_col,
                exposure: exposure_col,
            };
            load_dataset(path, &roles)
        }
        DataSource::Simulated(sim) => {
            let dataset = simulate_portfolio(sim)?;
            let rows = dataset.len();
            Ok(IngestedData {
                dataset,
                row_errors: Vec::new(),
                rows_read: rows,
                rows_used: rows,
            })
        }
    }
}

/// Run the search on already-loaded data.
pub fn run_cv_with_data(config: &CvConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let data = &ingest.dataset;
    data.validate_responses(config.family)
        .map_err(|e| AppError::new(2, e.to_string()))?;

    let sort_keys = resolve_sort_keys(data, &config.sort_keys)?;
    let assignment = assign_folds(data, config.k, &sort_keys)?;
    let rotator = FoldRotator::new(assignment.fold_ids(), config.test_fold)?;

    let opts = EvalOptions {
        family: config.family,
        scaled: config.scaled,
        exposure_adjust: config.exposure_adjust,
        weight_by_exposure: config.weight_by_exposure,
        parallel: config.parallel,
    };

    let search = match config.learner {
        LearnerKind::Glm => {
            let learner = GlmLearner::new(config.family);
            run_search(data, &assignment, &rotator, config, &learner, opts)?
        }
        LearnerKind::Credibility => {
            let learner = credibility_learner(data, config)?;
            run_search(data, &assignment, &rotator, config, &learner, opts)?
        }
    };

    let sort_keys = if config.sort_keys.is_empty() {
        vec!["response".to_string()]
    } else {
        config.sort_keys.clone()
    };

    Ok(RunOutput {
        ingest,
        learner: search.learner,
        sort_keys,
        assignment,
        scores: search.scores,
        selection: search.selection,
        holdout: search.holdout,
    })
}

struct Search {
    learner: String,
    scores: ScoreMatrix,
    selection: Selection,
    holdout: Option<HoldoutScore>,
}

fn run_search<L: Learner>(
    data: &Dataset,
    assignment: &FoldAssignment,
    rotator: &FoldRotator,
    config: &CvConfig,
    learner: &L,
    opts: EvalOptions,
) -> Result<Search, AppError> {
    let splits: Vec<FoldSplit> = rotator.splits().collect();
    tracing::info!(
        learner = learner.name(),
        k = assignment.k(),
        test_fold = ?rotator.test_fold(),
        splits = splits.len(),
        "starting cross-validation"
    );

    let scores = evaluate_grid(data, assignment, &config.grid, &splits, learner, opts)?;
    let selection = select(&scores, config.rule, config.parsimony)?;

    let holdout = match rotator.test_fold() {
        Some(test_fold) => {
            let split = FoldSplit {
                test: Some(test_fold),
                validation: test_fold,
                training: rotator.non_test_folds(),
            };
            let train = data.subset(&assignment.indices_in(&split.training));
            let test = data.subset(&assignment.indices_in(&[test_fold]));
            let deviance = score_split(selection.selected_param, &split, &train, &test, learner, opts)?;
            tracing::info!(test_fold, param = selection.selected_param, deviance, "scored test fold");
            Some(HoldoutScore {
                test_fold,
                param: selection.selected_param,
                deviance,
                n_train: train.len(),
                n_test: test.len(),
            })
        }
        None => None,
    };

    Ok(Search {
        learner: learner.name().to_string(),
        scores,
        selection,
        holdout,
    })
}

fn resolve_sort_keys(data: &Dataset, names: &[String]) -> Result<Vec<SortKey>, AppError> {
    if names.is_empty() {
        return Ok(vec![SortKey::Response]);
    }
    names
        .iter()
        .map(|n| data.resolve_sort_key(n).map_err(|e| AppError::new(2, e.to_string())))
        .collect()
}

fn credibility_learner(data: &Dataset, config: &CvConfig) -> Result<CredibilityLearner, AppError> {
    let name = config.credibility_column.as_deref().ok_or_else(|| {
        AppError::new(2, "`--learner credibility` requires `--credibility-column <NAME>`.")
    })?;
    let column = data
        .column_index(name)
        .ok_or_else(|| AppError::new(2, format!("Unknown credibility column `{name}`.")))?;
    if data.columns()[column].kind != ColumnKind::Categorical {
        return Err(AppError::new(
            2,
            format!("Credibility column `{name}` must be categorical."),
        ));
    }
    Ok(CredibilityLearner::new(config.family, column, name))
}
