//! Read/write run summary JSON files.
//!
//! The summary is the portable record of a cross-validation run: settings,
//! fold sizes, the full score matrix, per-value means and standard errors, the
//! selection, and the hold-out score when a test fold was withheld.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::pipeline::{HoldoutScore, RunOutput};
use crate::cv::{GridPoint, ScoreMatrix, Selection};
use crate::domain::{CvConfig, DatasetStats, Family};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub family: Family,
    pub learner: &'a str,
    pub k: usize,
    pub sort_keys: &'a [String],
    pub test_fold: Option<usize>,
    pub scaled: bool,
    pub exposure_adjust: bool,
    pub weight_by_exposure: bool,
    pub dataset: DatasetStats,
    pub fold_sizes: Vec<usize>,
    pub grid: Vec<GridPoint>,
    pub scores: &'a ScoreMatrix,
    pub selection: &'a Selection,
    pub holdout: Option<&'a HoldoutScore>,
}

impl<'a> RunSummary<'a> {
    pub fn new(run: &'a RunOutput, config: &'a CvConfig) -> Self {
        Self {
            tool: "cv",
            version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now(),
            family: config.family,
            learner: &run.learner,
            k: run.assignment.k(),
            sort_keys: &run.sort_keys,
            test_fold: config.test_fold,
            scaled: config.scaled,
            exposure_adjust: config.exposure_adjust,
            weight_by_exposure: config.weight_by_exposure,
            dataset: run.ingest.dataset.stats(),
            fold_sizes: run.assignment.sizes(),
            grid: run.scores.summary(),
            scores: &run.scores,
            selection: &run.selection,
            holdout: run.holdout.as_ref(),
        }
    }
}

/// Write a run summary JSON file.
pub fn write_summary_json(path: &Path, summary: &RunSummary<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}

/// Read back the score matrix from a summary JSON file.
pub fn read_scores_json(path: &Path) -> Result<ScoreMatrix, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    let value: serde_json::Value = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid summary JSON: {e}")))?;
    let scores = value
        .get("scores")
        .cloned()
        .ok_or_else(|| AppError::new(2, "Summary JSON has no `scores` field."))?;
    serde_json::from_value(scores).map_err(|e| AppError::new(2, format!("Invalid `scores` in summary JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_cv;
    use crate::domain::{DataSource, LearnerKind, Parsimony, SelectionRule, SimConfig};

    #[test]
    fn summary_round_trips_the_score_matrix() {
        let config = CvConfig {
            source: DataSource::Simulated(SimConfig {
                n_policies: 300,
                seed: 5,
                family: Family::Poisson,
            }),
            family: Family::Poisson,
            learner: LearnerKind::Credibility,
            credibility_column: Some("area".to_string()),
            k: 3,
            sort_keys: vec!["response".to_string()],
            test_fold: Some(3),
            grid: vec![10.0, 1.0],
            parsimony: Parsimony::LargerIsSimpler,
            rule: SelectionRule::OneSe,
            scaled: true,
            exposure_adjust: true,
            weight_by_exposure: false,
            parallel: false,
            export_scores: None,
            export_summary: None,
        };
        let run = run_cv(&config).unwrap();
        let summary = RunSummary::new(&run, &config);

        let path = std::env::temp_dir().join(format!("claims-cv-summary-{}.json", std::process::id()));
        write_summary_json(&path, &summary).unwrap();
        let scores = read_scores_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(scores, run.scores);
        assert_eq!(summary.fold_sizes.iter().sum::<usize>(), 300);
        assert!(summary.holdout.is_some());
    }
}
