//! CSV exports: the score matrix and (simulated) datasets.
//!
//! Both are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::cv::ScoreMatrix;
use crate::domain::{Covariate, Dataset};
use crate::error::AppError;

/// Write the score matrix: one row per grid value, one column per split,
/// then the mean and standard error.
pub fn write_scores_csv(path: &Path, scores: &ScoreMatrix) -> Result<(), AppError> {
    let file = create(path, "score CSV")?;
    write_scores(file, scores)
}

pub fn write_scores<W: Write>(out: W, scores: &ScoreMatrix) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["param".to_string()];
    header.extend(scores.splits().iter().map(|s| s.label()));
    header.push("mean".to_string());
    header.push("std_err".to_string());
    writer.write_record(&header).map_err(write_err)?;

    for (i, point) in scores.summary().iter().enumerate() {
        let mut record = vec![format!("{}", point.param)];
        record.extend(scores.row(i).iter().map(|v| format!("{v:.10}")));
        record.push(format!("{:.10}", point.mean));
        record.push(format!("{:.10}", point.std_err));
        writer.write_record(&record).map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))
}

/// Write a dataset back out in the ingest schema (`id`, response, exposure, covariates).
pub fn write_dataset_csv(path: &Path, data: &Dataset, response_col: &str, exposure_col: &str) -> Result<(), AppError> {
    let file = create(path, "dataset CSV")?;
    write_dataset(file, data, response_col, exposure_col)
}

pub fn write_dataset<W: Write>(
    out: W,
    data: &Dataset,
    response_col: &str,
    exposure_col: &str,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["id", response_col, exposure_col];
    header.extend(data.columns().iter().map(|c| c.name.as_str()));
    writer.write_record(&header).map_err(write_err)?;

    for row in data.observations() {
        let mut record = vec![
            row.id.clone(),
            if row.is_missing() {
                String::new()
            } else {
                format!("{}", row.response)
            },
            format!("{}", row.exposure),
        ];
        record.extend(row.covariates.iter().map(|c| match c {
            Covariate::Continuous(v) if v.is_nan() => String::new(),
            Covariate::Continuous(v) => format!("{v}"),
            Covariate::Categorical(s) => s.clone(),
        }));
        writer.write_record(&record).map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))
}

fn create(path: &Path, what: &str) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}

fn write_err(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write CSV row: {e}"))
}
