//! CSV ingest for claim datasets.
//!
//! Schema:
//! - a response column (claim count or average claim amount); empty = missing
//! - an exposure column (time at risk, or claim count for severity data)
//! - an optional `id` column
//! - every other column is a covariate: numeric when every non-empty value
//!   parses as a number, categorical otherwise
//!
//! Rows that cannot be used (bad exposure, unparseable response) are skipped
//! and reported as row errors rather than failing the whole load.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{ColumnKind, ColumnSpec, Covariate, Dataset, Observation};
use crate::error::AppError;

/// Label used for an empty categorical cell.
pub const MISSING_LEVEL: &str = "NA";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: the dataset plus what was dropped along the way.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Names of the structural columns.
#[derive(Debug, Clone)]
pub struct ColumnRoles<'a> {
    pub response: &'a str,
    pub exposure: &'a str,
}

/// Load a dataset from a CSV file.
pub fn load_dataset(path: &Path, roles: &ColumnRoles<'_>) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_dataset(file, roles)
}

/// Load a dataset from any CSV reader.
pub fn read_dataset<R: Read>(input: R, roles: &ColumnRoles<'_>) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let response_idx = required_column(&header_map, roles.response)?;
    let exposure_idx = required_column(&header_map, roles.exposure)?;
    let id_idx = header_map.get("id").copied();

    let covariate_idx: Vec<usize> = (0..headers.len())
        .filter(|&i| i != response_idx && i != exposure_idx && Some(i) != id_idx)
        .collect();

    let mut row_errors = Vec::new();
    let mut records = Vec::new();
    let mut rows_read = 0usize;
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;
        match result {
            Ok(r) => records.push((line, r)),
            Err(e) => row_errors.push(RowError {
                line,
                id: None,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }

    let columns: Vec<ColumnSpec> = covariate_idx
        .iter()
        .map(|&i| ColumnSpec {
            name: normalize_header_name(&headers[i]),
            kind: infer_kind(records.iter().map(|(_, r)| r.get(i).unwrap_or(""))),
        })
        .collect();

    let mut observations = Vec::with_capacity(records.len());
    for (line, record) in &records {
        let id = id_idx
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("row{}", line - 1), str::to_string);

        match parse_row(record, response_idx, exposure_idx, &covariate_idx, &columns) {
            Ok((response, exposure, covariates)) => observations.push(Observation {
                id,
                response,
                exposure,
                covariates,
            }),
            Err(message) => row_errors.push(RowError {
                line: *line,
                id: Some(id),
                message,
            }),
        }
    }

    for err in &row_errors {
        tracing::warn!(line = err.line, id = err.id.as_deref().unwrap_or(""), "{}", err.message);
    }

    let rows_used = observations.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid rows remain after ingest."));
    }

    let dataset = Dataset::new(columns, observations).map_err(|e| AppError::new(2, e.to_string()))?;
    tracing::info!(rows_read, rows_used, skipped = row_errors.len(), "loaded dataset");

    Ok(IngestedData {
        dataset,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn required_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut numeric = true;
    for v in values.filter(|v| !v.is_empty()) {
        if v.parse::<f64>().is_err() {
            numeric = false;
            break;
        }
    }
    if numeric {
        ColumnKind::Continuous
    } else {
        ColumnKind::Categorical
    }
}

fn parse_row(
    record: &StringRecord,
    response_idx: usize,
    exposure_idx: usize,
    covariate_idx: &[usize],
    columns: &[ColumnSpec],
) -> Result<(f64, f64, Vec<Covariate>), String> {
    let response = match record.get(response_idx).unwrap_or("") {
        "" => f64::NAN,
        s => s
            .parse::<f64>()
            .map_err(|_| format!("Invalid response value '{s}'."))?,
    };

    let exposure_raw = record.get(exposure_idx).unwrap_or("");
    let exposure = exposure_raw
        .parse::<f64>()
        .map_err(|_| format!("Missing/invalid exposure value '{exposure_raw}'."))?;
    if !(exposure.is_finite() && exposure > 0.0) {
        return Err(format!("Exposure must be finite and > 0, got {exposure}."));
    }

    let covariates = covariate_idx
        .iter()
        .zip(columns)
        .map(|(&i, spec)| {
            let raw = record.get(i).unwrap_or("");
            match spec.kind {
                ColumnKind::Continuous => Covariate::Continuous(raw.parse().unwrap_or(f64::NAN)),
                ColumnKind::Categorical if raw.is_empty() => Covariate::Categorical(MISSING_LEVEL.to_string()),
                ColumnKind::Categorical => Covariate::Categorical(raw.to_string()),
            }
        })
        .collect();

    Ok((response, exposure, covariates))
}
