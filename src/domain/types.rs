//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during cross-validation
//! - exported to JSON/CSV
//! - passed explicitly between the fold, evaluation, and selection stages

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CvError;

/// Response distribution used for deviance scoring (and by the GLM learner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Claim counts (frequency).
    Poisson,
    /// Average claim amounts (severity).
    Gamma,
}

impl Family {
    pub fn display_name(self) -> &'static str {
        match self {
            Family::Poisson => "Poisson",
            Family::Gamma => "Gamma",
        }
    }

    /// Frequency learners predict a per-unit-exposure rate; severity learners
    /// predict the mean directly.
    pub fn default_exposure_adjust(self) -> bool {
        matches!(self, Family::Poisson)
    }

    /// Severity observations carry their claim count in the exposure column and
    /// are weighted by it.
    pub fn default_weight_by_exposure(self) -> bool {
        matches!(self, Family::Gamma)
    }
}

/// Which end of the grid corresponds to the simpler model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Parsimony {
    /// Penalty-style grids (cost-complexity, ridge lambda, credibility k).
    LargerIsSimpler,
    /// Size-style grids (tree depth, number of terms).
    SmallerIsSimpler,
}

impl Parsimony {
    /// `true` if `a` implies a simpler model than `b`.
    pub fn simpler(self, a: f64, b: f64) -> bool {
        match self {
            Parsimony::LargerIsSimpler => a > b,
            Parsimony::SmallerIsSimpler => a < b,
        }
    }
}

/// Rule used to pick the final grid value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionRule {
    /// Minimum mean cross-validated deviance.
    Min,
    /// Simplest value within one standard error of the minimum.
    OneSe,
}

/// Which learner adapter to cross-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LearnerKind {
    /// Log-link GLM with a ridge penalty (grid value = lambda).
    Glm,
    /// Credibility-weighted rates of one categorical covariate (grid value = k).
    Credibility,
}

/// One covariate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Covariate {
    Continuous(f64),
    Categorical(String),
}

impl Covariate {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Covariate::Continuous(v) => Some(*v),
            Covariate::Categorical(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Covariate::Continuous(_) => None,
            Covariate::Categorical(s) => Some(s),
        }
    }

    fn cmp_total(&self, other: &Covariate) -> Ordering {
        match (self, other) {
            (Covariate::Continuous(a), Covariate::Continuous(b)) => cmp_f64(*a, *b),
            (Covariate::Categorical(a), Covariate::Categorical(b)) => a.cmp(b),
            (Covariate::Continuous(_), Covariate::Categorical(_)) => Ordering::Less,
            (Covariate::Categorical(_), Covariate::Continuous(_)) => Ordering::Greater,
        }
    }
}

/// Column kind for covariates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Continuous,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// One policyholder-period record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    /// Claim count (frequency) or average claim amount (severity).
    /// `NaN` marks a missing response.
    pub response: f64,
    /// Time at risk (frequency) or number of claims behind the average (severity).
    pub exposure: f64,
    /// Covariate values, aligned with `Dataset::columns`.
    pub covariates: Vec<Covariate>,
}

impl Observation {
    pub fn is_missing(&self) -> bool {
        self.response.is_nan()
    }
}

/// Field selector used to order observations before fold assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Response,
    Exposure,
    Covariate(usize),
}

impl SortKey {
    /// Ascending comparison of two observations on this key. `NaN` sorts last.
    pub fn compare(self, a: &Observation, b: &Observation) -> Ordering {
        match self {
            SortKey::Response => cmp_f64(a.response, b.response),
            SortKey::Exposure => cmp_f64(a.exposure, b.exposure),
            SortKey::Covariate(idx) => match (a.covariates.get(idx), b.covariates.get(idx)) {
                (Some(x), Some(y)) => x.cmp_total(y),
                _ => Ordering::Equal,
            },
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.total_cmp(&b),
    }
}

/// An immutable table of observations plus its covariate schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<ColumnSpec>,
    observations: Vec<Observation>,
}

impl Dataset {
    /// Build a dataset, checking every row against the schema.
    pub fn new(columns: Vec<ColumnSpec>, observations: Vec<Observation>) -> Result<Self, CvError> {
        for obs in &observations {
            if obs.covariates.len() != columns.len() {
                return Err(CvError::InputLengthMismatch {
                    what: "covariates",
                    expected: columns.len(),
                    actual: obs.covariates.len(),
                });
            }
            for (spec, value) in columns.iter().zip(&obs.covariates) {
                let ok = matches!(
                    (spec.kind, value),
                    (ColumnKind::Continuous, Covariate::Continuous(_))
                        | (ColumnKind::Categorical, Covariate::Categorical(_))
                );
                if !ok {
                    return Err(CvError::domain(format!(
                        "Row '{}' has a value of the wrong kind in column `{}`.",
                        obs.id, spec.name
                    )));
                }
            }
            if !(obs.exposure.is_finite() && obs.exposure > 0.0) {
                return Err(CvError::domain(format!(
                    "Row '{}' has invalid exposure {} (must be finite and > 0).",
                    obs.id, obs.exposure
                )));
            }
        }
        Ok(Self {
            columns,
            observations,
        })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a sort-key name: `response`, `exposure`, or a covariate column.
    pub fn resolve_sort_key(&self, name: &str) -> Result<SortKey, CvError> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("response") {
            return Ok(SortKey::Response);
        }
        if name.eq_ignore_ascii_case("exposure") {
            return Ok(SortKey::Exposure);
        }
        self.column_index(name)
            .map(SortKey::Covariate)
            .ok_or_else(|| CvError::domain(format!("Unknown sort key `{name}`.")))
    }

    /// Borrow the rows at `indices` (in the given order).
    pub fn subset(&self, indices: &[usize]) -> Vec<&Observation> {
        indices
            .iter()
            .filter_map(|&i| self.observations.get(i))
            .collect()
    }

    /// Check every observed response against the family's support.
    pub fn validate_responses(&self, family: Family) -> Result<(), CvError> {
        for obs in &self.observations {
            if obs.is_missing() {
                continue;
            }
            let ok = match family {
                Family::Poisson => obs.response.is_finite() && obs.response >= 0.0,
                Family::Gamma => obs.response.is_finite() && obs.response > 0.0,
            };
            if !ok {
                return Err(CvError::domain(format!(
                    "Row '{}' has response {} outside the {} support.",
                    obs.id,
                    obs.response,
                    family.display_name()
                )));
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> DatasetStats {
        let n_missing = self.observations.iter().filter(|o| o.is_missing()).count();
        let total_exposure = self.observations.iter().map(|o| o.exposure).sum();
        let total_response = self
            .observations
            .iter()
            .filter(|o| !o.is_missing())
            .map(|o| o.response)
            .sum();
        DatasetStats {
            n_rows: self.observations.len(),
            n_missing,
            n_covariates: self.columns.len(),
            total_exposure,
            total_response,
        }
    }
}

/// Summary stats about a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub n_missing: usize,
    pub n_covariates: usize,
    pub total_exposure: f64,
    pub total_response: f64,
}

/// Which folds feed fitting and which feed scoring for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSplit {
    /// Fold withheld from the whole search (nested scheme), if any.
    pub test: Option<usize>,
    pub validation: usize,
    pub training: Vec<usize>,
}

impl FoldSplit {
    /// Short column label, e.g. `v3`.
    pub fn label(&self) -> String {
        format!("v{}", self.validation)
    }
}

impl fmt::Display for FoldSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.test {
            Some(t) => write!(f, "test={t} ")?,
            None => write!(f, "test=none ")?,
        }
        let training: Vec<String> = self.training.iter().map(|v| v.to_string()).collect();
        write!(
            f,
            "validation={} training={{{}}}",
            self.validation,
            training.join(",")
        )
    }
}

/// Where the run's data comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    Csv {
        path: PathBuf,
        response_col: String,
        exposure_col: String,
    },
    Simulated(SimConfig),
}

/// Portfolio simulation settings.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub n_policies: usize,
    pub seed: u64,
    pub family: Family,
}

/// A full cross-validation run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment defaults).
#[derive(Debug, Clone)]
pub struct CvConfig {
    pub source: DataSource,
    pub family: Family,
    pub learner: LearnerKind,
    /// Covariate used by the credibility learner.
    pub credibility_column: Option<String>,

    pub k: usize,
    pub sort_keys: Vec<String>,
    pub test_fold: Option<usize>,

    pub grid: Vec<f64>,
    pub parsimony: Parsimony,
    pub rule: SelectionRule,

    pub scaled: bool,
    pub exposure_adjust: bool,
    pub weight_by_exposure: bool,
    pub parallel: bool,

    pub export_scores: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: &str, response: f64, exposure: f64, area: &str) -> Observation {
        Observation {
            id: id.to_string(),
            response,
            exposure,
            covariates: vec![Covariate::Categorical(area.to_string())],
        }
    }

    fn area_columns() -> Vec<ColumnSpec> {
        vec![ColumnSpec {
            name: "area".to_string(),
            kind: ColumnKind::Categorical,
        }]
    }

    #[test]
    fn dataset_rejects_wrong_covariate_kind() {
        let row = Observation {
            id: "P1".to_string(),
            response: 0.0,
            exposure: 1.0,
            covariates: vec![Covariate::Continuous(1.0)],
        };
        let err = Dataset::new(area_columns(), vec![row]).unwrap_err();
        assert!(matches!(err, CvError::DomainError(_)));
    }

    #[test]
    fn dataset_rejects_non_positive_exposure() {
        let err = Dataset::new(area_columns(), vec![obs("P1", 0.0, 0.0, "A")]).unwrap_err();
        assert!(matches!(err, CvError::DomainError(_)));
    }

    #[test]
    fn sort_keys_resolve_by_name() {
        let data = Dataset::new(area_columns(), vec![obs("P1", 1.0, 1.0, "A")]).unwrap();
        assert_eq!(data.resolve_sort_key("Response").unwrap(), SortKey::Response);
        assert_eq!(data.resolve_sort_key("exposure").unwrap(), SortKey::Exposure);
        assert_eq!(data.resolve_sort_key("AREA").unwrap(), SortKey::Covariate(0));
        assert!(data.resolve_sort_key("brand").is_err());
    }

    #[test]
    fn missing_responses_sort_last() {
        let a = obs("a", f64::NAN, 1.0, "A");
        let b = obs("b", 3.0, 1.0, "A");
        assert_eq!(SortKey::Response.compare(&a, &b), Ordering::Greater);
        assert_eq!(SortKey::Response.compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn gamma_support_excludes_zero() {
        let data = Dataset::new(area_columns(), vec![obs("P1", 0.0, 1.0, "A")]).unwrap();
        assert!(data.validate_responses(Family::Poisson).is_ok());
        assert!(data.validate_responses(Family::Gamma).is_err());
    }

    #[test]
    fn split_display_names_every_fold() {
        let split = FoldSplit {
            test: Some(5),
            validation: 2,
            training: vec![1, 3, 4],
        };
        assert_eq!(split.to_string(), "test=5 validation=2 training={1,3,4}");
        assert_eq!(split.label(), "v2");
    }
}
