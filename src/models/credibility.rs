//! Bühlmann-style credibility rates for one categorical rating factor.
//!
//! For each level `l` with total claims (or claim amount) `S_l` over exposure `E_l`:
//!
//! ```text
//! rate_l = (S_l + k * rate_all) / (E_l + k)
//! ```
//!
//! i.e. the level's own experience blended with the portfolio rate using
//! credibility `Z = E_l / (E_l + k)`. The grid value is `k`: `k = 0` trusts
//! every level fully, `k -> ∞` collapses to a single portfolio rate.
//!
//! For severity data the response is an average claim and the exposure column
//! holds the claim count, so `S_l = Σ y_i e_i`.

use std::collections::HashMap;

use crate::domain::{Covariate, Family, Observation};
use crate::models::{FittedModel, Learner};

#[derive(Debug, Clone)]
pub struct CredibilityLearner {
    family: Family,
    column: usize,
    name: String,
}

impl CredibilityLearner {
    /// `column` must index a categorical covariate.
    pub fn new(family: Family, column: usize, column_name: &str) -> Self {
        Self {
            family,
            column,
            name: format!("credibility rates by {column_name}"),
        }
    }

    fn amount(&self, row: &Observation) -> f64 {
        match self.family {
            Family::Poisson => row.response,
            Family::Gamma => row.response * row.exposure,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredibilityModel {
    column: usize,
    overall: f64,
    rates: HashMap<String, f64>,
}

impl CredibilityModel {
    pub fn overall_rate(&self) -> f64 {
        self.overall
    }

    pub fn rate_for(&self, level: &str) -> f64 {
        self.rates.get(level).copied().unwrap_or(self.overall)
    }
}

impl Learner for CredibilityLearner {
    type Model = CredibilityModel;

    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&self, train: &[&Observation], k: f64) -> Result<CredibilityModel, String> {
        if !(k.is_finite() && k >= 0.0) {
            return Err(format!("Credibility constant must be finite and >= 0, got {k}."));
        }

        let mut totals: HashMap<String, (f64, f64)> = HashMap::new();
        let mut amount_all = 0.0;
        let mut exposure_all = 0.0;
        for row in train.iter().filter(|r| !r.is_missing()) {
            let level = match row.covariates.get(self.column) {
                Some(Covariate::Categorical(level)) => level,
                _ => return Err(format!("Row '{}' has no categorical value in the rating factor column.", row.id)),
            };
            let amount = self.amount(row);
            let entry = totals.entry(level.clone()).or_insert((0.0, 0.0));
            entry.0 += amount;
            entry.1 += row.exposure;
            amount_all += amount;
            exposure_all += row.exposure;
        }

        if exposure_all <= 0.0 {
            return Err("Training subset has no observed responses.".to_string());
        }
        let overall = amount_all / exposure_all;
        if !(overall.is_finite() && overall > 0.0) {
            return Err(format!("Degenerate training subset: portfolio rate {overall}."));
        }

        let rates = totals
            .into_iter()
            .map(|(level, (amount, exposure))| (level, (amount + k * overall) / (exposure + k)))
            .collect();

        Ok(CredibilityModel {
            column: self.column,
            overall,
            rates,
        })
    }
}

impl FittedModel for CredibilityModel {
    fn predict(&self, rows: &[&Observation]) -> Result<Vec<f64>, String> {
        Ok(rows
            .iter()
            .map(|r| match r.covariates.get(self.column) {
                Some(Covariate::Categorical(level)) => self.rate_for(level),
                _ => self.overall,
            })
            .collect())
    }
}
