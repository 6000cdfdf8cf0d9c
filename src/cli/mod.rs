//! Command-line parsing for the claims cross-validation tool.
//!
//! Argument parsing and command dispatch stay separate from the fold, grid, and
//! learner code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Family, LearnerKind, Parsimony, SelectionRule};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cv", version, about = "Deviance-based k-fold cross-validation for claim frequency/severity models")]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, env = "CV_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cross-validate a learner over a parameter grid and select a value.
    Run(RunArgs),
    /// Write a simulated motor portfolio to CSV.
    Simulate(SimulateArgs),
}

/// Portfolio simulation options shared by `run` and `simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimArgs {
    /// Number of simulated policies.
    #[arg(short = 'n', long = "policies", default_value_t = 5_000)]
    pub n_policies: usize,

    /// Random seed for the simulation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    /// Frequency (poisson) or severity (gamma) portfolio.
    #[arg(long, value_enum, default_value_t = Family::Poisson)]
    pub family: Family,

    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub out: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Input CSV. When omitted, a simulated portfolio is used.
    #[arg(long, value_name = "CSV")]
    pub csv: Option<PathBuf>,

    #[command(flatten)]
    pub sim: SimArgs,

    /// Response column in the CSV.
    #[arg(long, default_value = "claims")]
    pub response_col: String,

    /// Exposure column in the CSV.
    #[arg(long, default_value = "exposure")]
    pub exposure_col: String,

    /// Response distribution used for scoring.
    #[arg(long, value_enum, default_value_t = Family::Poisson)]
    pub family: Family,

    /// Learner to cross-validate.
    #[arg(long, value_enum, default_value_t = LearnerKind::Glm)]
    pub learner: LearnerKind,

    /// Categorical covariate for `--learner credibility`.
    #[arg(long)]
    pub credibility_column: Option<String>,

    /// Number of folds.
    #[arg(short = 'k', long, default_value_t = 5)]
    pub folds: usize,

    /// Comma-separated sort keys for fold stratification
    /// (`response`, `exposure`, or covariate names).
    #[arg(long, value_delimiter = ',', default_value = "response,exposure")]
    pub sort_by: Vec<String>,

    /// Fold withheld from the search and scored after selection.
    #[arg(long)]
    pub test_fold: Option<usize>,

    /// Explicit grid, e.g. `1,0.1,0.01`. Overrides the log-spaced grid.
    #[arg(long)]
    pub grid: Option<String>,

    /// Smallest value of the log-spaced grid.
    #[arg(long, default_value_t = 1e-3)]
    pub grid_min: f64,

    /// Largest value of the log-spaced grid.
    #[arg(long, default_value_t = 1e3)]
    pub grid_max: f64,

    /// Number of log-spaced grid values.
    #[arg(long, default_value_t = 13)]
    pub grid_steps: usize,

    /// Which end of the grid is the simpler model.
    #[arg(long, value_enum, default_value_t = Parsimony::LargerIsSimpler)]
    pub parsimony: Parsimony,

    /// Selection rule.
    #[arg(long, value_enum, default_value_t = SelectionRule::Min)]
    pub rule: SelectionRule,

    /// Report the summed deviance instead of the per-observation mean.
    #[arg(long)]
    pub unscaled: bool,

    /// Force multiplying predictions by exposure (default: on for poisson).
    #[arg(long, conflicts_with = "no_exposure_adjust")]
    pub exposure_adjust: bool,

    /// Disable multiplying predictions by exposure.
    #[arg(long)]
    pub no_exposure_adjust: bool,

    /// Weight deviance terms by the exposure column (default: on for gamma).
    #[arg(long, conflicts_with = "no_exposure_weights")]
    pub exposure_weights: bool,

    /// Disable exposure weights.
    #[arg(long)]
    pub no_exposure_weights: bool,

    /// Evaluate grid cells one at a time.
    #[arg(long)]
    pub sequential: bool,

    /// Worker threads for grid evaluation (0 = rayon default).
    #[arg(long, env = "CV_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Export the score matrix to CSV.
    #[arg(long = "export-scores", value_name = "CSV")]
    pub export_scores: Option<PathBuf>,

    /// Export the run summary to JSON.
    #[arg(long = "export-summary", value_name = "JSON")]
    pub export_summary: Option<PathBuf>,
}
