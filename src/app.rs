//! Top-level application orchestration.
//!
//! `src/main.rs` only sets up logging and maps errors to exit codes; this
//! module is the "real main" that:
//! - turns CLI arguments into run configurations
//! - runs the cross-validation pipeline
//! - prints the report
//! - writes optional exports

use crate::cli::{Command, RunArgs, SimulateArgs};
use crate::cv::{log_space, parse_grid};
use crate::data::{simulate_portfolio, structural_columns};
use crate::domain::{CvConfig, DataSource, SimConfig};
use crate::error::AppError;
use crate::io::report::RunSummary;

pub mod pipeline;

/// Dispatch a parsed command.
pub fn run(command: Command) -> Result<(), AppError> {
    match command {
        Command::Run(args) => handle_run(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    configure_threads(args.threads)?;
    let config = cv_config_from_args(&args)?;
    let run = pipeline::run_cv(&config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));
    println!("{}", crate::report::format_grid_table(&run));
    println!("{}", crate::report::format_selection(&run));

    if let Some(path) = &config.export_scores {
        crate::io::export::write_scores_csv(path, &run.scores)?;
        tracing::info!(path = %path.display(), "wrote score matrix");
    }
    if let Some(path) = &config.export_summary {
        crate::io::report::write_summary_json(path, &RunSummary::new(&run, &config))?;
        tracing::info!(path = %path.display(), "wrote run summary");
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let sim = SimConfig {
        n_policies: args.sim.n_policies,
        seed: args.sim.seed,
        family: args.family,
    };
    let data = simulate_portfolio(&sim)?;
    let (response, exposure) = structural_columns(args.family);
    crate::io::export::write_dataset_csv(&args.out, &data, response, exposure)?;

    let stats = data.stats();
    println!(
        "Wrote {} rows to {} (response column `{response}`, exposure column `{exposure}`; total exposure {:.2})",
        stats.n_rows,
        args.out.display(),
        stats.total_exposure
    );
    Ok(())
}

/// Size rayon's global pool. `0` keeps rayon's default.
fn configure_threads(threads: usize) -> Result<(), AppError> {
    if threads == 0 {
        return Ok(());
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| AppError::new(2, format!("Failed to configure {threads} worker threads: {e}")))
}

pub fn cv_config_from_args(args: &RunArgs) -> Result<CvConfig, AppError> {
    let source = match &args.csv {
        Some(path) => DataSource::Csv {
            path: path.clone(),
            response_col: args.response_col.clone(),
            exposure_col: args.exposure_col.clone(),
        },
        None => DataSource::Simulated(SimConfig {
            n_policies: args.sim.n_policies,
            seed: args.sim.seed,
            family: args.family,
        }),
    };

    let grid = match &args.grid {
        Some(spec) => parse_grid(spec)?,
        None => log_space(args.grid_min, args.grid_max, args.grid_steps)?,
    };

    let exposure_adjust = resolve_flag(
        args.exposure_adjust,
        args.no_exposure_adjust,
        args.family.default_exposure_adjust(),
    );
    let weight_by_exposure = resolve_flag(
        args.exposure_weights,
        args.no_exposure_weights,
        args.family.default_weight_by_exposure(),
    );

    Ok(CvConfig {
        source,
        family: args.family,
        learner: args.learner,
        credibility_column: args.credibility_column.clone(),
        k: args.folds,
        sort_keys: args.sort_by.clone(),
        test_fold: args.test_fold,
        grid,
        parsimony: args.parsimony,
        rule: args.rule,
        scaled: !args.unscaled,
        exposure_adjust,
        weight_by_exposure,
        parallel: !args.sequential,
        export_scores: args.export_scores.clone(),
        export_summary: args.export_summary.clone(),
    })
}

fn resolve_flag(on: bool, off: bool, default: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;
    use crate::domain::Family;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["cv", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Run(args) => args,
            Command::Simulate(_) => panic!("expected run"),
        }
    }

    #[test]
    fn family_drives_exposure_defaults() {
        let cfg = cv_config_from_args(&run_args(&[])).unwrap();
        assert!(cfg.exposure_adjust);
        assert!(!cfg.weight_by_exposure);

        let cfg = cv_config_from_args(&run_args(&["--family", "gamma"])).unwrap();
        assert!(!cfg.exposure_adjust);
        assert!(cfg.weight_by_exposure);

        let cfg = cv_config_from_args(&run_args(&["--family", "gamma", "--no-exposure-weights"])).unwrap();
        assert!(!cfg.weight_by_exposure);
    }

    #[test]
    fn default_grid_is_log_spaced_descending() {
        let cfg = cv_config_from_args(&run_args(&[])).unwrap();
        assert_eq!(cfg.grid.len(), 13);
        assert_eq!(cfg.grid[0], 1e3);
        assert_eq!(cfg.grid[12], 1e-3);
        assert!(cfg.grid.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn explicit_grid_and_csv_source() {
        let cfg = cv_config_from_args(&run_args(&["--grid", "1,0.5", "--csv", "claims.csv", "--unscaled"])).unwrap();
        assert_eq!(cfg.grid, vec![1.0, 0.5]);
        assert!(!cfg.scaled);
        assert!(matches!(cfg.source, DataSource::Csv { .. }));
        assert_eq!(cfg.family, Family::Poisson);
    }

    #[test]
    fn bad_grid_is_a_config_error() {
        let err = cv_config_from_args(&run_args(&["--grid", "1,-2"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
