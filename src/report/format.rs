//! Formatted terminal output for a cross-validation run.

use crate::app::pipeline::RunOutput;
use crate::domain::{CvConfig, DataSource, SelectionRule};

/// Format the run header: data source, dataset stats, folds, and settings.
pub fn format_run_summary(run: &RunOutput, config: &CvConfig) -> String {
    let mut out = String::new();
    let stats = run.ingest.dataset.stats();

    out.push_str("=== cv - Deviance Cross-Validation ===\n");
    match &config.source {
        DataSource::Csv { path, .. } => out.push_str(&format!("Data: {}\n", path.display())),
        DataSource::Simulated(sim) => out.push_str(&format!(
            "Data: simulated {} portfolio (policies={}, seed={})\n",
            sim.family.display_name(),
            sim.n_policies,
            sim.seed
        )),
    }
    out.push_str(&format!(
        "Rows: used={} read={} skipped={} | missing response={}\n",
        run.ingest.rows_used,
        run.ingest.rows_read,
        run.ingest.row_errors.len(),
        stats.n_missing
    ));
    out.push_str(&format!(
        "Totals: response={:.3} exposure={:.3} | covariates={}\n",
        stats.total_response, stats.total_exposure, stats.n_covariates
    ));
    out.push_str(&format!(
        "Family: {} | learner: {}\n",
        config.family.display_name(),
        run.learner
    ));
    out.push_str(&format!(
        "Scoring: scaled={} exposure_adjust={} weight_by_exposure={}\n",
        config.scaled, config.exposure_adjust, config.weight_by_exposure
    ));

    let sizes: Vec<String> = run
        .assignment
        .sizes()
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{}:{n}", i + 1))
        .collect();
    out.push_str(&format!(
        "Folds: k={} sorted by [{}] | sizes {}\n",
        run.assignment.k(),
        run.sort_keys.join(", "),
        sizes.join(" ")
    ));
    match config.test_fold {
        Some(t) => out.push_str(&format!("Test fold: {t} (withheld from the search)\n")),
        None => out.push_str("Test fold: none\n"),
    }
    out.push('\n');

    out
}

/// Format the per-grid-value table with the selection markers.
///
/// `*` marks the minimum mean deviance, `>` the value picked by the rule when
/// it differs from the minimum.
pub fn format_grid_table(run: &RunOutput) -> String {
    let mut out = String::new();
    let sel = &run.selection;
    let labels: Vec<String> = run.scores.splits().iter().map(|s| s.label()).collect();

    let mut header = format!("  {:>12} {:>12} {:>12}", "param", "mean", "std_err");
    for l in &labels {
        header.push_str(&format!(" {l:>10}"));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    let mut rule = format!("  {:-<12} {:-<12} {:-<12}", "", "", "");
    for _ in &labels {
        rule.push_str(&format!(" {:-<10}", ""));
    }
    out.push_str(&rule);
    out.push('\n');

    for (i, point) in run.scores.summary().iter().enumerate() {
        let marker = if i == sel.selected_index && i != sel.min_index {
            '>'
        } else if i == sel.min_index {
            '*'
        } else {
            ' '
        };
        let mut line = format!(
            "{marker} {:>12} {:>12.6} {:>12.6}",
            fmt_param(point.param),
            point.mean,
            point.std_err
        );
        for v in run.scores.row(i) {
            line.push_str(&format!(" {v:>10.5}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Format the selection and, when present, the hold-out score.
pub fn format_selection(run: &RunOutput) -> String {
    let mut out = String::new();
    let sel = &run.selection;

    out.push_str("\nSelection:\n");
    out.push_str(&format!(
        "- minimum mean deviance: {} at param={}\n",
        fmt_score(sel.min_mean),
        fmt_param(sel.min_param)
    ));
    match (sel.rule, sel.threshold) {
        (SelectionRule::OneSe, Some(threshold)) => out.push_str(&format!(
            "- one-SE rule (threshold {}): param={} mean={}\n",
            fmt_score(threshold),
            fmt_param(sel.selected_param),
            fmt_score(sel.selected_mean)
        )),
        _ => out.push_str(&format!("- selected: param={}\n", fmt_param(sel.selected_param))),
    }

    if let Some(h) = &run.holdout {
        out.push_str(&format!(
            "- test fold {}: deviance={} (refit on {} rows, scored on {})\n",
            h.test_fold,
            fmt_score(h.deviance),
            h.n_train,
            h.n_test
        ));
    }

    out
}

fn fmt_param(v: f64) -> String {
    if v != 0.0 && (v.abs() < 1e-3 || v.abs() >= 1e5) {
        format!("{v:.3e}")
    } else {
        format!("{v}")
    }
}

fn fmt_score(v: f64) -> String {
    format!("{v:.6}")
}
