use crate::core::catalog::natural_cmp;
use crate::core::stats::descriptive::{mean, population_std_dev};
use crate::core::table::{self, MetricRecord, MetricTable, MetricValue};
use crate::engine::config::{TRIAL_METRICS, TrialsConfig};
use crate::engine::error::EngineError;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub const COMPARISON_FILE: &str = "trial_comparison.csv";
pub const SUMMARY_FILE: &str = "trial_comparison_summary.txt";

/// `trial_{i}_results.csv` files in `dir`, in trial order.
pub fn discover_trials(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut trials: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| EngineError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("trial_") && n.ends_with("_results.csv"))
        })
        .collect();
    trials.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(trials)
}

/// Spread of one metric's per-trial means.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricConsistency {
    pub metric: String,
    pub trial_means: Vec<f64>,
    pub mean: f64,
    pub std: f64,
    pub cv_pct: f64,
    pub consistent: bool,
}

impl MetricConsistency {
    pub fn of(metric: &str, trial_means: Vec<f64>, cv_threshold_pct: f64) -> Option<Self> {
        let mean = mean(&trial_means)?;
        let std = population_std_dev(&trial_means)?;
        let cv_pct = if mean > 0.0 { 100.0 * std / mean } else { 0.0 };
        Some(Self {
            metric: metric.to_string(),
            trial_means,
            mean,
            std,
            cv_pct,
            consistent: cv_pct < cv_threshold_pct,
        })
    }

    fn to_record(&self) -> MetricRecord {
        let mut r = MetricRecord::new();
        r.set("metric", self.metric.as_str());
        for (i, m) in self.trial_means.iter().enumerate() {
            r.set(&format!("trial_{}_mean", i + 1), MetricValue::rounded(*m, 6));
        }
        r.set("mean", MetricValue::rounded(self.mean, 6));
        r.set("std", MetricValue::rounded(self.std, 6));
        r.set("cv_pct", MetricValue::rounded(self.cv_pct, 4));
        r.set("consistent", self.consistent);
        r
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrialsReport {
    pub structures_per_trial: Vec<usize>,
    pub metrics: Vec<MetricConsistency>,
}

impl TrialsReport {
    pub fn all_consistent(&self) -> bool {
        !self.metrics.is_empty() && self.metrics.iter().all(|m| m.consistent)
    }

    fn summary_text(&self, inputs: &[PathBuf], cv_threshold_pct: f64, zeros: &[(String, usize, usize)]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Trial comparison");
        let _ = writeln!(out, "================");
        for (i, (path, n)) in inputs.iter().zip(&self.structures_per_trial).enumerate() {
            let _ = writeln!(out, "Trial {}: {} structures ({})", i + 1, n, path.display());
        }
        let _ = writeln!(out);
        for m in &self.metrics {
            let means = m
                .trial_means
                .iter()
                .map(|v| format!("{v:.6}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "{}: means [{}], CV {:.4}% {}",
                m.metric,
                means,
                m.cv_pct,
                if m.consistent { "consistent" } else { "VARIABLE" }
            );
        }
        if !zeros.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Zero values in trial 1:");
            for (metric, count, total) in zeros {
                let _ = writeln!(
                    out,
                    "  {metric}: {count}/{total} ({:.1}%)",
                    100.0 * *count as f64 / *total as f64
                );
            }
        }
        let _ = writeln!(out);
        let verdict = if self.all_consistent() {
            format!("All metrics consistent across trials (CV < {cv_threshold_pct}%).")
        } else {
            format!("Some metrics vary across trials (CV >= {cv_threshold_pct}%).")
        };
        let _ = writeln!(out, "{verdict}");
        out
    }
}

fn column_values(table: &MetricTable, metric: &str) -> Vec<f64> {
    table.rows().filter_map(|row| row.number(metric)).collect()
}

#[instrument(skip_all, name = "trials_workflow")]
pub fn run(config: &TrialsConfig) -> Result<TrialsReport, EngineError> {
    if config.inputs.len() < 2 {
        return Err(EngineError::NoInput(format!(
            "need at least 2 trials to compare, got {}",
            config.inputs.len()
        )));
    }
    let tables = config
        .inputs
        .iter()
        .map(|path| MetricTable::from_path(path))
        .collect::<Result<Vec<_>, _>>()?;
    for (path, t) in config.inputs.iter().zip(&tables) {
        info!(trial = %path.display(), structures = t.len(), "Loaded trial.");
    }

    let mut metrics = Vec::new();
    for metric in TRIAL_METRICS {
        if !tables.iter().all(|t| t.has_column(metric)) {
            warn!(metric, "Metric absent from at least one trial; skipped.");
            continue;
        }
        let means: Option<Vec<f64>> = tables.iter().map(|t| mean(&column_values(t, metric))).collect();
        let Some(means) = means else {
            warn!(metric, "Metric has no values in at least one trial; skipped.");
            continue;
        };
        if let Some(consistency) = MetricConsistency::of(metric, means, config.cv_threshold_pct) {
            metrics.push(consistency);
        }
    }

    let zeros: Vec<(String, usize, usize)> = TRIAL_METRICS
        .iter()
        .filter_map(|&metric| {
            let values = column_values(&tables[0], metric);
            let count = values.iter().filter(|&&v| v == 0.0).count();
            (count > 0).then(|| (metric.to_string(), count, values.len()))
        })
        .collect();

    let report = TrialsReport {
        structures_per_trial: tables.iter().map(MetricTable::len).collect(),
        metrics,
    };

    let records: Vec<MetricRecord> = report.metrics.iter().map(MetricConsistency::to_record).collect();
    table::write_summary_csv(&config.output_dir.join(COMPARISON_FILE), &records)?;
    let summary_path = config.output_dir.join(SUMMARY_FILE);
    fs::write(
        &summary_path,
        report.summary_text(&config.inputs, config.cv_threshold_pct, &zeros),
    )
    .map_err(|e| EngineError::io(&summary_path, e))?;

    info!(
        trials = tables.len(),
        metrics = report.metrics.len(),
        consistent = report.all_consistent(),
        "Trial comparison finished."
    );
    Ok(report)
}
