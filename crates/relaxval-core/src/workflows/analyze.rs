use crate::core::catalog::{Category, Protocol, Subcategory};
use crate::core::stats::correlation::{Correlation, complete_pairs, pearson, spearman};
use crate::core::stats::descriptive::{Summary, mean, std_dev};
use crate::core::stats::effect::{Magnitude, cliffs_delta, cohens_d, glass_delta};
use crate::core::stats::hypothesis::{kruskal_wallis, mann_whitney_u, wilcoxon_signed_rank};
use crate::core::table::{self, MetricRecord, MetricTable, MetricValue, Row};
use crate::engine::checks::posebusters;
use crate::engine::config::AnalysisConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::workflows::validate::{
    GEOMETRY_RESULTS, MOLPROBITY_RESULTS, POSEBUSTERS_RAW, POSEBUSTERS_RESULTS,
};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const SIGNIFICANCE: f64 = 0.05;
/// Smallest group size for which relaxation effects get a Mann-Whitney p-value.
const MIN_GROUP_FOR_TEST: usize = 5;
const MIN_PAIRS: usize = 3;

const TABLE1_METRICS: [&str; 6] = [
    "clashscore",
    "molprobity_score",
    "rama_favored_pct",
    "rota_outliers_pct",
    "bond_rmsz",
    "angle_rmsz",
];

/// Joins every compiled suite table found in `dir` on the key columns.
pub fn load_compiled(dir: &Path) -> Result<MetricTable, EngineError> {
    let mut tables = Vec::new();
    for file in [
        MOLPROBITY_RESULTS,
        GEOMETRY_RESULTS,
        POSEBUSTERS_RESULTS,
        POSEBUSTERS_RAW,
    ] {
        let path = dir.join(file);
        if !path.is_file() {
            debug!(file = %path.display(), "Compiled table not present.");
            continue;
        }
        let table = MetricTable::from_path(&path)?;
        table.require_keys()?;
        tables.push(table);
    }
    if tables.is_empty() {
        return Err(EngineError::NoInput(format!(
            "no compiled validation tables in {}",
            dir.display()
        )));
    }
    Ok(MetricTable::join(&tables))
}

fn select_metrics(table: &MetricTable, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        return table.numeric_columns();
    }
    requested
        .iter()
        .filter(|metric| {
            let present = table.has_column(metric);
            if !present {
                warn!(metric = %metric, "Metric not found in compiled tables; skipped.");
            }
            present
        })
        .cloned()
        .collect()
}

fn is_pass_column(metric: &str) -> bool {
    metric == "all_pass" || posebusters::TESTS.contains(&metric)
}

fn higher_is_better(metric: &str) -> bool {
    metric.ends_with("favored_pct") || is_pass_column(metric)
}

fn finite(value: Option<f64>) -> MetricValue {
    value
        .filter(|v| v.is_finite())
        .map_or(MetricValue::Missing, MetricValue::Float)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelFilter {
    Any,
    Ranked0,
    OtherRanked,
}

impl ModelFilter {
    fn baseline(self, model: &str) -> bool {
        match self {
            ModelFilter::Any => true,
            ModelFilter::Ranked0 => model == "ranked_0",
            ModelFilter::OtherRanked => model != "ranked_0",
        }
    }

    fn relaxed(self, model: &str) -> bool {
        match self {
            ModelFilter::Any => true,
            ModelFilter::Ranked0 => model.starts_with("ranked_0"),
            ModelFilter::OtherRanked => !model.starts_with("ranked_0"),
        }
    }
}

const SOURCES: [(&str, Category, ModelFilter); 4] = [
    ("Experimental", Category::Experimental, ModelFilter::Any),
    ("AF ranked_0", Category::AlphaFold, ModelFilter::Ranked0),
    ("AF ranked_1-4", Category::AlphaFold, ModelFilter::OtherRanked),
    ("Boltz", Category::Boltz, ModelFilter::Any),
];

/// Statistics over one joined validation table.
pub struct Analysis<'t> {
    table: &'t MetricTable,
    metrics: Vec<String>,
    groups: Vec<(Category, Subcategory)>,
}

impl<'t> Analysis<'t> {
    pub fn new(table: &'t MetricTable, metrics: Vec<String>) -> Self {
        let groups: BTreeSet<(Category, Subcategory)> = table
            .rows()
            .filter_map(|row| Some((row.category()?, row.subcategory()?)))
            .collect();
        Self {
            table,
            metrics,
            groups: groups.into_iter().collect(),
        }
    }

    pub(crate) fn groups(&self) -> &[(Category, Subcategory)] {
        &self.groups
    }

    fn values(&self, metric: &str, keep: impl Fn(&Row) -> bool) -> Vec<f64> {
        self.table
            .rows()
            .filter(|row| keep(row))
            .filter_map(|row| row.number(metric))
            .collect()
    }

    pub(crate) fn in_group(row: &Row, category: Category, sub: &Subcategory) -> bool {
        row.category() == Some(category) && row.subcategory().as_ref() == Some(sub)
    }

    pub(crate) fn group_values(&self, category: Category, sub: &Subcategory, metric: &str) -> Vec<f64> {
        self.values(metric, |row| Self::in_group(row, category, sub))
    }

    /// Mean of `metric` per protein over the rows `keep` accepts.
    pub(crate) fn protein_means_where(
        &self,
        metric: &str,
        keep: impl Fn(&Row) -> bool,
    ) -> BTreeMap<String, f64> {
        let mut per_protein: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in self.table.rows().filter(|row| keep(row)) {
            if let Some(value) = row.number(metric) {
                per_protein
                    .entry(row.protein().to_string())
                    .or_default()
                    .push(value);
            }
        }
        per_protein
            .into_iter()
            .filter_map(|(protein, values)| Some((protein, mean(&values)?)))
            .collect()
    }

    fn protein_means(
        &self,
        category: Category,
        sub: &Subcategory,
        metric: &str,
    ) -> BTreeMap<String, f64> {
        self.protein_means_where(metric, |row| Self::in_group(row, category, sub))
    }

    /// Every (category, protocol) with relaxed structures, in catalog order.
    pub(crate) fn relaxations(&self) -> Vec<(Category, Protocol)> {
        self.groups
            .iter()
            .filter_map(|(category, sub)| Some((*category, sub.protocol()?.clone())))
            .collect()
    }

    /// Baseline and relaxed values of one metric for one relaxation.
    fn before_after(
        &self,
        category: Category,
        protocol: &Protocol,
        metric: &str,
    ) -> (Vec<f64>, Vec<f64>) {
        (
            self.group_values(category, &Subcategory::baseline_for(category), metric),
            self.group_values(category, &Subcategory::Relaxed(protocol.clone()), metric),
        )
    }

    pub fn descriptive(&self) -> Vec<MetricRecord> {
        let mut rows = Vec::new();
        for (category, sub) in &self.groups {
            for metric in &self.metrics {
                let Some(s) = Summary::of(&self.group_values(*category, sub, metric)) else {
                    continue;
                };
                let mut r = MetricRecord::new();
                r.set("category", category.as_str());
                r.set("subcategory", sub.to_string());
                r.set("metric", metric.as_str());
                r.set("N", MetricValue::count(s.n));
                r.set("Mean", MetricValue::rounded(s.mean, 4));
                r.set("Std", MetricValue::from_option(s.std, 4));
                r.set("Min", MetricValue::rounded(s.min, 4));
                r.set("Q1", MetricValue::rounded(s.q1, 4));
                r.set("Median", MetricValue::rounded(s.median, 4));
                r.set("Q3", MetricValue::rounded(s.q3, 4));
                r.set("Max", MetricValue::rounded(s.max, 4));
                r.set("IQR", MetricValue::rounded(s.iqr, 4));
                r.set("Skewness", MetricValue::from_option(s.skewness, 4));
                r.set("Kurtosis", MetricValue::from_option(s.kurtosis, 4));
                r.set("CV%", MetricValue::from_option(s.cv_pct, 2));
                rows.push(r);
            }
        }
        rows
    }

    /// Kruskal-Wallis across categories and pairwise Mann-Whitney, baselines only.
    pub fn category_comparisons(&self) -> Vec<MetricRecord> {
        let mut rows = Vec::new();
        for metric in &self.metrics {
            let groups: Vec<(Category, Vec<f64>)> = Category::ALL
                .iter()
                .map(|&c| {
                    let values =
                        self.values(metric, |row| row.category() == Some(c) && row.is_baseline());
                    (c, values)
                })
                .filter(|(_, values)| !values.is_empty())
                .collect();
            if groups.len() < 2 {
                continue;
            }
            let slices: Vec<&[f64]> = groups.iter().map(|(_, v)| v.as_slice()).collect();
            let kruskal = kruskal_wallis(&slices);

            for ((a, xa), (b, xb)) in groups.iter().tuple_combinations() {
                let test = mann_whitney_u(xa, xb);
                let mut r = MetricRecord::new();
                r.set("metric", metric.as_str());
                r.set("comparison", format!("{a} vs {b}"));
                r.set("kruskal_h", finite(kruskal.map(|t| t.statistic)));
                r.set("kruskal_p", finite(kruskal.map(|t| t.p_value)));
                r.set("u_statistic", finite(test.map(|t| t.statistic)));
                r.set("p_value", finite(test.map(|t| t.p_value)));
                r.set(
                    "effect_size",
                    MetricValue::from_option(
                        test.map(|t| t.statistic / (xa.len() * xb.len()) as f64),
                        4,
                    ),
                );
                if let Some(t) = test {
                    r.set("significant", t.p_value < SIGNIFICANCE);
                }
                rows.push(r);
            }
        }
        rows
    }

    /// Square correlation matrix over all rows, pairwise-complete.
    pub fn correlation_matrix(
        &self,
        method: fn(&[f64], &[f64]) -> Option<Correlation>,
    ) -> Vec<MetricRecord> {
        let columns: Vec<Vec<Option<f64>>> = self
            .metrics
            .iter()
            .map(|m| self.table.rows().map(|row| row.number(m)).collect())
            .collect();
        self.metrics
            .iter()
            .zip(&columns)
            .map(|(metric, x)| {
                let mut r = MetricRecord::new();
                r.set("metric", metric.as_str());
                for (other, y) in self.metrics.iter().zip(&columns) {
                    let (a, b) = complete_pairs(x, y);
                    r.set(other, MetricValue::from_option(method(&a, &b).map(|c| c.r), 4));
                }
                r
            })
            .collect()
    }

    pub fn relaxation_effects(&self) -> Vec<MetricRecord> {
        let mut rows = Vec::new();
        for (category, protocol) in self.relaxations() {
            for metric in &self.metrics {
                let (before, after) = self.before_after(category, &protocol, metric);
                let (Some(before_mean), Some(after_mean)) = (mean(&before), mean(&after)) else {
                    continue;
                };
                let change = after_mean - before_mean;
                let p_value = (before.len() >= MIN_GROUP_FOR_TEST && after.len() >= MIN_GROUP_FOR_TEST)
                    .then(|| mann_whitney_u(&before, &after))
                    .flatten()
                    .map(|t| t.p_value);

                let mut r = MetricRecord::new();
                r.set("category", category.as_str());
                r.set("protocol", protocol.as_str());
                r.set("metric", metric.as_str());
                r.set("baseline_n", MetricValue::count(before.len()));
                r.set("baseline_mean", MetricValue::rounded(before_mean, 4));
                r.set("relaxed_n", MetricValue::count(after.len()));
                r.set("relaxed_mean", MetricValue::rounded(after_mean, 4));
                r.set("change", MetricValue::rounded(change, 4));
                r.set(
                    "pct_change",
                    MetricValue::from_option(
                        (before_mean != 0.0).then(|| 100.0 * change / before_mean.abs()),
                        2,
                    ),
                );
                r.set("p_value", finite(p_value));
                rows.push(r);
            }
        }
        rows
    }

    /// Rows outside the Tukey fences of each metric.
    pub fn outliers(&self) -> Vec<MetricRecord> {
        let mut rows = Vec::new();
        for metric in &self.metrics {
            let Some(summary) = Summary::of(&self.values(metric, |_| true)) else {
                continue;
            };
            let (lower, upper) = summary.fences();
            for row in self.table.rows() {
                let Some(value) = row.number(metric) else {
                    continue;
                };
                let violated = if value < lower {
                    Some(("lower", lower))
                } else if value > upper {
                    Some(("upper", upper))
                } else {
                    None
                };
                let Some((bound, limit)) = violated else {
                    continue;
                };
                let mut r = MetricRecord::new();
                r.set("metric", metric.as_str());
                for key in table::KEY_COLUMNS {
                    r.set(key, row.text(key).unwrap_or_default());
                }
                r.set("value", MetricValue::Float(value));
                r.set("bound", bound);
                r.set("limit", MetricValue::rounded(limit, 4));
                rows.push(r);
            }
        }
        rows
    }

    /// Cohen's d, Glass' delta and Cliff's delta of relaxed against baseline.
    pub fn effect_sizes(&self) -> Vec<MetricRecord> {
        let mut rows = Vec::new();
        for (category, protocol) in self.relaxations() {
            for metric in &self.metrics {
                let (before, after) = self.before_after(category, &protocol, metric);
                if before.is_empty() || after.is_empty() {
                    continue;
                }
                let d = cohens_d(&after, &before);
                let mut r = MetricRecord::new();
                r.set("category", category.as_str());
                r.set("protocol", protocol.as_str());
                r.set("metric", metric.as_str());
                r.set("cohens_d", MetricValue::from_option(d, 4));
                r.set(
                    "glass_delta",
                    MetricValue::from_option(glass_delta(&after, &before), 4),
                );
                r.set(
                    "cliffs_delta",
                    MetricValue::from_option(cliffs_delta(&after, &before), 4),
                );
                r.set(
                    "interpretation",
                    d.map_or(MetricValue::Missing, |d| {
                        MetricValue::from(Magnitude::of_cohens_d(d).to_string())
                    }),
                );
                rows.push(r);
            }
        }
        rows
    }

    /// Paired Wilcoxon signed-rank tests on per-protein means.
    pub fn paired_tests(&self) -> Vec<MetricRecord> {
        let mut rows = Vec::new();
        for (category, protocol) in self.relaxations() {
            let baseline = Subcategory::baseline_for(category);
            let relaxed = Subcategory::Relaxed(protocol.clone());
            for metric in &self.metrics {
                let before = self.protein_means(category, &baseline, metric);
                let after = self.protein_means(category, &relaxed, metric);
                let (b, a): (Vec<f64>, Vec<f64>) = before
                    .iter()
                    .filter_map(|(protein, bv)| after.get(protein).map(|av| (*bv, *av)))
                    .unzip();
                if b.len() < MIN_PAIRS {
                    continue;
                }
                let improvements: Vec<f64> = b.iter().zip(&a).map(|(x, y)| x - y).collect();
                let test = wilcoxon_signed_rank(&b, &a);

                let mut r = MetricRecord::new();
                r.set("category", category.as_str());
                r.set("protocol", protocol.as_str());
                r.set("metric", metric.as_str());
                r.set("n_pairs", MetricValue::count(b.len()));
                r.set("baseline_mean", MetricValue::from_option(mean(&b), 4));
                r.set("relaxed_mean", MetricValue::from_option(mean(&a), 4));
                r.set("mean_improvement", MetricValue::from_option(mean(&improvements), 4));
                r.set("statistic", finite(test.map(|t| t.statistic)));
                r.set("p_value", finite(test.map(|t| t.p_value)));
                r.set(
                    "significant",
                    test.is_some_and(|t| t.p_value < SIGNIFICANCE),
                );
                rows.push(r);
            }
        }
        rows
    }

    /// Mean ± std of the headline metrics for every group.
    pub fn table1(&self) -> Vec<MetricRecord> {
        let metrics: Vec<&str> = TABLE1_METRICS
            .iter()
            .copied()
            .filter(|m| self.table.has_column(m))
            .collect();
        self.groups
            .iter()
            .map(|(category, sub)| {
                let n = self
                    .table
                    .rows()
                    .filter(|row| Self::in_group(row, *category, sub))
                    .count();
                let mut r = MetricRecord::new();
                r.set("category", category.as_str());
                r.set("subcategory", sub.to_string());
                r.set("N", MetricValue::count(n));
                for metric in &metrics {
                    let values = self.group_values(*category, sub, metric);
                    let cell = match (mean(&values), std_dev(&values)) {
                        (Some(m), Some(s)) => MetricValue::from(format!("{m:.2} ± {s:.2}")),
                        (Some(m), None) => MetricValue::from(format!("{m:.2}")),
                        _ => MetricValue::Missing,
                    };
                    r.set(metric, cell);
                }
                r
            })
            .collect()
    }

    /// Before/after overview per source configuration, with best and worst protocols.
    pub fn scorecard(&self) -> Vec<MetricRecord> {
        let mut metrics: Vec<String> = self.metrics.clone();
        for column in self.table.columns() {
            if is_pass_column(column) && !metrics.contains(column) {
                metrics.push(column.clone());
            }
        }

        let mut rows = Vec::new();
        for (source, category, filter) in SOURCES {
            let baseline_sub = Subcategory::baseline_for(category);
            for metric in &metrics {
                let scale = if is_pass_column(metric) { 100.0 } else { 1.0 };
                let before: Vec<f64> = self
                    .values(metric, |row| {
                        Self::in_group(row, category, &baseline_sub) && filter.baseline(row.model())
                    })
                    .into_iter()
                    .map(|v| v * scale)
                    .collect();

                let mut per_protocol: Vec<(Protocol, Vec<f64>)> = Vec::new();
                for (c, protocol) in self.relaxations() {
                    if c != category {
                        continue;
                    }
                    let relaxed = Subcategory::Relaxed(protocol.clone());
                    let values: Vec<f64> = self
                        .values(metric, |row| {
                            Self::in_group(row, category, &relaxed) && filter.relaxed(row.model())
                        })
                        .into_iter()
                        .map(|v| v * scale)
                        .collect();
                    if !values.is_empty() {
                        per_protocol.push((protocol, values));
                    }
                }
                let after: Vec<f64> = per_protocol.iter().flat_map(|(_, v)| v.clone()).collect();

                let (Some(before_summary), Some(after_summary)) =
                    (Summary::of(&before), Summary::of(&after))
                else {
                    continue;
                };

                let higher = higher_is_better(metric);
                let protocol_means: Vec<(&Protocol, f64)> = per_protocol
                    .iter()
                    .filter_map(|(p, v)| Some((p, mean(v)?)))
                    .collect();
                let ranked = protocol_means
                    .iter()
                    .sorted_by(|x, y| x.1.total_cmp(&y.1))
                    .collect::<Vec<_>>();
                let (best, worst) = if higher {
                    (ranked.last(), ranked.first())
                } else {
                    (ranked.first(), ranked.last())
                };

                let mut r = MetricRecord::new();
                r.set("source", source);
                r.set("metric", metric.as_str());
                r.set("unit", if scale == 100.0 { "pass_rate_pct" } else { "value" });
                r.set("better", if higher { "higher" } else { "lower" });
                r.set("before_mean", MetricValue::rounded(before_summary.mean, 4));
                r.set("before_min", MetricValue::rounded(before_summary.min, 4));
                r.set("before_max", MetricValue::rounded(before_summary.max, 4));
                r.set("after_mean", MetricValue::rounded(after_summary.mean, 4));
                r.set("after_min", MetricValue::rounded(after_summary.min, 4));
                r.set("after_max", MetricValue::rounded(after_summary.max, 4));
                r.set(
                    "delta",
                    MetricValue::rounded(after_summary.mean - before_summary.mean, 4),
                );
                r.set(
                    "best_protocol",
                    best.map_or(MetricValue::Missing, |(p, _)| MetricValue::from(p.as_str())),
                );
                r.set("best_value", finite(best.map(|(_, v)| *v)));
                r.set(
                    "worst_protocol",
                    worst.map_or(MetricValue::Missing, |(p, _)| MetricValue::from(p.as_str())),
                );
                r.set("worst_value", finite(worst.map(|(_, v)| *v)));
                rows.push(r);
            }
        }
        rows
    }

    /// PoseBusters pass rates in percent for every protein within every group.
    pub fn pass_rates(&self) -> Vec<MetricRecord> {
        let pass_columns: Vec<&String> = self
            .table
            .columns()
            .iter()
            .filter(|column| is_pass_column(column))
            .collect();
        if pass_columns.is_empty() {
            return Vec::new();
        }
        let proteins: BTreeSet<&str> = self.table.rows().map(|row| row.protein()).collect();

        let mut rows = Vec::new();
        for protein in proteins {
            for (category, sub) in &self.groups {
                let members: Vec<Row> = self
                    .table
                    .rows()
                    .filter(|row| row.protein() == protein && Self::in_group(row, *category, sub))
                    .collect();
                if members.is_empty() {
                    continue;
                }
                let mut r = MetricRecord::new();
                r.set("protein", protein);
                r.set("category", category.as_str());
                r.set("subcategory", sub.to_string());
                r.set("N", MetricValue::count(members.len()));
                for column in &pass_columns {
                    let values: Vec<f64> = members.iter().filter_map(|row| row.number(column)).collect();
                    r.set(
                        &format!("{column}_pct"),
                        MetricValue::from_option(mean(&values).map(|m| m * 100.0), 1),
                    );
                }
                rows.push(r);
            }
        }
        rows
    }

    /// Per-protein baseline and `normal_beta` means of `metric`, paired.
    pub(crate) fn normal_beta_pairs(&self, category: Category, metric: &str) -> Vec<(String, f64, f64)> {
        let before = self.protein_means(category, &Subcategory::baseline_for(category), metric);
        let after = self.protein_means(
            category,
            &Subcategory::Relaxed(Protocol::NormalBeta),
            metric,
        );
        before
            .into_iter()
            .filter_map(|(protein, b)| {
                let a = *after.get(&protein)?;
                Some((protein, b, a))
            })
            .collect()
    }

    /// Proteins whose mean clashscore rose after `normal_beta` relaxation.
    pub fn degraded(&self) -> Vec<MetricRecord> {
        let mut worse: Vec<(Category, String, f64, f64)> = Category::ALL
            .iter()
            .flat_map(|&category| {
                self.normal_beta_pairs(category, "clashscore")
                    .into_iter()
                    .filter(|(_, before, after)| after > before)
                    .map(move |(protein, before, after)| (category, protein, before, after))
            })
            .collect();
        worse.sort_by(|x, y| (y.3 - y.2).total_cmp(&(x.3 - x.2)));

        worse
            .into_iter()
            .map(|(category, protein, before, after)| {
                let mut r = MetricRecord::new();
                r.set("protein", protein);
                r.set("category", category.as_str());
                r.set("baseline_clashscore", MetricValue::rounded(before, 3));
                r.set("relaxed_clashscore", MetricValue::rounded(after, 3));
                r.set("delta", MetricValue::rounded(after - before, 3));
                r
            })
            .collect()
    }

    /// Correlation between a protein's starting value and its change after `normal_beta`.
    pub fn initial_vs_change(&self) -> Vec<MetricRecord> {
        let mut rows = Vec::new();
        for metric in &self.metrics {
            let mut all_initial = Vec::new();
            let mut all_change = Vec::new();
            let mut scoped = Vec::new();
            for category in Category::ALL {
                let (initial, change): (Vec<f64>, Vec<f64>) = self
                    .normal_beta_pairs(category, metric)
                    .into_iter()
                    .map(|(_, before, after)| (before, after - before))
                    .unzip();
                all_initial.extend_from_slice(&initial);
                all_change.extend_from_slice(&change);
                scoped.push((category.as_str(), pearson(&initial, &change), initial.len()));
            }
            let overall = pearson(&all_initial, &all_change);
            for (scope, corr, n) in std::iter::once(("All", overall, all_initial.len())).chain(scoped) {
                if n < MIN_PAIRS {
                    continue;
                }
                let mut r = MetricRecord::new();
                r.set("metric", metric.as_str());
                r.set("scope", scope);
                r.set("n", MetricValue::count(n));
                r.set("r", MetricValue::from_option(corr.map(|c| c.r), 4));
                r.set("p_value", finite(corr.map(|c| c.p_value)));
                rows.push(r);
            }
        }
        rows
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub n_rows: usize,
    pub metrics: Vec<String>,
    /// Each written table with its row count.
    pub outputs: Vec<(PathBuf, usize)>,
}

#[instrument(skip_all, name = "analysis_workflow")]
pub fn run(config: &AnalysisConfig, reporter: &ProgressReporter) -> Result<AnalysisReport, EngineError> {
    reporter.phase_start("Loading compiled results");
    let table = load_compiled(&config.input_dir)?;
    reporter.report(Progress::PhaseFinish);

    let metrics = select_metrics(&table, &config.metrics);
    if metrics.is_empty() {
        return Err(EngineError::NoInput(
            "none of the requested metrics are present".to_string(),
        ));
    }
    info!(rows = table.len(), metrics = metrics.len(), "Running statistical analysis.");

    let analysis = Analysis::new(&table, metrics);
    reporter.phase_start("Computing statistics");
    let sections = [
        ("stats_1_descriptive.csv", analysis.descriptive()),
        ("stats_2_category_comparisons.csv", analysis.category_comparisons()),
        ("stats_3a_pearson.csv", analysis.correlation_matrix(pearson)),
        ("stats_3b_spearman.csv", analysis.correlation_matrix(spearman)),
        ("stats_4_relaxation_effects.csv", analysis.relaxation_effects()),
        ("stats_5_outliers.csv", analysis.outliers()),
        ("stats_9_effect_sizes.csv", analysis.effect_sizes()),
        ("statistical_tests.csv", analysis.paired_tests()),
        ("table1_summary_stats.csv", analysis.table1()),
        ("scorecard.csv", analysis.scorecard()),
        ("posebusters_pass_rates.csv", analysis.pass_rates()),
        ("outliers_degraded.csv", analysis.degraded()),
        ("initial_vs_change.csv", analysis.initial_vs_change()),
    ];
    reporter.report(Progress::PhaseFinish);

    reporter.phase_start("Writing tables");
    reporter.report(Progress::TaskStart {
        total: sections.len() as u64,
    });
    let mut outputs = Vec::with_capacity(sections.len());
    for (file, rows) in &sections {
        let path = config.output_dir.join(file);
        table::write_summary_csv(&path, rows)?;
        debug!(file = %path.display(), rows = rows.len(), "Wrote analysis table.");
        outputs.push((path, rows.len()));
        reporter.report(Progress::TaskIncrement { amount: 1 });
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let significant = sections
        .iter()
        .find(|(file, _)| *file == "statistical_tests.csv")
        .map_or(0, |(_, rows)| {
            rows.iter()
                .filter(|r| r.get("significant").and_then(MetricValue::as_bool) == Some(true))
                .count()
        });
    info!(
        tables = outputs.len(),
        significant_paired_tests = significant,
        output = %config.output_dir.display(),
        "Analysis finished."
    );

    Ok(AnalysisReport {
        n_rows: table.len(),
        metrics: analysis.metrics.clone(),
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::write_records_csv;

    fn row(protein: &str, category: &str, sub: &str, model: &str, clash: f64, rama: f64) -> MetricRecord {
        let mut r = MetricRecord::new();
        r.set("protein", protein);
        r.set("category", category);
        r.set("subcategory", sub);
        r.set("model", model);
        r.set("clashscore", MetricValue::Float(clash));
        r.set("rama_favored_pct", MetricValue::Float(rama));
        r
    }

    /// Six proteins; `normal_beta` lowers clashscore for all but P6.
    fn records() -> Vec<MetricRecord> {
        let mut records = Vec::new();
        for i in 1..=6 {
            let p = format!("P{i}");
            let fi = i as f64;
            records.push(row(&p, "Experimental", "original", "exp", 10.0 + fi, 90.0 + fi));
            let relaxed = if i == 6 { 20.0 } else { fi + 1.0 };
            records.push(row(&p, "Experimental", "relaxed_normal_beta", "r1", relaxed, 95.0));
            records.push(row(&p, "Experimental", "relaxed_cartesian_beta", "r1", 8.0, 97.0));
            records.push(row(&p, "AlphaFold", "raw", "ranked_0", 20.0 + fi, 92.0));
            records.push(row(&p, "AlphaFold", "raw", "ranked_1", 25.0 + fi, 91.0));
            records.push(row(&p, "Boltz", "raw", "boltz_input_model_0", 30.0 + fi, 88.0 + fi));
        }
        records
    }

    fn metrics() -> Vec<String> {
        vec!["clashscore".to_string(), "rama_favored_pct".to_string()]
    }

    fn find<'a>(rows: &'a [MetricRecord], pairs: &[(&str, &str)]) -> &'a MetricRecord {
        rows.iter()
            .find(|r| pairs.iter().all(|(k, v)| r.text(k) == Some(*v)))
            .unwrap_or_else(|| panic!("no row matching {pairs:?}"))
    }

    #[test]
    fn descriptive_statistics_per_group() {
        let table = MetricTable::from_records(&records());
        let analysis = Analysis::new(&table, metrics());
        let rows = analysis.descriptive();
        // 5 groups x 2 metrics
        assert_eq!(rows.len(), 10);
        let exp = find(
            &rows,
            &[("category", "Experimental"), ("subcategory", "original"), ("metric", "clashscore")],
        );
        assert_eq!(exp.number("N"), Some(6.0));
        assert_eq!(exp.number("Mean"), Some(13.5));
        assert_eq!(exp.number("Median"), Some(13.5));
        assert_eq!(exp.number("Std"), Some(1.8708));
    }

    #[test]
    fn category_comparisons_cover_every_pair() {
        let table = MetricTable::from_records(&records());
        let rows = Analysis::new(&table, metrics()).category_comparisons();
        assert_eq!(rows.len(), 6);
        let r = find(&rows, &[("metric", "clashscore"), ("comparison", "Experimental vs Boltz")]);
        // Every experimental value is below every Boltz value.
        assert_eq!(r.number("u_statistic"), Some(0.0));
        assert_eq!(r.number("effect_size"), Some(0.0));
        assert_eq!(r.get("significant"), Some(&MetricValue::Bool(true)));
        assert!(r.number("kruskal_p").unwrap() < 0.01);
    }

    #[test]
    fn relaxation_effects_and_paired_tests() {
        let table = MetricTable::from_records(&records());
        let analysis = Analysis::new(&table, metrics());

        let effects = analysis.relaxation_effects();
        let nb = find(
            &effects,
            &[("protocol", "normal_beta"), ("metric", "clashscore")],
        );
        assert_eq!(nb.number("baseline_mean"), Some(13.5));
        assert_eq!(nb.number("relaxed_mean"), Some(6.6667));
        assert_eq!(nb.number("change"), Some(-6.8333));
        assert!(nb.number("p_value").is_some());

        let tests = analysis.paired_tests();
        let paired = find(&tests, &[("protocol", "normal_beta"), ("metric", "clashscore")]);
        assert_eq!(paired.number("n_pairs"), Some(6.0));
        assert_eq!(paired.number("mean_improvement"), Some(6.8333));
    }

    #[test]
    fn effect_sizes_compare_relaxed_to_baseline() {
        let table = MetricTable::from_records(&records());
        let rows = Analysis::new(&table, metrics()).effect_sizes();
        let cart = find(&rows, &[("protocol", "cartesian_beta"), ("metric", "clashscore")]);
        // All relaxed values (8) lie below every baseline value (11..16).
        assert_eq!(cart.number("cliffs_delta"), Some(-1.0));
        // Constant relaxed group still has a pooled std from the baseline.
        assert!(cart.number("cohens_d").unwrap() < -0.8);
        assert_eq!(cart.text("interpretation"), Some("large"));
    }

    #[test]
    fn scorecard_honours_metric_direction() {
        let table = MetricTable::from_records(&records());
        let rows = Analysis::new(&table, metrics()).scorecard();
        let clash = find(&rows, &[("source", "Experimental"), ("metric", "clashscore")]);
        assert_eq!(clash.text("better"), Some("lower"));
        assert_eq!(clash.text("best_protocol"), Some("normal_beta"));
        assert_eq!(clash.text("worst_protocol"), Some("cartesian_beta"));
        let rama = find(&rows, &[("source", "Experimental"), ("metric", "rama_favored_pct")]);
        assert_eq!(rama.text("better"), Some("higher"));
        assert_eq!(rama.text("best_protocol"), Some("cartesian_beta"));
        // AlphaFold and Boltz have no relaxed rows in this fixture.
        assert!(rows.iter().all(|r| r.text("source") == Some("Experimental")));
    }

    #[test]
    fn degraded_proteins_and_initial_vs_change() {
        let table = MetricTable::from_records(&records());
        let analysis = Analysis::new(&table, metrics());
        let degraded = analysis.degraded();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].text("protein"), Some("P6"));
        assert_eq!(degraded[0].number("delta"), Some(4.0));

        let rows = analysis.initial_vs_change();
        let all = find(&rows, &[("metric", "clashscore"), ("scope", "All")]);
        assert_eq!(all.number("n"), Some(6.0));
        assert!(all.number("r").is_some());
    }

    #[test]
    fn pass_rates_are_reported_per_protein_and_group() {
        let mut records = Vec::new();
        for (model, bonds, all) in [("r1", true, true), ("r2", true, false), ("r3", false, false), ("r4", true, false)] {
            let mut r = row("P1", "Experimental", "relaxed_normal_beta", model, 5.0, 95.0);
            r.set("bond_lengths", MetricValue::Bool(bonds));
            r.set("all_pass", MetricValue::Bool(all));
            records.push(r);
        }
        let mut exp = row("P1", "Experimental", "original", "exp", 12.0, 90.0);
        exp.set("bond_lengths", MetricValue::Bool(false));
        exp.set("all_pass", MetricValue::Bool(false));
        records.push(exp);
        let mut other = row("P2", "Experimental", "relaxed_normal_beta", "r1", 5.0, 95.0);
        other.set("bond_lengths", MetricValue::Bool(true));
        other.set("all_pass", MetricValue::Bool(true));
        records.push(other);

        let table = MetricTable::from_records(&records);
        let rows = Analysis::new(&table, metrics()).pass_rates();
        assert_eq!(rows.len(), 3);

        let relaxed = find(&rows, &[("protein", "P1"), ("subcategory", "relaxed_normal_beta")]);
        assert_eq!(relaxed.number("N"), Some(4.0));
        assert_eq!(relaxed.number("bond_lengths_pct"), Some(75.0));
        assert_eq!(relaxed.number("all_pass_pct"), Some(25.0));
        let original = find(&rows, &[("protein", "P1"), ("subcategory", "original")]);
        assert_eq!(original.number("bond_lengths_pct"), Some(0.0));
        let p2 = find(&rows, &[("protein", "P2")]);
        assert_eq!(p2.number("all_pass_pct"), Some(100.0));
    }

    #[test]
    fn pass_rates_need_posebusters_columns() {
        let table = MetricTable::from_records(&records());
        assert!(Analysis::new(&table, metrics()).pass_rates().is_empty());
    }

    #[test]
    fn outliers_report_the_violated_fence() {
        let mut records = records();
        records.push(row("P7", "Experimental", "original", "exp", 500.0, 90.0));
        let table = MetricTable::from_records(&records);
        let rows = Analysis::new(&table, vec!["clashscore".to_string()]).outliers();
        let r = find(&rows, &[("protein", "P7")]);
        assert_eq!(r.text("bound"), Some("upper"));
        assert_eq!(r.number("value"), Some(500.0));
    }

    #[test]
    fn run_writes_every_table() {
        let dir = tempfile::tempdir().unwrap();
        write_records_csv(&dir.path().join(MOLPROBITY_RESULTS), &records()).unwrap();
        let config = AnalysisConfig::new(dir.path().to_path_buf());
        let report = run(&config, &ProgressReporter::new()).unwrap();

        assert_eq!(report.n_rows, 36);
        assert_eq!(report.metrics, ["clashscore", "rama_favored_pct"]);
        assert_eq!(report.outputs.len(), 13);
        for (path, _) in &report.outputs {
            assert!(path.is_file(), "{} missing", path.display());
        }
        let table1 = MetricTable::from_path(&config.output_dir.join("table1_summary_stats.csv")).unwrap();
        assert_eq!(
            table1.columns(),
            ["category", "subcategory", "N", "clashscore", "rama_favored_pct"]
        );
    }

    #[test]
    fn missing_inputs_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::new(dir.path().to_path_buf());
        assert!(matches!(
            run(&config, &ProgressReporter::new()),
            Err(EngineError::NoInput(_))
        ));
    }
}
