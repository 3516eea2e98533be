use crate::core::catalog::{self, Category, StructureEntry};
use crate::core::io::pdb::PdbFile;
use crate::core::io::staging::{self, StagedFile};
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::Structure;
use crate::core::stats::descriptive::mean;
use crate::core::table::{self, MetricRecord, MetricTable};
use crate::engine::checks::{geometry, posebusters};
use crate::engine::config::{Suite, ValidationConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tools::molprobity::MolProbity;
use crate::engine::tools::rosetta;
use crate::engine::tools::runner::CommandRunner;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const POSEBUSTERS_RESULTS: &str = "posebusters_results.csv";
pub const POSEBUSTERS_RAW: &str = "posebusters_raw.csv";
pub const MOLPROBITY_RESULTS: &str = "molprobity_results.csv";
pub const GEOMETRY_RESULTS: &str = "geometry_results.csv";
pub const FULL_RESULTS_CSV: &str = "full_validation_results.csv";
pub const FULL_RESULTS_JSON: &str = "full_validation_results.json";
pub const SUMMARY_FILE: &str = "VALIDATION_SUMMARY.md";

/// Metrics tabulated per category and subcategory in the protein summary.
const SUMMARY_METRICS: [&str; 4] = [
    "rama_favored_pct",
    "rota_favored_pct",
    "clashscore",
    "molprobity_score",
];

/// Rows produced by each suite, in catalog order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteRecords {
    pub posebusters: Vec<MetricRecord>,
    pub posebusters_raw: Vec<MetricRecord>,
    pub molprobity: Vec<MetricRecord>,
    pub geometry: Vec<MetricRecord>,
}

impl SuiteRecords {
    fn append(&mut self, mut other: SuiteRecords) {
        self.posebusters.append(&mut other.posebusters);
        self.posebusters_raw.append(&mut other.posebusters_raw);
        self.molprobity.append(&mut other.molprobity);
        self.geometry.append(&mut other.geometry);
    }

    fn push(&mut self, result: EntryResult) {
        if let Some((pass, raw)) = result.posebusters {
            self.posebusters.push(pass);
            self.posebusters_raw.push(raw);
        }
        self.molprobity.extend(result.molprobity);
        self.geometry.extend(result.geometry);
    }

    /// Each non-empty table with the file name it is written to.
    fn tables(&self) -> [(&'static str, &[MetricRecord]); 4] {
        [
            (POSEBUSTERS_RESULTS, &self.posebusters),
            (POSEBUSTERS_RAW, &self.posebusters_raw),
            (MOLPROBITY_RESULTS, &self.molprobity),
            (GEOMETRY_RESULTS, &self.geometry),
        ]
    }

    /// All suites joined on the key columns.
    pub fn joined(&self) -> Vec<MetricRecord> {
        let tables: Vec<MetricTable> = self
            .tables()
            .into_iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(_, records)| MetricTable::from_records(records))
            .collect();
        MetricTable::join(&tables)
            .rows()
            .map(|row| row.to_record())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub n_structures: usize,
    pub n_validated: usize,
    pub n_failed: usize,
    pub cached_proteins: Vec<String>,
    pub output_dir: PathBuf,
    pub records: SuiteRecords,
}

#[derive(Debug, Default)]
struct EntryResult {
    posebusters: Option<(MetricRecord, MetricRecord)>,
    molprobity: Option<MetricRecord>,
    geometry: Option<MetricRecord>,
    failed: bool,
}

/// Files a protein's analysis directory must hold for it to count as cached.
fn expected_files(config: &ValidationConfig) -> Vec<&'static str> {
    let mut files = Vec::new();
    if config.runs(Suite::PoseBusters) {
        files.extend([POSEBUSTERS_RESULTS, POSEBUSTERS_RAW]);
    }
    if config.runs(Suite::MolProbity) {
        files.push(MOLPROBITY_RESULTS);
    }
    if config.runs(Suite::Geometry) {
        files.push(GEOMETRY_RESULTS);
    }
    files
}

#[instrument(skip_all, name = "validation_workflow")]
pub fn run<R>(
    config: &ValidationConfig,
    runner: &R,
    reporter: &ProgressReporter,
) -> Result<ValidationSummary, EngineError>
where
    R: CommandRunner + ?Sized,
{
    reporter.phase_start("Discovering structures");
    let entries = catalog::discover(&config.root, &config.proteins)
        .map_err(|e| EngineError::io(config.proteins_dir(), e))?;
    reporter.report(Progress::PhaseFinish);
    if entries.is_empty() {
        return Err(EngineError::NoInput(format!(
            "no structures found under {}",
            config.proteins_dir().display()
        )));
    }

    let mut by_protein: BTreeMap<&str, Vec<&StructureEntry>> = BTreeMap::new();
    for entry in &entries {
        by_protein.entry(&entry.protein).or_default().push(entry);
    }

    let required = expected_files(config);
    let mut cached = Vec::new();
    let mut pending: Vec<&StructureEntry> = Vec::new();
    for (protein, group) in &by_protein {
        let dir = config.analysis_dir(protein);
        if config.skip_existing && required.iter().all(|f| dir.join(f).is_file()) {
            info!(protein = %protein, "Results already present; skipping.");
            reporter.message(format!("{protein}: cached"));
            cached.push(protein.to_string());
        } else {
            pending.extend(group.iter().copied());
        }
    }

    info!(
        structures = entries.len(),
        pending = pending.len(),
        cached = cached.len(),
        suites = ?config.suites,
        "Starting validation."
    );

    let rosetta_binary = if config.runs(Suite::PoseBusters) {
        rosetta::locate_score_binary(config.tools.rosetta_score.as_deref())
    } else {
        None
    };
    if config.runs(Suite::PoseBusters) && rosetta_binary.is_none() {
        info!("No score_jd2 binary found; internal energy test disabled.");
    }

    reporter.phase_start("Validating structures");
    reporter.report(Progress::TaskStart {
        total: pending.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = pending.iter();

    #[cfg(feature = "parallel")]
    let iterator = pending.par_iter();

    // Collecting an indexed iterator keeps catalog order.
    let results: Vec<EntryResult> = iterator
        .map(|entry| {
            let result = validate_entry(entry, config, runner, rosetta_binary.as_deref());
            reporter.report(Progress::TaskIncrement { amount: 1 });
            result
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let n_failed = results.iter().filter(|r| r.failed).count();
    let mut fresh: BTreeMap<String, SuiteRecords> = BTreeMap::new();
    for (entry, result) in pending.iter().zip(results) {
        fresh.entry(entry.protein.clone()).or_default().push(result);
    }

    reporter.phase_start("Writing results");
    let mut compiled = SuiteRecords::default();
    for protein in by_protein.keys() {
        let dir = config.analysis_dir(protein);
        let records = match fresh.remove(*protein) {
            Some(records) => {
                write_suite_tables(&dir, &records)?;
                write_protein_summary(&dir.join(SUMMARY_FILE), protein, &records)?;
                records
            }
            None => load_cached(&dir, &required)?,
        };
        compiled.append(records);
    }

    fs::create_dir_all(&config.output_dir)
        .map_err(|e| EngineError::io(&config.output_dir, e))?;
    write_suite_tables(&config.output_dir, &compiled)?;
    let full = compiled.joined();
    table::write_records_csv(&config.output_dir.join(FULL_RESULTS_CSV), &full)?;
    table::write_records_json(&config.output_dir.join(FULL_RESULTS_JSON), &full)?;
    reporter.report(Progress::PhaseFinish);

    info!(
        validated = pending.len(),
        failed = n_failed,
        output = %config.output_dir.display(),
        "Validation finished."
    );

    Ok(ValidationSummary {
        n_structures: entries.len(),
        n_validated: pending.len(),
        n_failed,
        cached_proteins: cached,
        output_dir: config.output_dir.clone(),
        records: compiled,
    })
}

fn load_structure(entry: &StructureEntry) -> Result<Structure, String> {
    PdbFile::read_from_path(&entry.path)
        .map(|(structure, _)| structure)
        .map_err(|e| {
            warn!(structure = %entry.path.display(), "Could not read structure: {}", e);
            e.to_string()
        })
}

fn stage_entry(entry: &StructureEntry) -> Result<StagedFile, String> {
    staging::stage(&entry.path).map_err(|e| {
        warn!(structure = %entry.path.display(), "Could not stage structure: {}", e);
        format!("staging failed: {e}")
    })
}

/// Every selected suite for one structure. Failures become an `error` column.
fn validate_entry<R>(
    entry: &StructureEntry,
    config: &ValidationConfig,
    runner: &R,
    rosetta_binary: Option<&Path>,
) -> EntryResult
where
    R: CommandRunner + ?Sized,
{
    let keyed = MetricRecord::keyed(entry);
    let failed_row = |message: &str| {
        let mut record = keyed.clone();
        record.set("error", message.to_string());
        record
    };
    let with_metrics = |metrics: &MetricRecord| {
        let mut record = keyed.clone();
        record.merge(metrics);
        record
    };

    let needs_structure = config.runs(Suite::PoseBusters) || config.runs(Suite::Geometry);
    let structure = needs_structure.then(|| load_structure(entry));
    let needs_staging =
        config.runs(Suite::MolProbity) || (config.runs(Suite::PoseBusters) && rosetta_binary.is_some());
    let staged = needs_staging.then(|| stage_entry(entry));

    let mut result = EntryResult::default();

    if config.runs(Suite::PoseBusters) {
        result.posebusters = Some(match &structure {
            Some(Ok(structure)) => {
                let rosetta_score = match (rosetta_binary, &staged) {
                    (Some(binary), Some(Ok(file))) => {
                        rosetta::score(runner, binary, file.path(), config.timeouts.rosetta)
                            .unwrap_or_else(|e| {
                                warn!(structure = %entry.path.display(), "Rosetta scoring failed: {}", e);
                                None
                            })
                    }
                    _ => None,
                };
                let report = posebusters::evaluate(structure, &config.thresholds, rosetta_score);
                (with_metrics(&report.pass), with_metrics(&report.raw))
            }
            Some(Err(message)) => (failed_row(message), failed_row(message)),
            None => (failed_row("structure not loaded"), failed_row("structure not loaded")),
        });
    }

    if config.runs(Suite::MolProbity) {
        result.molprobity = Some(match &staged {
            Some(Ok(file)) => {
                with_metrics(&MolProbity::new(runner, &config.tools, config.timeouts).evaluate(file.path()))
            }
            Some(Err(message)) => failed_row(message),
            None => failed_row("structure not staged"),
        });
    }

    if config.runs(Suite::Geometry) {
        result.geometry = Some(match &structure {
            Some(Ok(structure)) => with_metrics(&geometry::evaluate(structure)),
            Some(Err(message)) => failed_row(message),
            None => failed_row("structure not loaded"),
        });
    }

    result.failed =
        matches!(structure, Some(Err(_))) || matches!(staged, Some(Err(_)));
    result
}

fn write_suite_tables(dir: &Path, records: &SuiteRecords) -> Result<(), EngineError> {
    for (file, rows) in records.tables() {
        if !rows.is_empty() {
            table::write_records_csv(&dir.join(file), rows)?;
        }
    }
    Ok(())
}

fn load_cached(dir: &Path, files: &[&str]) -> Result<SuiteRecords, EngineError> {
    let read = |file: &str| -> Result<Vec<MetricRecord>, EngineError> {
        if !files.contains(&file) {
            return Ok(Vec::new());
        }
        let table = MetricTable::from_path(&dir.join(file))?;
        Ok(table.rows().map(|row| row.to_record()).collect())
    };
    Ok(SuiteRecords {
        posebusters: read(POSEBUSTERS_RESULTS)?,
        posebusters_raw: read(POSEBUSTERS_RAW)?,
        molprobity: read(MOLPROBITY_RESULTS)?,
        geometry: read(GEOMETRY_RESULTS)?,
    })
}

/// Markdown overview of one protein: structures per category and the mean of
/// each headline metric per category and subcategory.
pub fn protein_summary(protein: &str, records: &SuiteRecords) -> String {
    let joined = MetricTable::from_records(&records.joined());
    let mut out = String::new();
    let _ = writeln!(out, "# Validation Summary: {protein}\n");

    let mut per_category: BTreeMap<Category, usize> = BTreeMap::new();
    for row in joined.rows() {
        if let Some(category) = row.category() {
            *per_category.entry(category).or_default() += 1;
        }
    }
    let _ = writeln!(out, "## Structures\n");
    let _ = writeln!(out, "| Category | Structures |");
    let _ = writeln!(out, "|---|---|");
    for (category, n) in &per_category {
        let _ = writeln!(out, "| {category} | {n} |");
    }

    for metric in SUMMARY_METRICS {
        let mut groups: BTreeMap<_, Vec<f64>> = BTreeMap::new();
        for row in joined.rows() {
            if let (Some(category), Some(sub), Some(value)) =
                (row.category(), row.subcategory(), row.number(metric))
            {
                groups.entry((category, sub)).or_default().push(value);
            }
        }
        if groups.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n## {metric}\n");
        let _ = writeln!(out, "| Category | Subcategory | Mean | N |");
        let _ = writeln!(out, "|---|---|---|---|");
        for ((category, sub), values) in &groups {
            let _ = writeln!(
                out,
                "| {} | {} | {:.2} | {} |",
                category,
                sub,
                mean(values).unwrap_or(f64::NAN),
                values.len()
            );
        }
    }
    out
}

fn write_protein_summary(path: &Path, protein: &str, records: &SuiteRecords) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    fs::write(path, protein_summary(protein, records)).map_err(|e| EngineError::io(path, e))
}
