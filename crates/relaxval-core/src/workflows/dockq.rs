use crate::core::catalog::natural_cmp;
use crate::core::io::staging;
use crate::core::stats::descriptive::{mean, median, std_dev};
use crate::core::table::{self, MetricRecord, MetricValue};
use crate::engine::config::DockQConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tools::dockq::{self, DockQScore};
use crate::engine::tools::runner::CommandRunner;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const RESULTS_FILE: &str = "dockq_results.csv";
pub const SUMMARY_FILE: &str = "dockq_summary.csv";

/// One predicted complex to score against its target's native.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub target: String,
    pub source: String,
    pub protocol: String,
    pub model: String,
    pub path: PathBuf,
}

/// Bound native of `target`, searched flat and then under `natives/{target}/`.
pub fn find_native(natives_dir: &Path, target: &str) -> Option<PathBuf> {
    let names = [
        format!("{target}_bound.pdb"),
        format!("{target}.pdb"),
        format!("{target}_complex.pdb"),
    ];
    [natives_dir.to_path_buf(), natives_dir.join(target)]
        .iter()
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut entries = fs::read_dir(dir)
        .and_then(|rd| rd.map(|e| e.map(|e| e.path())).collect::<Result<Vec<_>, _>>())
        .map_err(|e| EngineError::io(dir, e))?;
    entries.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(entries)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn model_name(path: &Path) -> String {
    let name = file_name(path);
    name.strip_suffix(".pdb.gz")
        .or_else(|| name.strip_suffix(".pdb"))
        .unwrap_or(name)
        .to_string()
}

fn pdb_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    if !dir.is_dir() {
        return Ok(());
    }
    for path in sorted_entries(dir)? {
        if path.is_dir() {
            if recursive {
                pdb_files(&path, true, out)?;
            }
        } else if file_name(&path).ends_with(".pdb") || file_name(&path).ends_with(".pdb.gz") {
            out.push(path);
        }
    }
    Ok(())
}

/// Every prediction of one target directory, by source and protocol.
pub fn collect_predictions(target_dir: &Path) -> Result<Vec<Prediction>, EngineError> {
    let target = file_name(target_dir).to_string();
    let mut found = Vec::new();
    let mut push = |source: &str, protocol: &str, files: Vec<PathBuf>| {
        for path in files {
            found.push(Prediction {
                target: target.clone(),
                source: source.to_string(),
                protocol: protocol.to_string(),
                model: model_name(&path),
                path,
            });
        }
    };

    let ranked = |dir: &Path| -> Result<Vec<PathBuf>, EngineError> {
        let mut files = Vec::new();
        pdb_files(dir, false, &mut files)?;
        files.retain(|p| {
            let name = file_name(p);
            name.starts_with("ranked_") && name.ends_with(".pdb")
        });
        Ok(files)
    };
    push("AlphaFold", "amber", ranked(&target_dir.join("af_out"))?);
    push("AlphaFold", "unrelaxed", ranked(&target_dir.join("af_out_unrelaxed"))?);

    let mut boltz = Vec::new();
    pdb_files(&target_dir.join("boltz_out"), true, &mut boltz)?;
    boltz.retain(|p| file_name(p).ends_with(".pdb"));
    push("Boltz", "raw", boltz);

    let rosetta_dir = target_dir.join("rosetta_out");
    if rosetta_dir.is_dir() {
        for protocol_dir in sorted_entries(&rosetta_dir)? {
            if !protocol_dir.is_dir() {
                continue;
            }
            let mut files = Vec::new();
            pdb_files(&protocol_dir, true, &mut files)?;
            push("Rosetta", file_name(&protocol_dir), files);
        }
    }
    Ok(found)
}

fn score_prediction<R>(runner: &R, config: &DockQConfig, prediction: &Prediction, native: &Path) -> MetricRecord
where
    R: CommandRunner + ?Sized,
{
    let mut record = MetricRecord::new();
    record.set("target", prediction.target.as_str());
    record.set("source", prediction.source.as_str());
    record.set("protocol", prediction.protocol.as_str());
    record.set("model", prediction.model.as_str());
    record.set("native", file_name(native));

    let outcome = staging::stage(&prediction.path)
        .map_err(|e| format!("staging failed: {e}"))
        .and_then(|staged| {
            dockq::assess(runner, &config.dockq, staged.path(), native, config.timeout)
                .map_err(|e| e.to_string())
        });
    let (score, error) = match outcome {
        Ok(score) => (score, None),
        Err(message) => {
            warn!(model = %prediction.path.display(), "DockQ failed: {}", message);
            (DockQScore::default(), Some(message))
        }
    };

    record.set("dockq", MetricValue::from_option(score.dockq, 3));
    record.set("fnat", MetricValue::from_option(score.fnat, 3));
    record.set("irms", MetricValue::from_option(score.irms, 3));
    record.set("lrms", MetricValue::from_option(score.lrms, 3));
    record.set(
        "quality",
        score
            .quality()
            .map_or(MetricValue::Missing, |q| MetricValue::from(q.as_str())),
    );
    record.set("success", error.is_none());
    record.set("error", error.map_or(MetricValue::Missing, MetricValue::from));
    record
}

/// Mean, median, std and n of DockQ per source, then the mean per protocol.
pub fn summarize(results: &[MetricRecord]) -> Vec<MetricRecord> {
    let mut by_source: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut by_protocol: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in results {
        let Some(score) = record.number("dockq") else {
            continue;
        };
        if let Some(source) = record.text("source") {
            by_source.entry(source).or_default().push(score);
        }
        if let Some(protocol) = record.text("protocol") {
            by_protocol.entry(protocol).or_default().push(score);
        }
    }

    let row = |group: &str, name: &str, scores: &[f64]| {
        let mut r = MetricRecord::new();
        r.set("group", group);
        r.set("name", name);
        r.set("n", MetricValue::count(scores.len()));
        r.set("mean_dockq", MetricValue::from_option(mean(scores), 3));
        r.set("median_dockq", MetricValue::from_option(median(scores), 3));
        r.set("std_dockq", MetricValue::from_option(std_dev(scores), 3));
        r
    };
    by_source
        .iter()
        .map(|(source, scores)| row("source", *source, scores.as_slice()))
        .chain(
            by_protocol
                .iter()
                .map(|(protocol, scores)| row("protocol", *protocol, scores.as_slice())),
        )
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct DockQReport {
    pub n_predictions: usize,
    pub n_scored: usize,
    pub missing_natives: Vec<String>,
    pub results: Vec<MetricRecord>,
    pub summary: Vec<MetricRecord>,
}

#[instrument(skip_all, name = "dockq_workflow")]
pub fn run<R>(config: &DockQConfig, runner: &R, reporter: &ProgressReporter) -> Result<DockQReport, EngineError>
where
    R: CommandRunner + ?Sized,
{
    reporter.phase_start("Collecting predictions");
    let mut pairs = Vec::new();
    let mut missing_natives = Vec::new();
    for target_dir in sorted_entries(&config.predictions_dir)? {
        if !target_dir.is_dir() {
            continue;
        }
        let target = file_name(&target_dir).to_string();
        if !config.targets.is_empty() && !config.targets.contains(&target) {
            continue;
        }
        let Some(native) = find_native(&config.natives_dir, &target) else {
            warn!(target = %target, "No native structure found; target skipped.");
            missing_natives.push(target);
            continue;
        };
        for prediction in collect_predictions(&target_dir)? {
            pairs.push((prediction, native.clone()));
        }
    }
    reporter.report(Progress::PhaseFinish);

    if pairs.is_empty() {
        return Err(EngineError::NoInput(format!(
            "no scorable predictions under {}",
            config.predictions_dir.display()
        )));
    }
    info!(predictions = pairs.len(), "Scoring predictions with DockQ.");

    reporter.phase_start("Running DockQ");
    reporter.report(Progress::TaskStart {
        total: pairs.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = pairs.iter();

    #[cfg(feature = "parallel")]
    let iterator = pairs.par_iter();

    let results: Vec<MetricRecord> = iterator
        .map(|(prediction, native)| {
            let record = score_prediction(runner, config, prediction, native);
            reporter.report(Progress::TaskIncrement { amount: 1 });
            record
        })
        .collect();
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let summary = summarize(&results);
    table::write_summary_csv(&config.output_dir.join(RESULTS_FILE), &results)?;
    table::write_summary_csv(&config.output_dir.join(SUMMARY_FILE), &summary)?;

    let n_scored = results.iter().filter(|r| r.number("dockq").is_some()).count();
    for row in summary.iter().filter(|r| r.text("group") == Some("source")) {
        info!(
            source = row.text("name").unwrap_or_default(),
            n = row.number("n").unwrap_or_default(),
            mean = row.number("mean_dockq"),
            "DockQ summary."
        );
    }
    info!(
        predictions = results.len(),
        scored = n_scored,
        output = %config.output_dir.display(),
        "DockQ analysis finished."
    );

    Ok(DockQReport {
        n_predictions: results.len(),
        n_scored,
        missing_natives,
        results,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::DockQConfigBuilder;
    use crate::engine::tools::runner::ToolOutput;
    use crate::test_support::FakeRunner;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "END\n").unwrap();
    }

    fn layout() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "natives/1ABC_bound.pdb");
        touch(root, "natives/2XYZ/2XYZ.pdb");
        for rel in [
            "pred/1ABC/af_out/ranked_0.pdb",
            "pred/1ABC/af_out/ranked_1.pdb",
            "pred/1ABC/af_out/features.pkl",
            "pred/1ABC/af_out_unrelaxed/ranked_0.pdb",
            "pred/1ABC/boltz_out/predictions/1ABC/model_0.pdb",
            "pred/2XYZ/boltz_out/model_0.pdb",
            "pred/3NON/af_out/ranked_0.pdb",
        ] {
            touch(root, rel);
        }
        let gz = root.join("pred/1ABC/rosetta_out/normal_beta/ranked_0_0001.pdb.gz");
        fs::create_dir_all(gz.parent().unwrap()).unwrap();
        let mut encoder = GzEncoder::new(fs::File::create(gz).unwrap(), Compression::default());
        encoder.write_all(b"END\n").unwrap();
        encoder.finish().unwrap();
        dir
    }

    fn config(root: &Path) -> DockQConfig {
        DockQConfigBuilder::new()
            .natives_dir(root.join("natives"))
            .predictions_dir(root.join("pred"))
            .output_dir(root.join("out"))
            .build()
            .unwrap()
    }

    #[test]
    fn natives_are_found_flat_or_nested() {
        let dir = layout();
        let natives = dir.path().join("natives");
        assert_eq!(
            find_native(&natives, "1ABC"),
            Some(natives.join("1ABC_bound.pdb"))
        );
        assert_eq!(
            find_native(&natives, "2XYZ"),
            Some(natives.join("2XYZ").join("2XYZ.pdb"))
        );
        assert_eq!(find_native(&natives, "3NON"), None);
    }

    #[test]
    fn predictions_are_labelled_by_layout() {
        let dir = layout();
        let found = collect_predictions(&dir.path().join("pred/1ABC")).unwrap();
        let labels: Vec<(&str, &str, &str)> = found
            .iter()
            .map(|p| (p.source.as_str(), p.protocol.as_str(), p.model.as_str()))
            .collect();
        assert_eq!(
            labels,
            [
                ("AlphaFold", "amber", "ranked_0"),
                ("AlphaFold", "amber", "ranked_1"),
                ("AlphaFold", "unrelaxed", "ranked_0"),
                ("Boltz", "raw", "model_0"),
                ("Rosetta", "normal_beta", "ranked_0_0001"),
            ]
        );
    }

    #[test]
    fn summary_groups_by_source_then_protocol() {
        let record = |source: &str, protocol: &str, score: Option<f64>| {
            let mut r = MetricRecord::new();
            r.set("source", source);
            r.set("protocol", protocol);
            r.set("dockq", MetricValue::from_option(score, 3));
            r
        };
        let summary = summarize(&[
            record("AlphaFold", "amber", Some(0.6)),
            record("AlphaFold", "unrelaxed", Some(0.4)),
            record("Boltz", "raw", Some(0.3)),
            record("Boltz", "raw", None),
        ]);
        assert_eq!(summary.len(), 5);
        assert_eq!(summary[0].text("name"), Some("AlphaFold"));
        assert_eq!(summary[0].number("mean_dockq"), Some(0.5));
        assert_eq!(summary[0].number("n"), Some(2.0));
        assert_eq!(summary[1].text("name"), Some("Boltz"));
        assert!(summary[1].get("std_dockq").unwrap().is_missing());
        assert_eq!(summary[2].text("group"), Some("protocol"));
    }

    #[test]
    fn run_scores_every_prediction_with_a_native() {
        let dir = layout();
        let runner = FakeRunner::new(|_| Ok(ToolOutput::ok("Fnat 0.5\niRMS 1.5\nLRMS 4.0\nDockQ 0.512\n")));
        let report = run(&config(dir.path()), &runner, &ProgressReporter::new()).unwrap();

        assert_eq!(report.n_predictions, 6);
        assert_eq!(report.n_scored, 6);
        assert_eq!(report.missing_natives, ["3NON"]);
        assert!(report
            .results
            .iter()
            .all(|r| r.text("quality") == Some("medium")));
        assert!(dir.path().join("out").join(RESULTS_FILE).is_file());
        assert!(dir.path().join("out").join(SUMMARY_FILE).is_file());
        // The compressed Rosetta model is staged to a plain temporary file.
        assert!(runner.calls().iter().all(|c| {
            c.args[0].to_string_lossy().ends_with(".pdb")
        }));
    }

    #[test]
    fn tool_failures_become_error_rows() {
        let dir = layout();
        let runner = FakeRunner::missing_tools();
        let mut cfg = config(dir.path());
        cfg.targets = vec!["2XYZ".to_string()];
        let report = run(&cfg, &runner, &ProgressReporter::new()).unwrap();
        assert_eq!(report.n_predictions, 1);
        assert_eq!(report.n_scored, 0);
        assert_eq!(report.results[0].get("success"), Some(&MetricValue::Bool(false)));
        assert!(report.results[0].text("error").unwrap().contains("DockQ"));
    }
}
