use crate::cli::TrialsArgs;
use crate::error::{CliError, Result};
use relaxval::engine::config::TrialsConfig;
use relaxval::workflows::trials;
use std::path::PathBuf;
use tracing::info;

/// A single directory argument expands to the `trial_<N>_results.csv` files it holds.
fn resolve_inputs(inputs: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    match inputs.as_slice() {
        [dir] if dir.is_dir() => Ok(trials::discover_trials(dir)?),
        _ => {
            if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
                return Err(CliError::Argument(format!(
                    "trial file not found: {}",
                    missing.display()
                )));
            }
            Ok(inputs)
        }
    }
}

pub async fn run(args: TrialsArgs) -> Result<()> {
    if args.cv_threshold <= 0.0 {
        return Err(CliError::Argument(format!(
            "--cv-threshold must be positive, got {}",
            args.cv_threshold
        )));
    }
    let inputs = resolve_inputs(args.inputs)?;
    let output_dir = match args.output {
        Some(dir) => dir,
        None => inputs
            .first()
            .and_then(|p| p.parent())
            .map(PathBuf::from)
            .unwrap_or_default(),
    };
    info!("Comparing {} trial(s)", inputs.len());

    let mut config = TrialsConfig::new(inputs, output_dir);
    config.cv_threshold_pct = args.cv_threshold;
    let report = tokio::task::block_in_place(|| trials::run(&config))?;

    for metric in &report.metrics {
        println!(
            "  {:<20} CV {:>8.4}%  {}",
            metric.metric,
            metric.cv_pct,
            if metric.consistent { "consistent" } else { "VARIABLE" }
        );
    }
    if report.all_consistent() {
        println!("✓ All metrics consistent across {} trials.", config.inputs.len());
    } else {
        println!("⚠ Some metrics vary across trials.");
    }
    println!(
        "  Summary written to: {}",
        config.output_dir.join(trials::SUMMARY_FILE).display()
    );
    Ok(())
}
