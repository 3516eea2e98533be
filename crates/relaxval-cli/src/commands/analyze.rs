use crate::cli::AnalyzeArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use relaxval::engine::progress::ProgressReporter;
use relaxval::workflows;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: AnalyzeArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = PartialConfig::load(&args.config)?.into_analysis_config(&args);

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Analysing compiled results in {}", config.input_dir.display());
    let report =
        tokio::task::block_in_place(|| workflows::analyze::run(&config, &reporter))?;
    info!(
        rows = report.n_rows,
        metrics = report.metrics.len(),
        tables = report.outputs.len(),
        "Analysis workflow finished."
    );

    println!(
        "✓ Analysed {} metric(s) over {} structure(s).",
        report.metrics.len(),
        report.n_rows
    );
    for (path, rows) in &report.outputs {
        println!("  {} ({} rows)", path.display(), rows);
    }
    Ok(())
}
