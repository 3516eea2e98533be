use crate::cli::DockqArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use relaxval::engine::progress::ProgressReporter;
use relaxval::engine::tools::runner::SystemRunner;
use relaxval::workflows::{self, dockq};
use tokio::sync::mpsc;
use tracing::warn;

pub async fn run(args: DockqArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = PartialConfig::load(&args.config)?.into_dockq_config(&args)?;

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let report = tokio::task::block_in_place(|| {
        workflows::dockq::run(&config, &SystemRunner, &reporter)
    })?;

    if !report.missing_natives.is_empty() {
        warn!(
            "No native structure for target(s): {}",
            report.missing_natives.join(", ")
        );
    }
    println!(
        "✓ Scored {} of {} prediction(s).",
        report.n_scored, report.n_predictions
    );
    println!(
        "  Results: {}",
        config.output_dir.join(dockq::RESULTS_FILE).display()
    );
    println!(
        "  Summary: {}",
        config.output_dir.join(dockq::SUMMARY_FILE).display()
    );
    Ok(())
}
