use crate::cli::ValidateArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use relaxval::engine::progress::ProgressReporter;
use relaxval::engine::tools::runner::SystemRunner;
use relaxval::workflows;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: ValidateArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let partial_config = PartialConfig::load(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.into_validation_config(&args)?;

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Validating structures under {} (suites: {})",
        config.proteins_dir().display(),
        config
            .suites
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let summary = tokio::task::block_in_place(|| {
        workflows::validate::run(&config, &SystemRunner, &reporter)
    })?;

    info!(
        validated = summary.n_validated,
        failed = summary.n_failed,
        "Validation workflow finished."
    );
    if summary.n_failed > 0 {
        warn!("{} structure(s) could not be validated.", summary.n_failed);
    }

    println!(
        "✓ {} of {} structure(s) validated ({} failed).",
        summary.n_validated, summary.n_structures, summary.n_failed
    );
    if !summary.cached_proteins.is_empty() {
        println!(
            "  Reused existing results for: {}",
            summary.cached_proteins.join(", ")
        );
    }
    println!("  Results written to: {}", summary.output_dir.display());
    Ok(())
}
