use crate::cli::FiguresArgs;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use relaxval::engine::config::FiguresConfig;
use relaxval::engine::progress::ProgressReporter;
use relaxval::workflows;
use tokio::sync::mpsc;

pub async fn run(args: FiguresArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let mut config = FiguresConfig::new(args.input);
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(metric) = args.metric {
        config.distribution_metric = metric;
    }

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let report =
        tokio::task::block_in_place(|| workflows::figures::run(&config, &reporter))?;

    println!("✓ {} figure(s) written:", report.written.len());
    for path in &report.written {
        println!("  {}", path.display());
    }
    Ok(())
}
