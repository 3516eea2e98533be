use crate::cli::DiscoverArgs;
use crate::error::{CliError, Result};
use relaxval::core::catalog::{self, StructureEntry};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use tracing::info;

pub async fn run(args: DiscoverArgs) -> Result<()> {
    info!("Discovering structures under {:?}", &args.root);
    let entries = catalog::discover(&args.root, &args.proteins)?;

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            catalog::write_catalog(&entries, File::create(path)?)
                .map_err(|e| CliError::Other(e.into()))?;
            println!("{}", summary(&entries));
            println!("Catalog written to: {}", path.display());
        }
        None => {
            catalog::write_catalog(&entries, io::stdout().lock())
                .map_err(|e| CliError::Other(e.into()))?;
        }
    }
    Ok(())
}

fn summary(entries: &[StructureEntry]) -> String {
    let proteins: BTreeSet<&str> = entries.iter().map(|e| e.protein.as_str()).collect();
    let compressed = entries.iter().filter(|e| e.compressed).count();
    format!(
        "Found {} structure(s) across {} protein(s) ({} compressed).",
        entries.len(),
        proteins.len(),
        compressed
    )
}
