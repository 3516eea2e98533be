use thiserror::Error;

use super::config::ConfigError;
use super::tools::runner::ToolError;
use crate::core::io::pdb::PdbError;
use crate::core::table::TableError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read structure {path:?}: {source}")]
    Structure {
        path: PathBuf,
        #[source]
        source: PdbError,
    },

    #[error("External tool failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Figure rendering failed for {path:?}: {message}")]
    Render { path: PathBuf, message: String },

    #[error("No input: {0}")]
    NoInput(String),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
