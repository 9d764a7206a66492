//! Error types for the taxograph-import crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] taxograph_graph::GraphError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Import worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
