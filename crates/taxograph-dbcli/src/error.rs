//! Error types for the taxograph-dbcli crate.

use thiserror::Error;

use taxograph_core::{Classify, EntityName, ErrorKind};
use taxograph_graph::GraphError;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Searching at depth 0 is not possible.")]
    ZeroDepth,

    #[error("Node '{0}' does not exist in the database.")]
    EntityNotFound(EntityName),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl Classify for SearchError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroDepth | Self::EntityNotFound(_) => ErrorKind::Validation,
            Self::Graph(e) => e.kind(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("Invalid delete settings: {0}")]
    Config(String),
}

/// Top-level error for a goal invocation.
#[derive(Error, Debug)]
pub enum DbcliError {
    #[error("{0}")]
    Usage(String),

    #[error("Node '{0}' does not exist in the database.")]
    NotFound(EntityName),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Delete(#[from] DeleteError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Invalid name: {0}")]
    Name(#[from] taxograph_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classify for DbcliError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) | Self::NotFound(_) | Self::Name(_) => ErrorKind::Validation,
            Self::Delete(_) => ErrorKind::Validation,
            Self::Search(e) => e.kind(),
            Self::Graph(e) => e.kind(),
            Self::Io(_) => ErrorKind::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbcliError>;
