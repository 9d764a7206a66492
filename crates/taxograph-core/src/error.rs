use thiserror::Error;

/// Top-level error type for shared taxograph plumbing.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid entity name: {0:?}")]
    InvalidEntityName(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How a failure should be treated by the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Contention or a temporary store condition; may succeed if retried.
    Transient,
    /// The store could not be reached (connection, pool, I/O).
    Unavailable,
    /// Bad input or a missing entity. Never retried.
    Validation,
    /// Anything else. Never retried.
    Fatal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Unavailable => "unavailable",
            Self::Validation => "validation",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can report an [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for CoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEntityName(_) => ErrorKind::Validation,
            _ => ErrorKind::Fatal,
        }
    }
}
