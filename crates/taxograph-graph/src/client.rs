//! Neo4j connection management and shared graph client.

use neo4rs::{ConfigBuilder, Graph, Query};

use taxograph_core::config::Neo4jSettings;
use taxograph_core::{Classify, CoreError, ErrorKind};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Node '{name}' does not exist in the database.")]
    NotFound { name: String },

    #[error("Node '{name}' already exists")]
    Conflict { name: String },

    #[error("Transient store error: {0}")]
    Transient(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid data: {0}")]
    Invalid(#[from] CoreError),
}

impl Classify for GraphError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Transient(_) => ErrorKind::Transient,
            Self::NotFound { .. } | Self::Conflict { .. } => ErrorKind::Validation,
            Self::Query(e) => classify_neo4j_message(&e.to_string()),
            Self::Serialization(_) | Self::Invalid(_) => ErrorKind::Fatal,
        }
    }
}

/// Classify a driver error by the Neo4j status code or I/O failure it carries.
///
/// Neo4j status codes have the shape `Neo.<Classification>.<Category>.<Title>`;
/// `TransientError` is the classification the server marks as safe to retry.
pub(crate) fn classify_neo4j_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("transienterror") || lower.contains("deadlockdetected") {
        ErrorKind::Transient
    } else if lower.contains("serviceunavailable")
        || lower.contains("connection")
        || lower.contains("io error")
        || lower.contains("broken pipe")
        || lower.contains("timed out")
    {
        ErrorKind::Unavailable
    } else {
        ErrorKind::Fatal
    }
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&Neo4jSettings::default())
    }
}

impl From<&Neo4jSettings> for GraphConfig {
    fn from(settings: &Neo4jSettings) -> Self {
        Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            max_connections: settings.max_connections,
            fetch_size: settings.fetch_size,
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// One client is shared by every worker of a run. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph for direct operations.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    /// Begin a transaction. Dropping it without `commit` rolls it back.
    pub async fn start_txn(&self) -> Result<neo4rs::Txn, GraphError> {
        Ok(self.graph.start_txn().await?)
    }
}
