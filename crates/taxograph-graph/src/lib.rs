//! taxograph-graph: the graph capability behind the taxograph orchestrators.
//!
//! All graph reads and writes flow through the [`GraphStore`] and
//! [`TaxonomyReader`] traits. [`GraphClient`] implements them against Neo4j;
//! [`MemoryGraph`] implements them in-process for tests and dry runs.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryGraph;
pub use store::{GraphStore, NameStream, TaxonomyReader};
