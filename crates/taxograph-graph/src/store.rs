//! The capability interface the orchestrators call through.
//!
//! Implementations must accept concurrent calls from many tasks on one
//! shared handle.

use async_trait::async_trait;
use futures::stream::BoxStream;

use taxograph_core::{Batch, EntityName, PathTrace};

use crate::client::{GraphClient, GraphError};

/// A lazily consumed stream of entity names from a listing query.
pub type NameStream = BoxStream<'static, Result<EntityName, GraphError>>;

/// Operations the import, deletion, and path search pipelines need.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create the uniqueness constraint and name index. Safe to repeat.
    async fn ensure_schema(&self) -> Result<(), GraphError>;

    async fn entity_exists(&self, name: &EntityName) -> Result<bool, GraphError>;

    /// Direct successors of `name`, ordered by name.
    async fn children(&self, name: &EntityName) -> Result<Vec<EntityName>, GraphError>;

    /// Every directed path of 1 to `max_hops` edges from `start` to `end`.
    async fn paths_within(
        &self,
        start: &EntityName,
        end: &EntityName,
        max_hops: u32,
    ) -> Result<Vec<PathTrace>, GraphError>;

    /// One shortest path between the two entities, ignoring edge direction.
    async fn shortest_path(
        &self,
        start: &EntityName,
        end: &EntityName,
    ) -> Result<Option<PathTrace>, GraphError>;

    /// Merge every edge of `batch` (and its endpoints) in one transaction.
    async fn upsert_edges(&self, batch: &Batch) -> Result<(), GraphError>;

    /// Detach-delete up to `limit` entities. Returns how many were removed.
    async fn delete_up_to(&self, limit: u64) -> Result<u64, GraphError>;
}

/// Read-only taxonomy exploration queries.
#[async_trait]
pub trait TaxonomyReader: Send + Sync {
    async fn list_children(&self, name: &EntityName) -> Result<NameStream, GraphError>;
    async fn count_children(&self, name: &EntityName) -> Result<i64, GraphError>;
    async fn list_grandchildren(&self, name: &EntityName) -> Result<NameStream, GraphError>;
    async fn list_parents(&self, name: &EntityName) -> Result<NameStream, GraphError>;
    async fn count_parents(&self, name: &EntityName) -> Result<i64, GraphError>;
    async fn list_grandparents(&self, name: &EntityName) -> Result<NameStream, GraphError>;
    /// Number of distinct entity names.
    async fn count_unique(&self) -> Result<i64, GraphError>;
    /// Entities without a parent.
    async fn list_roots(&self) -> Result<NameStream, GraphError>;
    /// The entity with the most children.
    async fn most_children(&self) -> Result<NameStream, GraphError>;
    /// Every entity whose child count equals the smallest non-zero count.
    async fn least_children(&self) -> Result<NameStream, GraphError>;
    /// Rename `old` to `new`. Returns `false` when `old` does not exist.
    async fn rename(&self, old: &EntityName, new: &EntityName) -> Result<bool, GraphError>;
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn ensure_schema(&self) -> Result<(), GraphError> {
        self.create_schema().await
    }

    async fn entity_exists(&self, name: &EntityName) -> Result<bool, GraphError> {
        self.node_exists(name).await
    }

    async fn children(&self, name: &EntityName) -> Result<Vec<EntityName>, GraphError> {
        self.child_names(name).await
    }

    async fn paths_within(
        &self,
        start: &EntityName,
        end: &EntityName,
        max_hops: u32,
    ) -> Result<Vec<PathTrace>, GraphError> {
        self.paths_between(start, end, max_hops).await
    }

    async fn shortest_path(
        &self,
        start: &EntityName,
        end: &EntityName,
    ) -> Result<Option<PathTrace>, GraphError> {
        self.shortest_path_between(start, end).await
    }

    async fn upsert_edges(&self, batch: &Batch) -> Result<(), GraphError> {
        self.upsert_batch(batch).await
    }

    async fn delete_up_to(&self, limit: u64) -> Result<u64, GraphError> {
        self.delete_batch(limit).await
    }
}
