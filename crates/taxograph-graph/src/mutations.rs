//! Write operations for the category taxonomy.
//!
//! Edge loading uses MERGE (upsert) semantics so re-importing the same file
//! leaves the stored edge set unchanged. Categories are identified by name.

use neo4rs::query;

use taxograph_core::{Batch, EntityName};

use crate::client::{GraphClient, GraphError};
use crate::queries::count_from_row;

impl GraphClient {
    // ── Schema ───────────────────────────────────────────────────

    /// Create the unique-name constraint and the name index if missing.
    pub async fn create_schema(&self) -> Result<(), GraphError> {
        self.run(query(
            "CREATE CONSTRAINT unique_category_name IF NOT EXISTS
             FOR (c:Category) REQUIRE c.name IS UNIQUE",
        ))
        .await?;

        self.run(query(
            "CREATE INDEX category_name IF NOT EXISTS FOR (c:Category) ON (c.name)",
        ))
        .await?;

        tracing::debug!("Category schema ensured");
        Ok(())
    }

    // ── Batch Operations ─────────────────────────────────────────

    /// Merge every edge of a batch in a single explicit transaction.
    pub async fn upsert_batch(&self, batch: &Batch) -> Result<(), GraphError> {
        let rows: Vec<Vec<String>> = batch
            .edges()
            .iter()
            .map(|edge| vec![edge.parent.to_string(), edge.child.to_string()])
            .collect();

        let q = query(
            "UNWIND $rows AS row
             MERGE (c:Category {name: row[0]})
             MERGE (s:Category {name: row[1]})
             MERGE (c)-[:HAS_SUBCATEGORY]->(s)",
        )
        .param("rows", rows);

        let mut txn = self.start_txn().await?;
        txn.run(q).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Detach-delete up to `limit` categories in one statement.
    /// Returns the count of deleted nodes.
    pub async fn delete_batch(&self, limit: u64) -> Result<u64, GraphError> {
        let q = query(
            "MATCH (n:Category)
             WITH n LIMIT $batch_size
             DETACH DELETE n
             RETURN count(n) AS deleted_count",
        )
        .param("batch_size", limit as i64);

        match self.query_one(q).await? {
            Some(row) => Ok(count_from_row(&row, "deleted_count")?.max(0) as u64),
            None => Ok(0),
        }
    }

    // ── Renames ──────────────────────────────────────────────────

    /// Rename a category. Returns `false` if `old` does not exist.
    pub async fn rename_node(&self, old: &EntityName, new: &EntityName) -> Result<bool, GraphError> {
        if !self.node_exists(old).await? {
            return Ok(false);
        }
        if self.node_exists(new).await? {
            return Err(GraphError::Conflict {
                name: new.to_string(),
            });
        }

        let q = query("MATCH (c:Category {name: $old}) SET c.name = $new")
            .param("old", old.to_string())
            .param("new", new.to_string());
        self.run(q).await?;

        tracing::info!(old = %old, new = %new, "Renamed category");
        Ok(true)
    }
}
