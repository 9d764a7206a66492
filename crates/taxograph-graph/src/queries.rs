//! Read operations against the category taxonomy.

use async_trait::async_trait;
use futures::StreamExt;
use neo4rs::{query, Query, Row};

use taxograph_core::{EntityName, PathTrace};

use crate::client::{GraphClient, GraphError};
use crate::store::{NameStream, TaxonomyReader};

impl GraphClient {
    // ── Lookups ──────────────────────────────────────────────────

    /// Check whether a category with this exact name exists.
    pub async fn node_exists(&self, name: &EntityName) -> Result<bool, GraphError> {
        let q = query("MATCH (n:Category {name: $name}) RETURN n.name AS name LIMIT 1")
            .param("name", name.to_string());
        Ok(self.query_one(q).await?.is_some())
    }

    /// Direct children of a category, ordered by name.
    pub async fn child_names(&self, name: &EntityName) -> Result<Vec<EntityName>, GraphError> {
        let q = query(
            "MATCH (:Category {name: $name})-[:HAS_SUBCATEGORY]->(child)
             RETURN child.name AS name
             ORDER BY name",
        )
        .param("name", name.to_string());

        let rows = self.query_rows(q).await?;
        rows.iter().map(|row| name_from_row(row, "name")).collect()
    }

    // ── Path Queries ─────────────────────────────────────────────

    /// All directed paths of 1 to `max_hops` edges between two categories.
    pub async fn paths_between(
        &self,
        start: &EntityName,
        end: &EntityName,
        max_hops: u32,
    ) -> Result<Vec<PathTrace>, GraphError> {
        if max_hops == 0 {
            return Ok(Vec::new());
        }

        // Variable-length bounds cannot be parameters.
        let q = query(&format!(
            "MATCH p = (:Category {{name: $start}})-[:HAS_SUBCATEGORY*1..{max_hops}]->(:Category {{name: $end}})
             RETURN [n IN nodes(p) | n.name] AS names"
        ))
        .param("start", start.to_string())
        .param("end", end.to_string());

        let rows = self.query_rows(q).await?;
        rows.iter().map(trace_from_row).collect()
    }

    /// One shortest path between two categories, in either direction.
    pub async fn shortest_path_between(
        &self,
        start: &EntityName,
        end: &EntityName,
    ) -> Result<Option<PathTrace>, GraphError> {
        if start == end {
            return Ok(self
                .node_exists(start)
                .await?
                .then(|| PathTrace::new(vec![start.clone()])));
        }

        let q = query(
            "MATCH (a:Category {name: $start}), (b:Category {name: $end})
             MATCH p = shortestPath((a)-[:HAS_SUBCATEGORY*]-(b))
             RETURN [n IN nodes(p) | n.name] AS names
             LIMIT 1",
        )
        .param("start", start.to_string())
        .param("end", end.to_string());

        match self.query_one(q).await? {
            Some(row) => Ok(Some(trace_from_row(&row)?)),
            None => Ok(None),
        }
    }

    // ── Streaming ────────────────────────────────────────────────

    /// Run a query and stream one entity name per row from `column`.
    async fn stream_names(&self, q: Query, column: &'static str) -> Result<NameStream, GraphError> {
        let rows = self.inner().execute(q).await?;
        let names = futures::stream::try_unfold(rows, move |mut rows| async move {
            match rows.next().await? {
                Some(row) => Ok(Some((name_from_row(&row, column)?, rows))),
                None => Ok::<_, GraphError>(None),
            }
        });
        Ok(names.boxed())
    }

    async fn count(&self, q: Query) -> Result<i64, GraphError> {
        match self.query_one(q).await? {
            Some(row) => count_from_row(&row, "count"),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl TaxonomyReader for GraphClient {
    async fn list_children(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        let q = query(
            "MATCH (:Category {name: $name})-[:HAS_SUBCATEGORY]->(child)
             RETURN child.name AS name",
        )
        .param("name", name.to_string());
        self.stream_names(q, "name").await
    }

    async fn count_children(&self, name: &EntityName) -> Result<i64, GraphError> {
        let q = query(
            "MATCH (:Category {name: $name})-[:HAS_SUBCATEGORY]->(child)
             RETURN count(child) AS count",
        )
        .param("name", name.to_string());
        self.count(q).await
    }

    async fn list_grandchildren(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        let q = query(
            "MATCH (:Category {name: $name})-[:HAS_SUBCATEGORY]->(:Category)-[:HAS_SUBCATEGORY]->(grandchild)
             RETURN grandchild.name AS name",
        )
        .param("name", name.to_string());
        self.stream_names(q, "name").await
    }

    async fn list_parents(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        let q = query(
            "MATCH (:Category {name: $name})<-[:HAS_SUBCATEGORY]-(parent)
             RETURN parent.name AS name",
        )
        .param("name", name.to_string());
        self.stream_names(q, "name").await
    }

    async fn count_parents(&self, name: &EntityName) -> Result<i64, GraphError> {
        let q = query(
            "MATCH (:Category {name: $name})<-[:HAS_SUBCATEGORY]-(parent)
             RETURN count(parent) AS count",
        )
        .param("name", name.to_string());
        self.count(q).await
    }

    async fn list_grandparents(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        let q = query(
            "MATCH (:Category {name: $name})<-[:HAS_SUBCATEGORY]-(:Category)<-[:HAS_SUBCATEGORY]-(grandparent)
             RETURN grandparent.name AS name",
        )
        .param("name", name.to_string());
        self.stream_names(q, "name").await
    }

    async fn count_unique(&self) -> Result<i64, GraphError> {
        self.count(query(
            "MATCH (c:Category) RETURN count(DISTINCT c.name) AS count",
        ))
        .await
    }

    async fn list_roots(&self) -> Result<NameStream, GraphError> {
        let q = query(
            "MATCH (c:Category)
             WHERE NOT (c)<-[:HAS_SUBCATEGORY]-()
             RETURN c.name AS name",
        );
        self.stream_names(q, "name").await
    }

    async fn most_children(&self) -> Result<NameStream, GraphError> {
        let q = query(
            "MATCH (c:Category)-[:HAS_SUBCATEGORY]->(child)
             WITH c, count(child) AS children_count
             ORDER BY children_count DESC
             LIMIT 1
             RETURN c.name AS name",
        );
        self.stream_names(q, "name").await
    }

    async fn least_children(&self) -> Result<NameStream, GraphError> {
        let q = query(
            "MATCH (c:Category)-[:HAS_SUBCATEGORY]->(child)
             WITH c, count(child) AS children_count
             WITH min(children_count) AS min_count
             MATCH (c:Category)-[:HAS_SUBCATEGORY]->(child)
             WITH c, count(child) AS children_count, min_count
             WHERE children_count = min_count
             RETURN c.name AS name",
        );
        self.stream_names(q, "name").await
    }

    async fn rename(&self, old: &EntityName, new: &EntityName) -> Result<bool, GraphError> {
        self.rename_node(old, new).await
    }
}

fn name_from_row(row: &Row, column: &str) -> Result<EntityName, GraphError> {
    let raw: String = row
        .get(column)
        .map_err(|e| GraphError::Serialization(format!("Failed to read {column}: {e}")))?;
    Ok(EntityName::new(raw)?)
}

pub(crate) fn count_from_row(row: &Row, column: &str) -> Result<i64, GraphError> {
    row.get::<i64>(column)
        .map_err(|e| GraphError::Serialization(format!("Failed to read {column}: {e}")))
}

fn trace_from_row(row: &Row) -> Result<PathTrace, GraphError> {
    let names: Vec<String> = row
        .get("names")
        .map_err(|e| GraphError::Serialization(format!("Failed to read path: {e}")))?;
    let nodes = names
        .into_iter()
        .map(EntityName::new)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PathTrace::new(nodes))
}
