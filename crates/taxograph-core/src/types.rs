//! Core domain types for the category taxonomy.
//!
//! Entities are `Category` nodes identified by name; edges are
//! `HAS_SUBCATEGORY` relationships from a parent to a child.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Entities ──────────────────────────────────────────────────────

/// Unique, case-sensitive, non-empty name of an entity in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct EntityName(String);

impl EntityName {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::InvalidEntityName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for EntityName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityName> for String {
    fn from(name: EntityName) -> Self {
        name.0
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Edges and Batches ─────────────────────────────────────────────

/// A directed `HAS_SUBCATEGORY` relationship.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub parent: EntityName,
    pub child: EntityName,
}

impl Edge {
    pub fn new(parent: EntityName, child: EntityName) -> Self {
        Self { parent, child }
    }
}

/// An immutable, ordered group of edges submitted as one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Batch {
    seq: u64,
    edges: Vec<Edge>,
}

impl Batch {
    /// `seq` is the 0-based position of the batch in its source.
    pub fn new(seq: u64, edges: Vec<Edge>) -> Self {
        Self { seq, edges }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// ── Paths ─────────────────────────────────────────────────────────

/// One discovered path, first entity to last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PathTrace(Vec<EntityName>);

impl PathTrace {
    pub fn new(nodes: Vec<EntityName>) -> Self {
        Self(nodes)
    }

    pub fn nodes(&self) -> &[EntityName] {
        &self.0
    }

    /// Number of edges traversed.
    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn first(&self) -> Option<&EntityName> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&EntityName> {
        self.0.last()
    }

    /// Return this path with `head` prepended.
    pub fn prefixed(mut self, head: EntityName) -> Self {
        self.0.insert(0, head);
        self
    }
}

impl std::fmt::Display for PathTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" --> ")?;
            }
            f.write_str(node.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> EntityName {
        EntityName::new(s).unwrap()
    }

    #[test]
    fn test_entity_name_rejects_empty() {
        assert!(matches!(
            EntityName::new(""),
            Err(CoreError::InvalidEntityName(_))
        ));
        assert_eq!(name("Physics").as_str(), "Physics");
    }

    #[test]
    fn test_entity_name_is_case_sensitive() {
        assert_ne!(name("physics"), name("Physics"));
    }

    #[test]
    fn test_entity_name_serde_validates() {
        let ok: EntityName = serde_json::from_str("\"Math\"").unwrap();
        assert_eq!(ok, name("Math"));
        assert!(serde_json::from_str::<EntityName>("\"\"").is_err());
    }

    #[test]
    fn test_path_trace_display_and_prefix() {
        let trace = PathTrace::new(vec![name("B"), name("D")]).prefixed(name("A"));
        assert_eq!(trace.to_string(), "A --> B --> D");
        assert_eq!(trace.hops(), 2);
        assert_eq!(trace.first(), Some(&name("A")));
        assert_eq!(trace.last(), Some(&name("D")));
    }

    #[test]
    fn test_batch_accessors() {
        let batch = Batch::new(7, vec![Edge::new(name("A"), name("B"))]);
        assert_eq!(batch.seq(), 7);
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_empty());
        assert_eq!(batch.edges()[0].child, name("B"));
    }
}
