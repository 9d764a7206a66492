//! In-process implementation of the graph capability.
//!
//! `MemoryGraph` keeps categories and edges in insertion order so every
//! query is deterministic. It counts calls and can inject failures, which
//! makes it the store double for orchestrator tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use taxograph_core::{Batch, CoreError, Edge, EntityName, ErrorKind, PathTrace};

use crate::client::GraphError;
use crate::store::{GraphStore, NameStream, TaxonomyReader};

#[derive(Debug, Default)]
struct State {
    nodes: Vec<EntityName>,
    edges: Vec<Edge>,
    edge_set: HashSet<Edge>,
}

impl State {
    fn contains(&self, name: &EntityName) -> bool {
        self.nodes.iter().any(|n| n == name)
    }

    fn ensure_node(&mut self, name: &EntityName) {
        if !self.contains(name) {
            self.nodes.push(name.clone());
        }
    }

    fn insert_edge(&mut self, edge: &Edge) {
        self.ensure_node(&edge.parent);
        self.ensure_node(&edge.child);
        if self.edge_set.insert(edge.clone()) {
            self.edges.push(edge.clone());
        }
    }

    fn children_of(&self, name: &EntityName) -> Vec<EntityName> {
        self.edges
            .iter()
            .filter(|e| &e.parent == name)
            .map(|e| e.child.clone())
            .collect()
    }

    fn parents_of(&self, name: &EntityName) -> Vec<EntityName> {
        self.edges
            .iter()
            .filter(|e| &e.child == name)
            .map(|e| e.parent.clone())
            .collect()
    }

    fn child_counts(&self) -> Vec<(EntityName, usize)> {
        self.nodes
            .iter()
            .map(|n| (n.clone(), self.edges.iter().filter(|e| &e.parent == n).count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    transient_upsert_parents: HashSet<EntityName>,
    panicking_upsert_parents: HashSet<EntityName>,
    failing_deletes: VecDeque<ErrorKind>,
    delete_cap: Option<u64>,
    failing_children: HashSet<EntityName>,
    latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct Counters {
    schema: AtomicU64,
    upserts: AtomicU64,
    deletes: AtomicU64,
    children: AtomicU64,
    paths_within: AtomicU64,
    shortest_path: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Tracks one in-flight store call for the concurrency high-water mark.
struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A thread-safe in-memory category taxonomy.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    counters: Counters,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(parent, child)` name pairs.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, CoreError> {
        let graph = Self::new();
        for (parent, child) in pairs {
            graph.add_edge(Edge::new(EntityName::new(parent)?, EntityName::new(child)?));
        }
        Ok(graph)
    }

    pub fn add_edge(&self, edge: Edge) {
        self.state().insert_edge(&edge);
    }

    /// Add a category without any edges.
    pub fn add_entity(&self, name: EntityName) {
        self.state().ensure_node(&name);
    }

    pub fn entity_count(&self) -> usize {
        self.state().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state().edges.len()
    }

    /// Snapshot of the stored edges, sorted.
    pub fn edge_set(&self) -> Vec<Edge> {
        let mut edges = self.state().edges.clone();
        edges.sort_by(|a, b| (&a.parent, &a.child).cmp(&(&b.parent, &b.child)));
        edges
    }

    // ── Fault Injection ──────────────────────────────────────────

    /// Every upsert of a batch containing an edge from `parent` fails transiently.
    pub fn fail_upserts_touching(&self, parent: EntityName) {
        self.faults().transient_upsert_parents.insert(parent);
    }

    /// Every upsert of a batch containing an edge from `parent` panics.
    pub fn panic_upserts_touching(&self, parent: EntityName) {
        self.faults().panicking_upsert_parents.insert(parent);
    }

    /// The next `count` delete calls fail with an error of `kind`.
    pub fn fail_next_deletes(&self, count: usize, kind: ErrorKind) {
        let mut faults = self.faults();
        for _ in 0..count {
            faults.failing_deletes.push_back(kind);
        }
    }

    /// Each delete call removes at most `cap` entities, whatever it asks for.
    pub fn cap_deletes_at(&self, cap: u64) {
        self.faults().delete_cap = Some(cap);
    }

    /// Child enumeration of `name` fails with a non-retryable error.
    pub fn fail_children_of(&self, name: EntityName) {
        self.faults().failing_children.insert(name);
    }

    /// Delay every read call, so concurrent callers overlap.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.faults().latency = Some(latency);
        self
    }

    // ── Call Counters ────────────────────────────────────────────

    pub fn schema_calls(&self) -> u64 {
        self.counters.schema.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> u64 {
        self.counters.upserts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u64 {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    pub fn children_calls(&self) -> u64 {
        self.counters.children.load(Ordering::SeqCst)
    }

    pub fn paths_within_calls(&self) -> u64 {
        self.counters.paths_within.load(Ordering::SeqCst)
    }

    pub fn shortest_path_calls(&self) -> u64 {
        self.counters.shortest_path.load(Ordering::SeqCst)
    }

    /// Highest number of latency-bearing store calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let latency = self.faults().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Depth-first enumeration of directed paths that never reuse an edge.
fn collect_paths(
    state: &State,
    end: &EntityName,
    max_hops: u32,
    path: &mut Vec<EntityName>,
    used: &mut HashSet<(EntityName, EntityName)>,
    out: &mut Vec<PathTrace>,
) {
    let Some(current) = path.last().cloned() else {
        return;
    };
    if path.len() > 1 && &current == end {
        out.push(PathTrace::new(path.clone()));
    }
    if path.len() as u32 > max_hops {
        return;
    }

    let mut children = state.children_of(&current);
    children.sort();
    for child in children {
        let key = (current.clone(), child.clone());
        if !used.insert(key.clone()) {
            continue;
        }
        path.push(child);
        collect_paths(state, end, max_hops, path, used, out);
        path.pop();
        used.remove(&key);
    }
}

fn name_stream(names: Vec<EntityName>) -> NameStream {
    futures::stream::iter(names.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ensure_schema(&self) -> Result<(), GraphError> {
        self.counters.schema.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn entity_exists(&self, name: &EntityName) -> Result<bool, GraphError> {
        Ok(self.state().contains(name))
    }

    async fn children(&self, name: &EntityName) -> Result<Vec<EntityName>, GraphError> {
        self.counters.children.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        self.simulate_latency().await;

        if self.faults().failing_children.contains(name) {
            return Err(GraphError::Serialization(format!(
                "injected failure listing children of {name}"
            )));
        }
        let mut children = self.state().children_of(name);
        children.sort();
        Ok(children)
    }

    async fn paths_within(
        &self,
        start: &EntityName,
        end: &EntityName,
        max_hops: u32,
    ) -> Result<Vec<PathTrace>, GraphError> {
        self.counters.paths_within.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        self.simulate_latency().await;

        let state = self.state();
        let mut out = Vec::new();
        if max_hops == 0 || !state.contains(start) {
            return Ok(out);
        }
        let mut path = vec![start.clone()];
        let mut used = HashSet::new();
        collect_paths(&state, end, max_hops, &mut path, &mut used, &mut out);
        Ok(out)
    }

    async fn shortest_path(
        &self,
        start: &EntityName,
        end: &EntityName,
    ) -> Result<Option<PathTrace>, GraphError> {
        self.counters.shortest_path.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if !state.contains(start) || !state.contains(end) {
            return Ok(None);
        }

        // Undirected breadth-first search.
        let mut prev: HashMap<EntityName, EntityName> = HashMap::new();
        let mut seen: HashSet<EntityName> = HashSet::from([start.clone()]);
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(current) = queue.pop_front() {
            if &current == end {
                let mut nodes = vec![current.clone()];
                let mut cursor = current;
                while let Some(p) = prev.get(&cursor) {
                    nodes.push(p.clone());
                    cursor = p.clone();
                }
                nodes.reverse();
                return Ok(Some(PathTrace::new(nodes)));
            }
            let mut neighbors = state.children_of(&current);
            neighbors.extend(state.parents_of(&current));
            for next in neighbors {
                if seen.insert(next.clone()) {
                    prev.insert(next.clone(), current.clone());
                    queue.push_back(next);
                }
            }
        }
        Ok(None)
    }

    async fn upsert_edges(&self, batch: &Batch) -> Result<(), GraphError> {
        self.counters.upserts.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        self.simulate_latency().await;
        let panics = {
            let faults = self.faults();
            batch
                .edges()
                .iter()
                .any(|e| faults.panicking_upsert_parents.contains(&e.parent))
        };
        if panics {
            panic!("injected panic upserting batch {}", batch.seq());
        }
        {
            let faults = self.faults();
            if let Some(edge) = batch
                .edges()
                .iter()
                .find(|e| faults.transient_upsert_parents.contains(&e.parent))
            {
                return Err(GraphError::Transient(format!(
                    "injected lock contention on {}",
                    edge.parent
                )));
            }
        }

        let mut state = self.state();
        for edge in batch.edges() {
            state.insert_edge(edge);
        }
        Ok(())
    }

    async fn delete_up_to(&self, limit: u64) -> Result<u64, GraphError> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        self.simulate_latency().await;
        let cap = {
            let mut faults = self.faults();
            match faults.failing_deletes.pop_front() {
                Some(ErrorKind::Transient) => {
                    return Err(GraphError::Transient("injected delete contention".into()))
                }
                Some(ErrorKind::Unavailable) => {
                    return Err(GraphError::Unavailable("injected outage".into()))
                }
                Some(_) => return Err(GraphError::Serialization("injected failure".into())),
                None => faults.delete_cap,
            }
        };

        let take = cap.map_or(limit, |cap| cap.min(limit));
        let mut state = self.state();
        let count = (take as usize).min(state.nodes.len());
        let removed: HashSet<EntityName> = state.nodes.drain(..count).collect();
        state
            .edges
            .retain(|e| !removed.contains(&e.parent) && !removed.contains(&e.child));
        state
            .edge_set
            .retain(|e| !removed.contains(&e.parent) && !removed.contains(&e.child));
        Ok(count as u64)
    }
}

#[async_trait]
impl TaxonomyReader for MemoryGraph {
    async fn list_children(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        Ok(name_stream(self.state().children_of(name)))
    }

    async fn count_children(&self, name: &EntityName) -> Result<i64, GraphError> {
        Ok(self.state().children_of(name).len() as i64)
    }

    async fn list_grandchildren(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        let state = self.state();
        let names = state
            .children_of(name)
            .iter()
            .flat_map(|child| state.children_of(child))
            .collect();
        Ok(name_stream(names))
    }

    async fn list_parents(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        Ok(name_stream(self.state().parents_of(name)))
    }

    async fn count_parents(&self, name: &EntityName) -> Result<i64, GraphError> {
        Ok(self.state().parents_of(name).len() as i64)
    }

    async fn list_grandparents(&self, name: &EntityName) -> Result<NameStream, GraphError> {
        let state = self.state();
        let names = state
            .parents_of(name)
            .iter()
            .flat_map(|parent| state.parents_of(parent))
            .collect();
        Ok(name_stream(names))
    }

    async fn count_unique(&self) -> Result<i64, GraphError> {
        Ok(self.state().nodes.len() as i64)
    }

    async fn list_roots(&self) -> Result<NameStream, GraphError> {
        let state = self.state();
        let names = state
            .nodes
            .iter()
            .filter(|n| !state.edges.iter().any(|e| &e.child == *n))
            .cloned()
            .collect();
        Ok(name_stream(names))
    }

    async fn most_children(&self) -> Result<NameStream, GraphError> {
        let counts = self.state().child_counts();
        let best = counts.iter().map(|(_, c)| *c).max();
        let names = counts
            .into_iter()
            .find(|(_, c)| Some(*c) == best)
            .map(|(n, _)| n)
            .into_iter()
            .collect();
        Ok(name_stream(names))
    }

    async fn least_children(&self) -> Result<NameStream, GraphError> {
        let counts = self.state().child_counts();
        let least = counts.iter().map(|(_, c)| *c).min();
        let names = counts
            .into_iter()
            .filter(|(_, c)| Some(*c) == least)
            .map(|(n, _)| n)
            .collect();
        Ok(name_stream(names))
    }

    async fn rename(&self, old: &EntityName, new: &EntityName) -> Result<bool, GraphError> {
        let mut state = self.state();
        if !state.contains(old) {
            return Ok(false);
        }
        if state.contains(new) {
            return Err(GraphError::Conflict {
                name: new.to_string(),
            });
        }

        if let Some(node) = state.nodes.iter_mut().find(|n| **n == *old) {
            *node = new.clone();
        }
        let swap = |n: &EntityName| if n == old { new.clone() } else { n.clone() };
        let renamed: Vec<Edge> = state
            .edges
            .iter()
            .map(|e| Edge::new(swap(&e.parent), swap(&e.child)))
            .collect();
        state.edge_set = renamed.iter().cloned().collect();
        state.edges = renamed;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn name(s: &str) -> EntityName {
        EntityName::new(s).unwrap()
    }

    fn diamond() -> MemoryGraph {
        MemoryGraph::from_pairs([("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let graph = MemoryGraph::new();
        let batch = Batch::new(0, vec![Edge::new(name("A"), name("B"))]);
        graph.upsert_edges(&batch).await.unwrap();
        graph.upsert_edges(&batch).await.unwrap();
        assert_eq!(graph.entity_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn test_paths_within_respects_hop_budget() {
        let graph = diamond();
        let paths = graph.paths_within(&name("A"), &name("D"), 2).await.unwrap();
        let rendered: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["A --> B --> D", "A --> C --> D"]);

        let none = graph.paths_within(&name("A"), &name("D"), 1).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_paths_within_terminates_on_cycles() {
        let graph = MemoryGraph::from_pairs([("A", "B"), ("B", "A"), ("B", "C")]).unwrap();
        let paths = graph.paths_within(&name("A"), &name("C"), 10).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].to_string(), "A --> B --> C");
    }

    #[tokio::test]
    async fn test_shortest_path_ignores_direction() {
        let graph = diamond();
        let path = graph
            .shortest_path(&name("B"), &name("C"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.hops(), 2);

        graph.add_entity(name("Z"));
        assert!(graph
            .shortest_path(&name("A"), &name("Z"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_up_to_with_cap_and_faults() {
        let graph = diamond();
        graph.cap_deletes_at(1);
        graph.fail_next_deletes(1, ErrorKind::Unavailable);

        let err = graph.delete_up_to(10).await.unwrap_err();
        assert!(matches!(err, GraphError::Unavailable(_)));

        assert_eq!(graph.delete_up_to(10).await.unwrap(), 1);
        assert_eq!(graph.entity_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[tokio::test]
    async fn test_taxonomy_queries() {
        let graph = diamond();
        let roots: Vec<EntityName> = graph.list_roots().await.unwrap().try_collect().await.unwrap();
        assert_eq!(roots, vec![name("A")]);

        let grandchildren: Vec<EntityName> = graph
            .list_grandchildren(&name("A"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(grandchildren, vec![name("D"), name("D")]);

        assert_eq!(graph.count_parents(&name("D")).await.unwrap(), 2);
        assert_eq!(graph.count_unique().await.unwrap(), 4);

        let most: Vec<EntityName> = graph.most_children().await.unwrap().try_collect().await.unwrap();
        assert_eq!(most, vec![name("A")]);
        let least: Vec<EntityName> = graph.least_children().await.unwrap().try_collect().await.unwrap();
        assert_eq!(least, vec![name("B"), name("C")]);
    }

    #[tokio::test]
    async fn test_rename() {
        let graph = diamond();
        assert!(graph.rename(&name("B"), &name("B2")).await.unwrap());
        assert!(!graph.rename(&name("missing"), &name("X")).await.unwrap());
        assert!(matches!(
            graph.rename(&name("C"), &name("D")).await,
            Err(GraphError::Conflict { .. })
        ));
        let children = graph.children(&name("A")).await.unwrap();
        assert_eq!(children, vec![name("B2"), name("C")]);
    }
}
