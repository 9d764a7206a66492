//! Concurrent all-paths search between two categories.
//!
//! The search fans out over children as a tree of tokio tasks, one task per
//! child, for the first `fanout_depth` levels. Below that a single
//! variable-length `paths_within` query resolves each remaining subtree.
//! A path never traverses the same edge twice, so paths through cycles are
//! found and the result does not depend on where the fan-out stops.
//! When nothing is found, one undirected shortest path is reported instead.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use taxograph_core::config::SearchSettings;
use taxograph_core::{EntityName, PathTrace};
use taxograph_graph::{GraphError, GraphStore};

use crate::error::SearchError;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Levels expanded as concurrent sub-searches, at least one. Values at
    /// or above the search depth expand every level.
    pub fanout_depth: u32,
    /// Cap on store calls in flight across the whole search.
    pub max_concurrency: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fanout_depth: 1,
            max_concurrency: None,
        }
    }
}

impl From<&SearchSettings> for SearchOptions {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            fanout_depth: settings.fanout_depth.max(1),
            max_concurrency: settings.max_concurrency,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathSearchOutcome {
    pub start: EntityName,
    pub end: EntityName,
    pub depth: u32,
    pub total_paths: usize,
    pub traces: Vec<PathTrace>,
    /// Shortest path reported when no path was found within `depth`.
    pub fallback: Option<PathTrace>,
    pub fallback_invoked: bool,
    pub failed_branches: usize,
}

pub struct PathSearchOrchestrator {
    store: Arc<dyn GraphStore>,
    options: SearchOptions,
}

impl PathSearchOrchestrator {
    pub fn new(store: Arc<dyn GraphStore>, options: SearchOptions) -> Self {
        Self { store, options }
    }

    /// Find every directed path of at most `depth` hops from `start` to `end`.
    pub async fn find_all_paths(
        &self,
        start: &EntityName,
        end: &EntityName,
        depth: u32,
    ) -> Result<PathSearchOutcome, SearchError> {
        if depth == 0 {
            return Err(SearchError::ZeroDepth);
        }
        for name in [start, end] {
            if !self.store.entity_exists(name).await? {
                return Err(SearchError::EntityNotFound(name.clone()));
            }
        }

        let ctx = Arc::new(SearchContext {
            store: Arc::clone(&self.store),
            end: end.clone(),
            permits: self
                .options
                .max_concurrency
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
        });

        let fanout = self.options.fanout_depth.clamp(1, depth);
        tracing::debug!(start = %start, end = %end, depth, fanout, "Starting path search");
        let found = search(Arc::clone(&ctx), start.clone(), depth, fanout, Vec::new()).await?;

        let total_paths = found.traces.len();
        let (fallback, fallback_invoked) = if total_paths == 0 {
            (ctx.shortest_fallback(start).await, true)
        } else {
            (None, false)
        };

        tracing::info!(
            start = %start,
            end = %end,
            depth,
            total_paths,
            failed_branches = found.failed_branches,
            fallback_invoked,
            "Path search complete"
        );

        Ok(PathSearchOutcome {
            start: start.clone(),
            end: end.clone(),
            depth,
            total_paths,
            traces: found.traces,
            fallback,
            fallback_invoked,
            failed_branches: found.failed_branches,
        })
    }
}

struct SearchContext {
    store: Arc<dyn GraphStore>,
    end: EntityName,
    permits: Option<Arc<Semaphore>>,
}

impl SearchContext {
    async fn permit(&self) -> Option<OwnedSemaphorePermit> {
        match &self.permits {
            Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
            None => None,
        }
    }

    async fn shortest_fallback(&self, start: &EntityName) -> Option<PathTrace> {
        let _permit = self.permit().await;
        match self.store.shortest_path(start, &self.end).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(start = %start, end = %self.end, error = %e, "Shortest path fallback failed");
                None
            }
        }
    }
}

#[derive(Debug, Default)]
struct Found {
    traces: Vec<PathTrace>,
    failed_branches: usize,
}

enum Branch {
    Direct,
    Spawned(EntityName, JoinHandle<Result<Found, GraphError>>),
}

type Edge = (EntityName, EntityName);

/// Paths from `node` to the target of at most `remaining` hops that reuse
/// none of the edges already `walked` from the start.
fn search(
    ctx: Arc<SearchContext>,
    node: EntityName,
    remaining: u32,
    fanout_left: u32,
    walked: Vec<Edge>,
) -> BoxFuture<'static, Result<Found, GraphError>> {
    async move {
        if remaining == 0 {
            return Ok(Found::default());
        }

        if fanout_left == 0 {
            let traces = {
                let _permit = ctx.permit().await;
                ctx.store.paths_within(&node, &ctx.end, remaining).await?
            };
            let traces = traces
                .into_iter()
                .filter(|trace| !reuses_edge(trace, &walked))
                .collect();
            return Ok(Found {
                traces,
                failed_branches: 0,
            });
        }

        let children = {
            let _permit = ctx.permit().await;
            ctx.store.children(&node).await?
        };

        let mut branches = Vec::with_capacity(children.len());
        for child in children {
            let edge = (node.clone(), child.clone());
            if walked.contains(&edge) {
                continue;
            }
            // Reaching the target is a path, and the walk may still loop back to it.
            if child == ctx.end {
                branches.push(Branch::Direct);
            }
            if remaining > 1 {
                let mut walked = walked.clone();
                walked.push(edge);
                let task = search(
                    Arc::clone(&ctx),
                    child.clone(),
                    remaining - 1,
                    fanout_left - 1,
                    walked,
                );
                branches.push(Branch::Spawned(child, tokio::spawn(task)));
            }
        }

        let mut found = Found::default();
        for branch in branches {
            match branch {
                Branch::Direct => found
                    .traces
                    .push(PathTrace::new(vec![node.clone(), ctx.end.clone()])),
                Branch::Spawned(child, handle) => match handle.await {
                    Ok(Ok(sub)) => {
                        found.failed_branches += sub.failed_branches;
                        found
                            .traces
                            .extend(sub.traces.into_iter().map(|t| t.prefixed(node.clone())));
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(branch = %child, error = %e, "Path search branch failed");
                        found.failed_branches += 1;
                    }
                    Err(e) => {
                        tracing::error!(branch = %child, error = %e, "Path search task panicked");
                        found.failed_branches += 1;
                    }
                },
            }
        }
        Ok(found)
    }
    .boxed()
}

fn reuses_edge(trace: &PathTrace, walked: &[Edge]) -> bool {
    trace
        .nodes()
        .windows(2)
        .any(|pair| walked.iter().any(|(from, to)| *from == pair[0] && *to == pair[1]))
}
