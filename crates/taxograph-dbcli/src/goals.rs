//! The numbered goal commands.
//!
//! Goals 1–11 are direct taxonomy queries, 12 is the all-paths search and
//! 13 deletes everything. Listing goals print results as the store streams
//! them.

use std::io::Write;
use std::sync::Arc;

use futures::TryStreamExt;

use taxograph_core::config::Settings;
use taxograph_core::EntityName;
use taxograph_graph::{GraphStore, NameStream, TaxonomyReader};

use crate::delete::{DeletionOptions, DeletionOrchestrator};
use crate::error::{DbcliError, Result};
use crate::search::{PathSearchOrchestrator, SearchOptions};

pub const PATHS_USAGE: &str = "Usage: dbcli 12 <start_node> <end_node> [search_depth]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goal {
    Children(EntityName),
    CountChildren(EntityName),
    Grandchildren(EntityName),
    Parents(EntityName),
    CountParents(EntityName),
    Grandparents(EntityName),
    CountUnique,
    Roots,
    MostChildren,
    LeastChildren,
    Rename {
        old: EntityName,
        new: EntityName,
    },
    Paths {
        start: EntityName,
        end: EntityName,
        depth: Option<u32>,
    },
    DeleteAll {
        batch_size: Option<u64>,
    },
}

impl Goal {
    /// Build a goal from its number and positional arguments.
    pub fn parse(number: u8, args: &[String]) -> Result<Self> {
        let goal = match number {
            1..=6 => {
                let [node] = args else {
                    return Err(usage(format!("Usage: dbcli {number} <node_name>")));
                };
                let node = EntityName::new(node.as_str())?;
                match number {
                    1 => Self::Children(node),
                    2 => Self::CountChildren(node),
                    3 => Self::Grandchildren(node),
                    4 => Self::Parents(node),
                    5 => Self::CountParents(node),
                    _ => Self::Grandparents(node),
                }
            }
            7 => Self::CountUnique,
            8 => Self::Roots,
            9 => Self::MostChildren,
            10 => Self::LeastChildren,
            11 => {
                let [old, new] = args else {
                    return Err(usage("Usage: dbcli 11 <old_name> <new_name>"));
                };
                Self::Rename {
                    old: EntityName::new(old.as_str())?,
                    new: EntityName::new(new.as_str())?,
                }
            }
            12 => {
                let (start, end, depth) = match args {
                    [start, end] => (start, end, None),
                    [start, end, depth] => (start, end, Some(parse_number::<u32>(depth)?)),
                    _ => return Err(usage(PATHS_USAGE)),
                };
                Self::Paths {
                    start: EntityName::new(start.as_str())?,
                    end: EntityName::new(end.as_str())?,
                    depth,
                }
            }
            13 => Self::DeleteAll {
                batch_size: args.first().map(|s| parse_number::<u64>(s)).transpose()?,
            },
            _ => return Err(usage("Invalid goal number")),
        };
        Ok(goal)
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::Children(_) => 1,
            Self::CountChildren(_) => 2,
            Self::Grandchildren(_) => 3,
            Self::Parents(_) => 4,
            Self::CountParents(_) => 5,
            Self::Grandparents(_) => 6,
            Self::CountUnique => 7,
            Self::Roots => 8,
            Self::MostChildren => 9,
            Self::LeastChildren => 10,
            Self::Rename { .. } => 11,
            Self::Paths { .. } => 12,
            Self::DeleteAll { .. } => 13,
        }
    }
}

fn usage(message: impl Into<String>) -> DbcliError {
    DbcliError::Usage(message.into())
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| usage(format!("Expected a non-negative integer, got '{raw}'")))
}

/// Runs goals against one store, writing the report to `out`.
pub struct GoalRunner<S> {
    store: Arc<S>,
    settings: Settings,
}

impl<S> GoalRunner<S>
where
    S: GraphStore + TaxonomyReader + 'static,
{
    pub fn new(store: Arc<S>, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub async fn execute<W: Write>(&self, goal: &Goal, out: &mut W) -> Result<()> {
        match goal {
            Goal::Children(node) => {
                self.require(node).await?;
                let names = self.store.list_children(node).await?;
                print_names(out, names, |n| format!("Child [{node}]: {n}")).await?;
            }
            Goal::CountChildren(node) => {
                self.require(node).await?;
                let count = self.store.count_children(node).await?;
                writeln!(out, "Total children of '{node}': {count}")?;
            }
            Goal::Grandchildren(node) => {
                self.require(node).await?;
                let names = self.store.list_grandchildren(node).await?;
                print_names(out, names, |n| format!("Grandchild [{node}]: {n}")).await?;
            }
            Goal::Parents(node) => {
                self.require(node).await?;
                let names = self.store.list_parents(node).await?;
                print_names(out, names, |n| format!("Parent [{node}]: {n}")).await?;
            }
            Goal::CountParents(node) => {
                self.require(node).await?;
                let count = self.store.count_parents(node).await?;
                writeln!(out, "Total parents of '{node}': {count}")?;
            }
            Goal::Grandparents(node) => {
                self.require(node).await?;
                let names = self.store.list_grandparents(node).await?;
                print_names(out, names, |n| format!("Grandparent [{node}]: {n}")).await?;
            }
            Goal::CountUnique => {
                let count = self.store.count_unique().await?;
                writeln!(out, "Total unique nodes: {count}")?;
            }
            Goal::Roots => {
                let names = self.store.list_roots().await?;
                print_names(out, names, |n| format!("Root node: {n}")).await?;
            }
            Goal::MostChildren => {
                let names = self.store.most_children().await?;
                print_names(out, names, |n| format!("Node with the most children: {n}")).await?;
            }
            Goal::LeastChildren => {
                let names = self.store.least_children().await?;
                let count =
                    print_names(out, names, |n| format!("Node with the least children: {n}"))
                        .await?;
                writeln!(out, "Count : {count}")?;
            }
            Goal::Rename { old, new } => {
                if !self.store.rename(old, new).await? {
                    return Err(DbcliError::NotFound(old.clone()));
                }
                writeln!(out, "Renamed node '{old}' to '{new}' successfully.")?;
            }
            Goal::Paths { start, end, depth } => {
                self.find_paths(start, end, *depth, out).await?;
            }
            Goal::DeleteAll { batch_size } => {
                let mut options = DeletionOptions::from(&self.settings.delete);
                if let Some(batch_size) = batch_size {
                    options.batch_size = *batch_size;
                }
                let report = DeletionOrchestrator::new(self.graph(), options).run().await?;
                writeln!(
                    out,
                    "Finished deleting nodes. Total nodes deleted: {}",
                    report.total_deleted
                )?;
                if report.failed_operations > 0 {
                    writeln!(out, "Failed delete operations: {}", report.failed_operations)?;
                }
            }
        }
        Ok(())
    }

    async fn find_paths<W: Write>(
        &self,
        start: &EntityName,
        end: &EntityName,
        depth: Option<u32>,
        out: &mut W,
    ) -> Result<()> {
        let search_depth = depth.unwrap_or(self.settings.search.default_depth);
        let search = PathSearchOrchestrator::new(
            self.graph(),
            SearchOptions::from(&self.settings.search),
        );
        let outcome = search.find_all_paths(start, end, search_depth).await?;

        writeln!(out)?;
        for trace in &outcome.traces {
            writeln!(out, "Path: {trace}\n")?;
        }
        if outcome.total_paths == 0 {
            writeln!(out, "No Paths found within search depth of {search_depth}.")?;
            if let Some(shortest) = &outcome.fallback {
                writeln!(out, "\nOne Shortest Path: {shortest}\n")?;
            }
        }
        writeln!(out, "Total Paths Found: {}", outcome.total_paths)?;
        writeln!(out, "Search Depth: {search_depth}")?;
        if outcome.failed_branches > 0 {
            writeln!(out, "Branches that failed: {}", outcome.failed_branches)?;
        }
        if depth.is_none() {
            writeln!(out, "To increase Search Depth, {PATHS_USAGE}")?;
        }
        Ok(())
    }

    async fn require(&self, node: &EntityName) -> Result<()> {
        if self.store.entity_exists(node).await? {
            Ok(())
        } else {
            Err(DbcliError::NotFound(node.clone()))
        }
    }

    fn graph(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.store) as Arc<dyn GraphStore>
    }
}

/// Print each streamed name as it arrives. Returns how many were printed.
async fn print_names<W, F>(out: &mut W, mut names: NameStream, line: F) -> Result<usize>
where
    W: Write,
    F: Fn(&EntityName) -> String,
{
    let mut printed = 0;
    while let Some(name) = names.try_next().await? {
        writeln!(out, "{}", line(&name))?;
        printed += 1;
    }
    Ok(printed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxograph_core::{Classify, ErrorKind};
    use taxograph_graph::MemoryGraph;

    fn name(s: &str) -> EntityName {
        EntityName::new(s).unwrap()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn runner() -> (Arc<MemoryGraph>, GoalRunner<MemoryGraph>) {
        let graph = Arc::new(
            MemoryGraph::from_pairs([
                ("Root", "Science"),
                ("Root", "Arts"),
                ("Science", "Physics"),
                ("Science", "Biology"),
                ("Arts", "Painting"),
                ("Physics", "Quantum"),
            ])
            .unwrap(),
        );
        (graph.clone(), GoalRunner::new(graph, Settings::default()))
    }

    async fn run(runner: &GoalRunner<MemoryGraph>, goal: Goal) -> Result<String> {
        let mut out = Vec::new();
        runner.execute(&goal, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_goals() {
        assert_eq!(
            Goal::parse(1, &args(&["Science"])).unwrap(),
            Goal::Children(name("Science"))
        );
        assert_eq!(Goal::parse(7, &[]).unwrap(), Goal::CountUnique);
        assert_eq!(
            Goal::parse(12, &args(&["A", "B", "4"])).unwrap(),
            Goal::Paths {
                start: name("A"),
                end: name("B"),
                depth: Some(4)
            }
        );
        assert_eq!(
            Goal::parse(13, &args(&["100"])).unwrap(),
            Goal::DeleteAll {
                batch_size: Some(100)
            }
        );
        assert_eq!(Goal::parse(13, &[]).unwrap().number(), 13);
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        for (number, list) in [
            (1u8, vec![]),
            (2, vec!["a", "b"]),
            (11, vec!["only"]),
            (12, vec!["A"]),
            (12, vec!["A", "B", "deep"]),
            (13, vec!["-5"]),
            (14, vec![]),
        ] {
            let err = Goal::parse(number, &args(&list)).unwrap_err();
            assert!(matches!(err, DbcliError::Usage(_)), "goal {number}");
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn test_listing_goals() {
        let (_, runner) = runner();

        let children = run(&runner, Goal::Children(name("Science"))).await.unwrap();
        assert_eq!(
            children,
            "Child [Science]: Physics\nChild [Science]: Biology\n"
        );

        let grandchildren = run(&runner, Goal::Grandchildren(name("Root"))).await.unwrap();
        assert_eq!(grandchildren.lines().count(), 3);

        let grandparents = run(&runner, Goal::Grandparents(name("Quantum"))).await.unwrap();
        assert_eq!(grandparents, "Grandparent [Quantum]: Science\n");

        let roots = run(&runner, Goal::Roots).await.unwrap();
        assert_eq!(roots, "Root node: Root\n");
    }

    #[tokio::test]
    async fn test_count_goals() {
        let (_, runner) = runner();

        let count = run(&runner, Goal::CountChildren(name("Root"))).await.unwrap();
        assert_eq!(count, "Total children of 'Root': 2\n");

        let parents = run(&runner, Goal::CountParents(name("Painting"))).await.unwrap();
        assert_eq!(parents, "Total parents of 'Painting': 1\n");

        let unique = run(&runner, Goal::CountUnique).await.unwrap();
        assert_eq!(unique, "Total unique nodes: 7\n");
    }

    #[tokio::test]
    async fn test_most_and_least_children() {
        let (_, runner) = runner();

        let most = run(&runner, Goal::MostChildren).await.unwrap();
        assert_eq!(most, "Node with the most children: Root\n");

        let least = run(&runner, Goal::LeastChildren).await.unwrap();
        assert!(least.contains("Node with the least children: Arts"));
        assert!(least.contains("Node with the least children: Physics"));
        assert!(least.ends_with("Count : 2\n"));
    }

    #[tokio::test]
    async fn test_missing_node_is_validation_error() {
        let (_, runner) = runner();
        let err = run(&runner, Goal::Parents(name("Ghost"))).await.unwrap_err();
        assert!(matches!(err, DbcliError::NotFound(ref n) if n.as_str() == "Ghost"));
        assert_eq!(err.to_string(), "Node 'Ghost' does not exist in the database.");
    }

    #[tokio::test]
    async fn test_rename_goal() {
        let (graph, runner) = runner();
        let out = run(
            &runner,
            Goal::Rename {
                old: name("Arts"),
                new: name("Humanities"),
            },
        )
        .await
        .unwrap();
        assert_eq!(out, "Renamed node 'Arts' to 'Humanities' successfully.\n");
        assert_eq!(graph.count_children(&name("Humanities")).await.unwrap(), 1);

        let missing = run(
            &runner,
            Goal::Rename {
                old: name("Arts"),
                new: name("Other"),
            },
        )
        .await;
        assert!(matches!(missing, Err(DbcliError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_paths_goal_output() {
        let (_, runner) = runner();
        let out = run(
            &runner,
            Goal::Paths {
                start: name("Root"),
                end: name("Quantum"),
                depth: Some(3),
            },
        )
        .await
        .unwrap();

        assert!(out.contains("Path: Root --> Science --> Physics --> Quantum\n"));
        assert!(out.contains("Total Paths Found: 1\n"));
        assert!(out.contains("Search Depth: 3\n"));
        assert!(!out.contains("To increase Search Depth"));
    }

    #[tokio::test]
    async fn test_paths_goal_falls_back() {
        let (graph, runner) = runner();
        let out = run(
            &runner,
            Goal::Paths {
                start: name("Biology"),
                end: name("Painting"),
                depth: None,
            },
        )
        .await
        .unwrap();

        assert!(out.contains("No Paths found within search depth of 10."));
        assert!(out.contains(
            "One Shortest Path: Biology --> Science --> Root --> Arts --> Painting"
        ));
        assert!(out.contains("Total Paths Found: 0\n"));
        assert!(out.contains("To increase Search Depth, Usage: dbcli 12"));
        assert_eq!(graph.shortest_path_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_goal_empties_store() {
        let (graph, runner) = runner();
        let out = run(
            &runner,
            Goal::DeleteAll {
                batch_size: Some(2),
            },
        )
        .await
        .unwrap();

        assert_eq!(out, "Finished deleting nodes. Total nodes deleted: 7\n");
        assert_eq!(graph.entity_count(), 0);
    }
}
