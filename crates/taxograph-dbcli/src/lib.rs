//! taxograph-dbcli: query, path search and bulk deletion over the taxonomy.
//!
//! - `goals`: the numbered command surface (goals 1–13)
//! - `search`: concurrent all-paths search with a shortest-path fallback
//! - `delete`: round-based concurrent bulk deletion
//! - `gate`: confirmation step before expensive searches

pub mod delete;
pub mod error;
pub mod gate;
pub mod goals;
pub mod search;

pub use delete::{DeletionOptions, DeletionOrchestrator, DeletionReport};
pub use error::{DbcliError, DeleteError, SearchError};
pub use gate::{preflight, GateDecision};
pub use goals::{Goal, GoalRunner};
pub use search::{PathSearchOrchestrator, PathSearchOutcome, SearchOptions};
