//! taxograph-core: Shared types, retry policy, configuration, and error handling.
//!
//! This crate provides the foundational pieces used across all taxograph components:
//! - Entity, edge, batch, and path types for the category taxonomy
//! - The error taxonomy used to decide what is retryable
//! - `RetryPolicy` and the async retry driver shared by the batch pipelines
//! - Layered configuration loading

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use error::{Classify, CoreError, ErrorKind};
pub use retry::{RetryDecision, RetryError, RetryPolicy};
pub use types::{Batch, Edge, EntityName, PathTrace};
