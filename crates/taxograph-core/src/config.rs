//! Configuration management for taxograph tools.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`TAXOGRAPH__` prefix, `__` separator)
//! 2. Config file (`taxograph.toml`, or the prefix given on the command line)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::CoreError;
use crate::retry::RetryPolicy;

/// Top-level settings, one section per tool concern.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub neo4j: Neo4jSettings,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub delete: DeleteSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

impl Settings {
    /// Load settings from an optional config file and the environment.
    pub fn load(file_prefix: &str) -> Result<Self, CoreError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TAXOGRAPH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize::<Settings>()?)
    }
}

/// Neo4j connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Bulk import settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportSettings {
    /// Edges per upsert transaction.
    #[serde(default = "default_import_batch_size")]
    pub batch_size: usize,
    /// Concurrent upsert workers.
    #[serde(default = "default_import_workers")]
    pub workers: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Log progress every this many completed batches.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl ImportSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

/// Bulk delete settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteSettings {
    /// Entities removed per delete transaction.
    #[serde(default = "default_delete_batch_size")]
    pub batch_size: u64,
    /// Delete transactions per round.
    #[serde(default = "default_delete_workers")]
    pub workers: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl DeleteSettings {
    /// Deletes also retry when the store is unreachable.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
            .retrying_unavailable()
    }
}

/// Path search settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// Depth used when the caller gives none.
    #[serde(default = "default_depth")]
    pub default_depth: u32,
    /// Depths above this require confirmation.
    #[serde(default = "default_depth")]
    pub confirm_threshold: u32,
    /// Levels expanded as concurrent sub-searches before a single
    /// variable-length query resolves the rest. A value at or above the
    /// search depth expands every level.
    #[serde(default = "default_fanout_depth")]
    pub fanout_depth: u32,
    /// Cap on concurrent store calls across the whole search tree.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "password".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_import_batch_size() -> usize {
    10_000
}

fn default_import_workers() -> usize {
    4
}

fn default_delete_batch_size() -> u64 {
    5_000
}

fn default_delete_workers() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_progress_every() -> u64 {
    100
}

fn default_depth() -> u32 {
    10
}

fn default_fanout_depth() -> u32 {
    1
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: default_import_batch_size(),
            workers: default_import_workers(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            progress_every: default_progress_every(),
        }
    }
}

impl Default for DeleteSettings {
    fn default() -> Self {
        Self {
            batch_size: default_delete_batch_size(),
            workers: default_delete_workers(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            confirm_threshold: default_depth(),
            fanout_depth: default_fanout_depth(),
            max_concurrency: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(settings.import.batch_size, 10_000);
        assert_eq!(settings.import.workers, 4);
        assert_eq!(settings.delete.batch_size, 5_000);
        assert_eq!(settings.delete.workers, 3);
        assert_eq!(settings.search.default_depth, 10);
        assert_eq!(settings.search.fanout_depth, 1);
        assert_eq!(settings.search.max_concurrency, None);
    }

    #[test]
    fn test_retry_policies() {
        let settings = Settings::default();
        let import = settings.import.retry_policy();
        assert_eq!(import.max_retries(), 3);
        assert_eq!(import.base_delay(), Duration::from_millis(500));
        assert!(!import.is_retryable(crate::ErrorKind::Unavailable));
        assert!(settings
            .delete
            .retry_policy()
            .is_retryable(crate::ErrorKind::Unavailable));
    }

    #[test]
    fn test_load_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxograph.toml");
        std::fs::write(
            &path,
            "[import]\nbatch_size = 250\n\n[search]\nfanout_depth = 3\nmax_concurrency = 8\n",
        )
        .unwrap();

        let prefix = dir.path().join("taxograph");
        let settings = Settings::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(settings.import.batch_size, 250);
        assert_eq!(settings.import.workers, 4);
        assert_eq!(settings.search.fanout_depth, 3);
        assert_eq!(settings.search.max_concurrency, Some(8));
        assert_eq!(settings.delete.batch_size, 5_000);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing");
        let settings = Settings::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(settings.import.batch_size, 10_000);
    }
}
