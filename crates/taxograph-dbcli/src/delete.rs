//! Round-based bulk deletion of every category.
//!
//! Each round spawns `workers` concurrent `delete_up_to(batch_size)` calls
//! and joins them. The run stops after the first round that removes fewer
//! than `batch_size * workers` entities. A round can fall short because the
//! store is empty or because calls failed or hit contention, so a short
//! round does not prove the store is empty.

use std::sync::Arc;

use serde::Serialize;

use taxograph_core::config::DeleteSettings;
use taxograph_core::retry::retry;
use taxograph_core::RetryPolicy;
use taxograph_graph::GraphStore;

use crate::error::DeleteError;

#[derive(Debug, Clone)]
pub struct DeletionOptions {
    pub batch_size: u64,
    pub workers: usize,
    pub policy: RetryPolicy,
}

impl From<&DeleteSettings> for DeletionOptions {
    fn from(settings: &DeleteSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            workers: settings.workers,
            policy: settings.retry_policy(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DeletionReport {
    pub total_deleted: u64,
    pub rounds: u64,
    /// Delete calls that gave up and contributed nothing.
    pub failed_operations: u64,
}

pub struct DeletionOrchestrator {
    store: Arc<dyn GraphStore>,
    options: DeletionOptions,
}

impl DeletionOrchestrator {
    pub fn new(store: Arc<dyn GraphStore>, options: DeletionOptions) -> Self {
        Self { store, options }
    }

    pub async fn run(&self) -> Result<DeletionReport, DeleteError> {
        let DeletionOptions {
            batch_size,
            workers,
            policy,
        } = self.options;
        if batch_size == 0 {
            return Err(DeleteError::Config("batch size must be positive".to_string()));
        }
        if workers == 0 {
            return Err(DeleteError::Config("worker count must be positive".to_string()));
        }

        let full_round = batch_size.saturating_mul(workers as u64);
        let mut report = DeletionReport::default();

        loop {
            report.rounds += 1;

            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        let store = &store;
                        retry(&policy, "delete_up_to", move || store.delete_up_to(batch_size)).await
                    })
                })
                .collect();

            let mut round_total = 0u64;
            for handle in handles {
                match handle.await {
                    Ok(Ok(deleted)) => round_total += deleted,
                    Ok(Err(e)) => {
                        tracing::warn!(round = report.rounds, error = %e, "Delete operation failed");
                        report.failed_operations += 1;
                    }
                    Err(e) => {
                        tracing::error!(round = report.rounds, error = %e, "Delete task panicked");
                        report.failed_operations += 1;
                    }
                }
            }

            report.total_deleted += round_total;
            tracing::info!(
                round = report.rounds,
                deleted = round_total,
                total = report.total_deleted,
                "Delete round complete"
            );

            if round_total < full_round {
                break;
            }
        }

        Ok(report)
    }
}
