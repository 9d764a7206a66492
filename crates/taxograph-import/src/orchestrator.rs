//! Concurrent batch import engine.
//!
//! A blocking producer drains the batch source into a bounded channel. A
//! fixed pool of tokio workers pulls batches off the channel; each worker
//! finishes a batch, retries included, before taking the next one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use taxograph_core::config::ImportSettings;
use taxograph_core::retry::retry;
use taxograph_core::{Batch, RetryPolicy};
use taxograph_graph::GraphStore;

use crate::error::{ImportError, Result};

/// Tuning knobs for one import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub workers: usize,
    pub policy: RetryPolicy,
    /// Log progress every this many completed batches. Zero disables it.
    pub progress_every: u64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&ImportSettings::default())
    }
}

impl From<&ImportSettings> for ImportOptions {
    fn from(settings: &ImportSettings) -> Self {
        Self {
            workers: settings.workers,
            policy: settings.retry_policy(),
            progress_every: settings.progress_every,
        }
    }
}

/// Outcome of an import run.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Edges in batches that were applied.
    pub total_applied: u64,
    pub batches_applied: u64,
    /// Batches that exhausted their retries or failed fatally, by sequence number.
    #[serde(skip)]
    pub failed_batches: Vec<Batch>,
    /// Input rows dropped by the reader as malformed.
    pub skipped_rows: u64,
    pub elapsed_ms: u64,
}

impl ImportReport {
    pub fn failed_batch_seqs(&self) -> Vec<u64> {
        self.failed_batches.iter().map(Batch::seq).collect()
    }

    pub fn failed_records(&self) -> usize {
        self.failed_batches.iter().map(Batch::len).sum()
    }
}

#[derive(Debug, Default)]
struct WorkerTally {
    applied: u64,
    batches: u64,
    failed: Vec<Batch>,
}

impl WorkerTally {
    fn merge(&mut self, other: WorkerTally) {
        self.applied += other.applied;
        self.batches += other.batches;
        self.failed.extend(other.failed);
    }
}

/// Drives a batch source into a [`GraphStore`].
pub struct ImportOrchestrator {
    store: Arc<dyn GraphStore>,
    options: ImportOptions,
}

impl ImportOrchestrator {
    pub fn new(store: Arc<dyn GraphStore>, options: ImportOptions) -> Self {
        Self { store, options }
    }

    /// Run the import to completion.
    ///
    /// The schema is ensured before any batch is sent. A source error stops
    /// dispatch; batches already queued still finish, then the error is
    /// returned.
    pub async fn run<I>(&self, batches: I) -> Result<ImportReport>
    where
        I: Iterator<Item = Result<Batch>> + Send + 'static,
    {
        if self.options.workers == 0 {
            return Err(ImportError::Config("worker count must be positive".to_string()));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        self.store.ensure_schema().await?;
        tracing::info!(run_id = %run_id, workers = self.options.workers, "Schema ready, importing");

        let (tx, rx) = mpsc::channel::<Batch>(self.options.workers * 2);
        let producer = tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut dispatched = 0u64;
            for batch in batches {
                if tx.blocking_send(batch?).is_err() {
                    break;
                }
                dispatched += 1;
            }
            Ok(dispatched)
        });

        let rx = Arc::new(Mutex::new(rx));
        let completed = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::with_capacity(self.options.workers);
        for worker in 0..self.options.workers {
            let store = Arc::clone(&self.store);
            let rx = Arc::clone(&rx);
            let completed = Arc::clone(&completed);
            let policy = self.options.policy;
            let progress_every = self.options.progress_every;

            handles.push(tokio::spawn(async move {
                run_worker(worker, run_id, store, rx, policy, completed, progress_every).await
            }));
        }

        let produced = producer
            .await
            .map_err(|e| ImportError::Worker(format!("batch producer: {e}")));

        let mut tally = WorkerTally::default();
        let mut worker_failure = None;
        for handle in handles {
            match handle.await {
                Ok(worker_tally) => tally.merge(worker_tally),
                Err(e) => {
                    tracing::error!(run_id = %run_id, error = %e, "Import worker panicked");
                    worker_failure.get_or_insert(ImportError::Worker(e.to_string()));
                }
            }
        }
        if let Some(e) = worker_failure {
            tracing::error!(
                run_id = %run_id,
                applied = tally.applied,
                "Import aborted by worker failure"
            );
            return Err(e);
        }

        let dispatched = match produced? {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(
                    run_id = %run_id,
                    applied = tally.applied,
                    error = %e,
                    "Import aborted by source error"
                );
                return Err(e);
            }
        };

        tally.failed.sort_by_key(Batch::seq);
        let report = ImportReport {
            run_id,
            started_at,
            total_applied: tally.applied,
            batches_applied: tally.batches,
            failed_batches: tally.failed,
            skipped_rows: 0,
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };

        tracing::info!(
            run_id = %run_id,
            dispatched,
            applied = report.total_applied,
            failed_batches = report.failed_batches.len(),
            elapsed_ms = report.elapsed_ms,
            "Import complete"
        );
        Ok(report)
    }
}

async fn run_worker(
    worker: usize,
    run_id: Uuid,
    store: Arc<dyn GraphStore>,
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    policy: RetryPolicy,
    completed: Arc<AtomicU64>,
    progress_every: u64,
) -> WorkerTally {
    let mut tally = WorkerTally::default();

    loop {
        let next = rx.lock().await.recv().await;
        let Some(batch) = next else {
            break;
        };

        let outcome = {
            let store = &store;
            let batch = &batch;
            retry(&policy, "upsert_edges", move || store.upsert_edges(batch)).await
        };
        match outcome {
            Ok(()) => {
                tally.applied += batch.len() as u64;
                tally.batches += 1;
            }
            Err(e) => {
                tracing::warn!(
                    run_id = %run_id,
                    worker,
                    batch = batch.seq(),
                    records = batch.len(),
                    error = %e,
                    "Batch failed permanently"
                );
                tally.failed.push(batch);
            }
        }

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        if progress_every > 0 && done % progress_every == 0 {
            tracing::info!(run_id = %run_id, batches_done = done, "Import progress");
        }
    }

    tally
}
