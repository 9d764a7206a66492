//! taxograph-import: bulk loader for the category taxonomy.
//!
//! Reads a `category,subcategory` edge list (optionally gzipped), groups it
//! into fixed-size batches, and upserts the batches through a bounded pool
//! of workers with per-batch retries.

pub mod batch;
pub mod error;
pub mod orchestrator;
pub mod reader;

pub use error::ImportError;
pub use orchestrator::{ImportOptions, ImportOrchestrator, ImportReport};

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use taxograph_graph::GraphStore;

/// Import an edge-list file end to end.
pub async fn import_file(
    path: &Path,
    store: Arc<dyn GraphStore>,
    batch_size: usize,
    options: ImportOptions,
) -> error::Result<ImportReport> {
    let reader = reader::EdgeReader::open(path)?;
    let skipped = reader.skipped_counter();
    let batches = batch::produce_batches(reader, batch_size)?;

    tracing::info!(path = %path.display(), batch_size, workers = options.workers, "Starting import");
    let mut report = ImportOrchestrator::new(store, options).run(batches).await?;
    report.skipped_rows = skipped.load(Ordering::SeqCst);
    Ok(report)
}
