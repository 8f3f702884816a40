use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::models::{Category, Table, TableBatch};
use crate::source::{DiscoveredFiles, Route, Router, SourceEncoding, read_document};
use crate::storage::RowSink;

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Rows held per table before they are handed to the sink.
    pub batch_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { batch_size: 5000 }
    }
}

/// Counters for one load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub files_seen: usize,
    pub files_loaded: usize,
    pub files_empty: usize,
    pub files_skipped: usize,
    pub files_unrouted: usize,
    pub latin1_fallbacks: usize,
    pub rows_inserted: usize,
    pub per_table: BTreeMap<Table, usize>,
}

impl LoadReport {
    fn record_write(&mut self, table: Table, rows: usize) {
        self.rows_inserted += rows;
        *self.per_table.entry(table).or_insert(0) += rows;
    }

    pub fn rows_for(&self, table: Table) -> usize {
        self.per_table.get(&table).copied().unwrap_or(0)
    }
}

/// Pending rows per table, released once a table reaches the batch size.
struct BatchAccumulator {
    pending: BTreeMap<Table, TableBatch>,
    batch_size: usize,
}

impl BatchAccumulator {
    fn new(batch_size: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            batch_size: batch_size.max(1),
        }
    }

    fn push(&mut self, batch: TableBatch) -> Result<Option<TableBatch>> {
        let table = batch.table();
        let pending = self
            .pending
            .entry(table)
            .or_insert_with(|| TableBatch::empty(table));
        pending.append(batch)?;

        if pending.len() >= self.batch_size {
            Ok(self.pending.remove(&table))
        } else {
            Ok(None)
        }
    }

    fn drain(&mut self) -> Vec<TableBatch> {
        std::mem::take(&mut self.pending)
            .into_values()
            .filter(|batch| !batch.is_empty())
            .collect()
    }
}

/// Read, route and extract every discovered file, category by category in
/// sorted order, and write the rows to `sink`. Unreadable files are logged
/// and counted; sink failures end the run.
pub fn load(
    files: &DiscoveredFiles,
    router: &Router,
    sink: &mut dyn RowSink,
    options: &LoadOptions,
) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    let mut accumulator = BatchAccumulator::new(options.batch_size);

    info!("Loading {} files into {}", files.total(), sink.describe());

    for category in Category::ALL {
        let paths = files.for_category(category);
        let rows_before = report.rows_inserted;

        for path in paths {
            report.files_seen += 1;

            // Route by the data/<category>/<kind> segments
            let Some(route) = Route::classify(path) else {
                debug!("No route for {}", path.display());
                report.files_unrouted += 1;
                continue;
            };

            // Parse, falling back to Latin-1
            let (document, encoding) = match read_document(path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    report.files_skipped += 1;
                    continue;
                }
            };
            if encoding == SourceEncoding::Latin1 {
                warn!("Read {} with Latin-1 fallback", path.display());
                report.latin1_fallbacks += 1;
            }

            let batch = router.extract(route, path, &document);
            debug!(
                "Routed {} to {} ({} rows)",
                path.display(),
                batch.table(),
                batch.len()
            );

            if batch.is_empty() {
                report.files_empty += 1;
                continue;
            }
            report.files_loaded += 1;

            if let Some(full) = accumulator.push(batch)? {
                flush(sink, &full, &mut report)?;
            }
        }

        // Flush what is left before the next category
        for batch in accumulator.drain() {
            flush(sink, &batch, &mut report)?;
        }

        info!(
            "{}: processed {} files, wrote {} rows",
            category,
            paths.len(),
            report.rows_inserted - rows_before
        );
    }

    info!(
        "Total approx rows inserted: {} ({} files skipped, {} empty, {} unrouted)",
        report.rows_inserted, report.files_skipped, report.files_empty, report.files_unrouted
    );

    Ok(report)
}

fn flush(sink: &mut dyn RowSink, batch: &TableBatch, report: &mut LoadReport) -> Result<()> {
    let table = batch.table();
    let last_source = batch
        .headers()
        .last()
        .map(|header| header.source_path.clone())
        .unwrap_or_default();

    let written = sink.write_batch(batch).with_context(|| {
        format!(
            "Failed to write {} rows to {} (batch ending at {})",
            batch.len(),
            table,
            last_source
        )
    })?;

    report.record_write(table, written);
    Ok(())
}
