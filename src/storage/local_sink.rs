use anyhow::{Context, Result, anyhow};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::frame::batch_to_dataframe;
use super::row_sink::RowSink;
use super::storage_manager::StorageManager;
use crate::models::{Table, TableBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Parquet,
    Csv,
    Ndjson,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
            OutputFormat::Ndjson => "ndjson",
        }
    }
}

/// Writes tables under `<output_dir>/<table>/`. Creating the sink clears all
/// nine table directories, so a run replaces whatever an earlier run left,
/// including tables this run writes nothing to.
pub struct LocalTableSink {
    output_dir: PathBuf,
    format: OutputFormat,
    paths: StorageManager,
    parts: HashMap<Table, usize>,
}

impl LocalTableSink {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;

        // Drop the previous run's tables
        for table in Table::ALL {
            let dir = StorageManager::table_dir(&output_dir, table);
            if dir.exists() {
                fs::remove_dir_all(&dir)
                    .with_context(|| format!("Failed to clear {}", dir.display()))?;
            }
        }

        info!(
            "Local sink writing {} files to {}",
            format.extension(),
            output_dir.display()
        );

        Ok(Self {
            output_dir,
            format,
            paths: StorageManager::new(),
            parts: HashMap::new(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn table_dir(&self, table: Table) -> Result<PathBuf> {
        let dir = StorageManager::table_dir(&self.output_dir, table);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    fn next_part(&mut self, table: Table) -> usize {
        let part = self.parts.entry(table).or_insert(0);
        let current = *part;
        *part += 1;
        current
    }

    fn write_frame(&mut self, table: Table, df: &mut DataFrame) -> Result<PathBuf> {
        let dir = self.table_dir(table)?;

        match self.format {
            // One part file per batch
            OutputFormat::Parquet => {
                let part = self.next_part(table);
                let path = dir.join(self.paths.part_file_name(part, "parquet"));
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                ParquetWriter::new(file)
                    .finish(df)
                    .map_err(|e| anyhow!("Failed to write Parquet {}: {}", path.display(), e))?;
                Ok(path)
            }
            // Single file per table, header only on creation
            OutputFormat::Csv => {
                let path = dir.join(StorageManager::csv_file_name(table));
                let write_header = !path.exists();
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                CsvWriter::new(&mut file)
                    .include_header(write_header)
                    .finish(df)
                    .map_err(|e| anyhow!("Failed to append CSV {}: {}", path.display(), e))?;
                Ok(path)
            }
            OutputFormat::Ndjson => {
                let part = self.next_part(table);
                let path = dir.join(self.paths.part_file_name(part, "ndjson"));
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                JsonWriter::new(file)
                    .with_json_format(JsonFormat::JsonLines)
                    .finish(df)
                    .map_err(|e| anyhow!("Failed to write NDJSON {}: {}", path.display(), e))?;
                Ok(path)
            }
        }
    }
}

impl RowSink for LocalTableSink {
    fn write_batch(&mut self, batch: &TableBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let table = batch.table();
        let mut df = batch_to_dataframe(batch)?;
        let path = self.write_frame(table, &mut df)?;

        debug!("Wrote {} rows of {} to {}", df.height(), table, path.display());
        Ok(df.height())
    }

    fn describe(&self) -> String {
        format!("{} files in {}", self.format.extension(), self.output_dir.display())
    }
}
