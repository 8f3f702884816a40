use anyhow::{Context, Result, anyhow};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::storage_manager::StorageManager;
use crate::models::Table;

/// What a local sink left behind for one table.
#[derive(Debug)]
pub struct TableSnapshot {
    pub table: Table,
    pub files: usize,
    pub frame: Option<DataFrame>,
}

impl TableSnapshot {
    pub fn rows(&self) -> usize {
        self.frame.as_ref().map_or(0, DataFrame::height)
    }

    pub fn is_present(&self) -> bool {
        self.files > 0
    }
}

/// Column type as written by the sinks.
pub fn column_dtype(column: &str) -> DataType {
    match column {
        "source_path" | "country" | "state" | "district" | "transaction_type"
        | "insurance_type" | "pin_code" => DataType::String,
        "year" | "quarter" => DataType::Int32,
        "transaction_amount" | "total_premium" | "total_tx_amount" => DataType::Float64,
        _ => DataType::Int64,
    }
}

/// Read every Parquet, CSV or NDJSON part under `<output_dir>/<table>/` into
/// one frame with the table's column order and types. A missing directory
/// is an absent table, not an error.
pub fn read_table(output_dir: &Path, table: Table) -> Result<TableSnapshot> {
    let dir = StorageManager::table_dir(output_dir, table);
    if !dir.is_dir() {
        return Ok(TableSnapshot {
            table,
            files: 0,
            frame: None,
        });
    }

    let mut parts: Vec<PathBuf> = fs::read_dir(&dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| part_format(path).is_some())
        .collect();
    parts.sort();

    let mut combined: Option<DataFrame> = None;
    for path in &parts {
        let frame = read_part(path)
            .and_then(|df| conform(df, table))
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match combined.as_mut() {
            Some(all) => {
                all.vstack_mut(&frame)
                    .map_err(|e| anyhow!("Failed to combine {}: {}", path.display(), e))?;
            }
            None => combined = Some(frame),
        }
    }

    Ok(TableSnapshot {
        table,
        files: parts.len(),
        frame: combined,
    })
}

fn part_format(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "parquet" => Some("parquet"),
        "csv" => Some("csv"),
        "ndjson" | "jsonl" => Some("ndjson"),
        _ => None,
    }
}

fn read_part(path: &Path) -> Result<DataFrame> {
    let frame = match part_format(path) {
        Some("parquet") => ParquetReader::new(File::open(path)?).finish()?,
        Some("csv") => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        Some("ndjson") => JsonReader::new(File::open(path)?)
            .with_json_format(JsonFormat::JsonLines)
            .finish()?,
        _ => return Err(anyhow!("Unsupported table file {}", path.display())),
    };
    Ok(frame)
}

/// Select the table's columns in order and cast each to its written type,
/// so parts inferred differently (e.g. an all-null CSV column) still stack.
fn conform(df: DataFrame, table: Table) -> Result<DataFrame> {
    let exprs: Vec<Expr> = table
        .columns()
        .into_iter()
        .map(|name| col(name).cast(column_dtype(name)))
        .collect();

    df.lazy()
        .select(exprs)
        .collect()
        .map_err(|e| anyhow!("Unexpected columns for {}: {}", table, e))
}

/// Total amount and count over an `aggregated_transaction` frame.
pub fn transaction_totals(df: &DataFrame) -> Result<DataFrame> {
    df.clone()
        .lazy()
        .select([
            col("transaction_amount").sum().alias("total_amount"),
            col("transaction_count").sum().alias("total_count"),
        ])
        .collect()
        .map_err(|e| anyhow!("Failed to total transactions: {}", e))
}

/// States ranked by summed transaction amount, largest first.
pub fn top_states_by_amount(df: &DataFrame, limit: u32) -> Result<DataFrame> {
    df.clone()
        .lazy()
        .filter(col("state").is_not_null())
        .group_by([col("state")])
        .agg([
            col("transaction_amount").sum().alias("amount"),
            col("transaction_count").sum().alias("count"),
        ])
        .sort(
            ["amount"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(limit)
        .collect()
        .map_err(|e| anyhow!("Failed to rank states: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregatedTransactionRow, RowHeader, TableBatch};
    use crate::storage::{LocalTableSink, OutputFormat, RowSink};

    fn transaction_batch() -> TableBatch {
        let row = |state: Option<&str>, amount: f64| AggregatedTransactionRow {
            header: RowHeader {
                country: Some("india".to_string()),
                state: state.map(str::to_string),
                year: Some(2022),
                quarter: Some(1),
                ..RowHeader::new("data/aggregated/transaction/x.json")
            },
            transaction_type: Some("Merchant payments".to_string()),
            transaction_count: Some(1),
            transaction_amount: Some(amount),
        };
        TableBatch::AggregatedTransaction(vec![
            row(Some("kerala"), 10.0),
            row(Some("goa"), 50.0),
            row(Some("kerala"), 15.0),
            row(None, 1000.0),
        ])
    }

    #[test]
    fn test_absent_table() {
        let tmp = tempfile::tempdir().unwrap();
        let snapshot = read_table(tmp.path(), Table::TopUser).unwrap();
        assert!(!snapshot.is_present());
        assert_eq!(snapshot.rows(), 0);
    }

    #[test]
    fn test_reads_back_every_format() {
        for format in [OutputFormat::Parquet, OutputFormat::Csv, OutputFormat::Ndjson] {
            let tmp = tempfile::tempdir().unwrap();
            let mut sink = LocalTableSink::new(tmp.path(), format).unwrap();
            sink.write_batch(&transaction_batch()).unwrap();
            sink.write_batch(&transaction_batch()).unwrap();

            let snapshot = read_table(tmp.path(), Table::AggregatedTransaction).unwrap();
            assert!(snapshot.is_present());
            assert_eq!(snapshot.rows(), 8, "{:?}", format);
        }
    }

    #[test]
    fn test_transaction_summaries() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = LocalTableSink::new(tmp.path(), OutputFormat::Parquet).unwrap();
        sink.write_batch(&transaction_batch()).unwrap();
        let frame = read_table(tmp.path(), Table::AggregatedTransaction)
            .unwrap()
            .frame
            .unwrap();

        let totals = transaction_totals(&frame).unwrap();
        let amount = totals.column("total_amount").unwrap().as_materialized_series().f64().unwrap().get(0);
        assert_eq!(amount, Some(1075.0));

        let top = top_states_by_amount(&frame, 10).unwrap();
        assert_eq!(top.height(), 2);
        let states = top.column("state").unwrap().as_materialized_series().str().unwrap().get(0).map(str::to_string);
        assert_eq!(states.as_deref(), Some("goa"));
        let kerala = top.column("amount").unwrap().as_materialized_series().f64().unwrap().get(1);
        assert_eq!(kerala, Some(25.0));
    }
}
