use anyhow::Result;
use std::collections::BTreeMap;

use crate::models::{Table, TableBatch};

/// Destination for finished records. A sink appends each batch to its table
/// and returns the number of rows written; failures are returned, never
/// swallowed.
pub trait RowSink {
    fn write_batch(&mut self, batch: &TableBatch) -> Result<usize>;

    fn describe(&self) -> String;
}

/// Keeps every written row in memory, per table.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<Table, TableBatch>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, table: Table) -> Option<&TableBatch> {
        self.tables.get(&table)
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.tables.get(&table).map_or(0, TableBatch::len)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(TableBatch::len).sum()
    }

    pub fn into_tables(self) -> BTreeMap<Table, TableBatch> {
        self.tables
    }
}

impl RowSink for MemorySink {
    fn write_batch(&mut self, batch: &TableBatch) -> Result<usize> {
        self.tables
            .entry(batch.table())
            .or_insert_with(|| TableBatch::empty(batch.table()))
            .append(batch.clone())?;
        Ok(batch.len())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MapUserRow, RowHeader};

    fn map_user_batch(n: usize) -> TableBatch {
        TableBatch::MapUser(
            (0..n)
                .map(|i| MapUserRow {
                    header: RowHeader::new(format!("data/map/user/{}.json", i)),
                    registered_users: i as i64,
                    app_opens: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_memory_sink_appends_per_table() {
        let mut sink = MemorySink::new();
        assert_eq!(sink.write_batch(&map_user_batch(2)).unwrap(), 2);
        assert_eq!(sink.write_batch(&map_user_batch(3)).unwrap(), 3);

        assert_eq!(sink.row_count(Table::MapUser), 5);
        assert_eq!(sink.row_count(Table::TopUser), 0);
        assert_eq!(sink.total_rows(), 5);
        assert!(sink.rows(Table::MapUser).is_some());
    }
}
