use anyhow::{Result, anyhow};
use polars::prelude::*;

use crate::models::{RowHeader, TableBatch};

/// Build a DataFrame for a batch with the destination table's column order:
/// the shared header columns, then the table's own fields.
pub fn batch_to_dataframe(batch: &TableBatch) -> Result<DataFrame> {
    let headers = batch.headers();
    let mut columns = header_columns(&headers);

    match batch {
        TableBatch::AggregatedTransaction(rows) => {
            columns.push(text("transaction_type", rows.iter().map(|r| r.transaction_type.as_deref())));
            columns.push(ints("transaction_count", rows.iter().map(|r| r.transaction_count)));
            columns.push(floats("transaction_amount", rows.iter().map(|r| r.transaction_amount)));
        }
        TableBatch::AggregatedUser(rows) => {
            columns.push(ints("registered_users", rows.iter().map(|r| Some(r.registered_users))));
            columns.push(ints("app_opens", rows.iter().map(|r| Some(r.app_opens))));
            columns.push(ints("active_users", rows.iter().map(|r| r.active_users)));
        }
        TableBatch::AggregatedInsurance(rows) => {
            columns.push(text("insurance_type", rows.iter().map(|r| r.insurance_type.as_deref())));
            columns.push(ints("total_policies", rows.iter().map(|r| Some(r.total_policies))));
            columns.push(floats("total_premium", rows.iter().map(|r| Some(r.total_premium))));
        }
        TableBatch::MapUser(rows) => {
            columns.push(ints("registered_users", rows.iter().map(|r| Some(r.registered_users))));
            columns.push(ints("app_opens", rows.iter().map(|r| Some(r.app_opens))));
        }
        TableBatch::MapMap(rows) => {
            columns.push(ints("total_tx_count", rows.iter().map(|r| r.total_tx_count)));
            columns.push(floats("total_tx_amount", rows.iter().map(|r| r.total_tx_amount)));
        }
        TableBatch::MapInsurance(rows) => {
            columns.push(ints("total_policies", rows.iter().map(|r| Some(r.total_policies))));
            columns.push(floats("total_premium", rows.iter().map(|r| Some(r.total_premium))));
        }
        TableBatch::TopUser(rows) => {
            columns.push(text("pin_code", rows.iter().map(|r| r.pin_code.as_deref())));
            columns.push(ints("rank", rows.iter().map(|r| Some(r.rank))));
            columns.push(ints("registered_users", rows.iter().map(|r| Some(r.registered_users))));
            columns.push(ints("app_opens", rows.iter().map(|r| Some(r.app_opens))));
        }
        TableBatch::TopMap(rows) => {
            columns.push(text("pin_code", rows.iter().map(|r| r.pin_code.as_deref())));
            columns.push(ints("rank", rows.iter().map(|r| Some(r.rank))));
            columns.push(ints("total_tx_count", rows.iter().map(|r| Some(r.total_tx_count))));
            columns.push(floats("total_tx_amount", rows.iter().map(|r| Some(r.total_tx_amount))));
        }
        TableBatch::TopInsurance(rows) => {
            columns.push(text("pin_code", rows.iter().map(|r| r.pin_code.as_deref())));
            columns.push(ints("rank", rows.iter().map(|r| Some(r.rank))));
            columns.push(ints("total_policies", rows.iter().map(|r| Some(r.total_policies))));
            columns.push(floats("total_premium", rows.iter().map(|r| Some(r.total_premium))));
        }
    }

    DataFrame::new(columns)
        .map_err(|e| anyhow!("Failed to create DataFrame for {}: {}", batch.table(), e))
}

fn header_columns(headers: &[&RowHeader]) -> Vec<Column> {
    vec![
        text("source_path", headers.iter().map(|h| Some(h.source_path.as_str()))),
        text("country", headers.iter().map(|h| h.country.as_deref())),
        text("state", headers.iter().map(|h| h.state.as_deref())),
        text("district", headers.iter().map(|h| h.district.as_deref())),
        Series::new("year".into(), headers.iter().map(|h| h.year).collect::<Vec<_>>()).into(),
        Series::new("quarter".into(), headers.iter().map(|h| h.quarter).collect::<Vec<_>>()).into(),
    ]
}

fn text<'a>(name: &str, values: impl Iterator<Item = Option<&'a str>>) -> Column {
    Series::new(name.into(), values.collect::<Vec<_>>()).into()
}

fn ints(name: &str, values: impl Iterator<Item = Option<i64>>) -> Column {
    Series::new(name.into(), values.collect::<Vec<_>>()).into()
}

fn floats(name: &str, values: impl Iterator<Item = Option<f64>>) -> Column {
    Series::new(name.into(), values.collect::<Vec<_>>()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregatedUserRow, Table, TopTransactionRow};

    fn header(path: &str) -> RowHeader {
        RowHeader {
            country: Some("india".to_string()),
            year: Some(2020),
            quarter: Some(4),
            ..RowHeader::new(path)
        }
    }

    #[test]
    fn test_column_order_matches_table() {
        for table in Table::ALL {
            let df = batch_to_dataframe(&TableBatch::empty(table)).unwrap();
            let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
            assert_eq!(names, table.columns());
            assert_eq!(df.height(), 0);
        }
    }

    #[test]
    fn test_nullable_columns_keep_nulls() {
        let batch = TableBatch::AggregatedUser(vec![
            AggregatedUserRow {
                header: header("data/aggregated/user/country/india/2020/4.json"),
                registered_users: 500,
                app_opens: 0,
                active_users: None,
            },
            AggregatedUserRow {
                header: header("data/aggregated/user/country/india/2020/4.json"),
                registered_users: 1,
                app_opens: 2,
                active_users: Some(3),
            },
        ]);
        let df = batch_to_dataframe(&batch).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.column("active_users").unwrap().null_count(), 1);
        assert_eq!(df.column("state").unwrap().null_count(), 2);
        assert_eq!(df.column("registered_users").unwrap().null_count(), 0);
    }

    #[test]
    fn test_top_map_frame() {
        let batch = TableBatch::TopMap(vec![TopTransactionRow {
            header: header("data/top/transaction/country/india/2020/4.json"),
            pin_code: Some("110001".to_string()),
            rank: 1,
            total_tx_count: 10,
            total_tx_amount: 99.5,
        }]);
        let df = batch_to_dataframe(&batch).unwrap();

        assert_eq!(df.shape(), (1, 10));
        assert_eq!(df.column("pin_code").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("total_tx_amount").unwrap().dtype(), &DataType::Float64);
    }
}
