use pulse_etl::loader::{LoadOptions, LoadReport, load};
use pulse_etl::models::{Table, TableBatch};
use pulse_etl::source::{Router, discover_json_files};
use pulse_etl::storage::{LocalTableSink, MemorySink, OutputFormat, read_table};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

fn write_json(root: &Path, relative: &str, value: Value) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn write_raw(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

/// A small Pulse-like tree with every table represented, plus an empty
/// document and a corrupt one.
fn pulse_tree() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    write_json(
        root,
        "data/aggregated/transaction/country/india/2022/1.json",
        json!({"success": true, "data": {"transactionData": [
            {"name": "Merchant payments", "paymentInstruments": [
                {"type": "TOTAL", "count": 100, "amount": 5000.0},
                {"type": "PhonePe", "count": 60, "amount": 3000.0}
            ]},
            {"name": "Others", "paymentInstruments": [
                {"type": "UPI", "count": 10, "amount": 1.5},
                {"type": "CARD", "count": 20, "amount": 2.5}
            ]}
        ]}}),
    );
    write_json(
        root,
        "data/aggregated/transaction/country/india/state/tamil%20nadu/2022/1.json",
        json!({"data": {"transactionData": [
            {"name": "Peer-to-peer payments", "paymentInstruments": [
                {"type": "TOTAL", "count": 40, "amount": 900.0}
            ]}
        ]}}),
    );
    write_json(
        root,
        "data/aggregated/user/country/india/2022/1.json",
        json!({"data": {"registeredUsers": 500, "appOpens": 42}}),
    );
    write_json(
        root,
        "data/aggregated/user/country/india/2022/2.json",
        json!({"data": {"usersByDevice": [
            {"brand": "Xiaomi", "count": 30},
            {"brand": "Samsung", "count": 20}
        ]}}),
    );
    write_json(
        root,
        "data/aggregated/insurance/country/india/2022/1.json",
        json!({"data": {"insurance": {"name": "Insurance", "count": 12, "amount": 9999.0}}}),
    );
    write_json(
        root,
        "data/map/transaction/hover/country/india/state/maharashtra/2022/1.json",
        json!({"data": {"hoverDataList": [
            {"name": "Pune", "metric": {"count": 5, "amount": 1200.5}},
            {"metric": {"count": 1, "amount": 2.0}}
        ]}}),
    );
    write_json(
        root,
        "data/map/user/hover/country/india/2022/1.json",
        json!({"data": {"hoverData": {
            "kerala": {"registeredUsers": 10, "appOpens": 3},
            "goa": {"registeredUsers": 4, "appOpens": 1}
        }}}),
    );
    write_json(
        root,
        "data/map/insurance/hover/country/india/2022/1.json",
        json!({"data": {"insurance": {
            "bengaluru urban district": {"count": 8, "amount": 80.0}
        }}}),
    );
    write_json(
        root,
        "data/top/transaction/country/india/2022/1.json",
        json!({"data": {
            "states": [{"entityName": "karnataka", "metric": {"count": 9, "amount": 90.0}}],
            "pincodes": [{"entityName": "560001", "metric": {"count": 3, "amount": 30.0}}]
        }}),
    );
    write_json(
        root,
        "data/top/user/state-wise/Karnataka/2022/1.json",
        json!({"data": {"districts": [{"name": "bengaluru urban", "registeredUsers": 77}]}}),
    );
    write_json(
        root,
        "data/top/insurance/country/india/2022/1.json",
        json!({"data": {"pincodes": [{"entityName": "110001", "count": 2, "amount": 20.0}]}}),
    );

    write_json(root, "data/map/user/hover/country/india/2022/2.json", json!({}));
    write_raw(root, "data/top/user/country/india/2022/2.json", b"\x00\x01 garbage {");

    tmp
}

fn run(repo: &Path, sink: &mut dyn pulse_etl::storage::RowSink) -> LoadReport {
    let files = discover_json_files(repo);
    let router = Router::new(Some("india".to_string())).unwrap();
    load(&files, &router, sink, &LoadOptions { batch_size: 3 }).unwrap()
}

#[test]
fn test_every_table_is_populated() {
    let tmp = pulse_tree();
    let mut sink = MemorySink::new();
    let report = run(tmp.path(), &mut sink);

    assert_eq!(report.files_seen, 13);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.files_empty, 1);
    assert_eq!(report.files_loaded, 11);

    let expected = [
        (Table::AggregatedTransaction, 3),
        (Table::AggregatedUser, 2),
        (Table::AggregatedInsurance, 1),
        (Table::MapMap, 2),
        (Table::MapUser, 2),
        (Table::MapInsurance, 1),
        (Table::TopMap, 2),
        (Table::TopUser, 1),
        (Table::TopInsurance, 1),
    ];
    for (table, rows) in expected {
        assert_eq!(sink.row_count(table), rows, "{}", table);
        assert_eq!(report.rows_for(table), rows, "{}", table);
    }
    assert_eq!(report.rows_inserted, 15);
    assert_eq!(sink.total_rows(), 15);
}

#[test]
fn test_extracted_values_and_context() {
    let tmp = pulse_tree();
    let mut sink = MemorySink::new();
    run(tmp.path(), &mut sink);

    let Some(TableBatch::AggregatedTransaction(rows)) = sink.rows(Table::AggregatedTransaction) else {
        panic!("aggregated_transaction missing");
    };
    let merchant = rows
        .iter()
        .find(|row| row.transaction_type.as_deref() == Some("Merchant payments"))
        .unwrap();
    assert_eq!(merchant.transaction_count, Some(100));
    assert_eq!(merchant.transaction_amount, Some(5000.0));
    assert_eq!(merchant.header.year, Some(2022));
    assert_eq!(merchant.header.quarter, Some(1));

    let others = rows
        .iter()
        .find(|row| row.transaction_type.as_deref() == Some("Others"))
        .unwrap();
    assert_eq!(others.transaction_count, Some(30));
    assert_eq!(others.transaction_amount, Some(4.0));

    let p2p = rows
        .iter()
        .find(|row| row.transaction_type.as_deref() == Some("Peer-to-peer payments"))
        .unwrap();
    assert_eq!(p2p.header.state.as_deref(), Some("tamil nadu"));

    let Some(TableBatch::AggregatedUser(users)) = sink.rows(Table::AggregatedUser) else {
        panic!("aggregated_user missing");
    };
    assert_eq!(users[0].registered_users, 500);
    assert_eq!(users[0].active_users, None);
    assert_eq!(users[1].registered_users, 50);

    let Some(TableBatch::MapMap(map_rows)) = sink.rows(Table::MapMap) else {
        panic!("map_map missing");
    };
    assert_eq!(map_rows[0].header.district.as_deref(), Some("Pune"));
    assert_eq!(map_rows[0].total_tx_count, Some(5));
    assert_eq!(map_rows[0].total_tx_amount, Some(1200.5));
    assert_eq!(map_rows[1].header.district.as_deref(), Some("Unknown"));

    let Some(TableBatch::TopUser(top_users)) = sink.rows(Table::TopUser) else {
        panic!("top_user missing");
    };
    assert_eq!(top_users[0].header.state.as_deref(), Some("Karnataka"));
    assert_eq!(top_users[0].header.country.as_deref(), Some("india"));
    assert_eq!(top_users[0].rank, 1);
    assert_eq!(top_users[0].registered_users, 77);

    for batch in sink.into_tables().values() {
        assert!(batch.headers().iter().all(|h| !h.source_path.is_empty()));
    }
}

#[test]
fn test_rerun_yields_identical_counts() {
    let tmp = pulse_tree();

    let mut first = MemorySink::new();
    let first_report = run(tmp.path(), &mut first);
    let mut second = MemorySink::new();
    let second_report = run(tmp.path(), &mut second);

    assert_eq!(first_report, second_report);
    assert_eq!(first.into_tables(), second.into_tables());
}

#[test]
fn test_local_sink_rerun_replaces_output() {
    let tmp = pulse_tree();
    let out = tempfile::tempdir().unwrap();

    for _ in 0..2 {
        let mut sink = LocalTableSink::new(out.path(), OutputFormat::Csv).unwrap();
        let report = run(tmp.path(), &mut sink);
        assert_eq!(report.rows_inserted, 15);
    }

    for table in Table::ALL {
        let snapshot = read_table(out.path(), table).unwrap();
        assert!(snapshot.is_present(), "{}", table);
        assert_eq!(snapshot.files, 1, "{}", table);
    }
    assert_eq!(read_table(out.path(), Table::AggregatedTransaction).unwrap().rows(), 3);
    assert_eq!(read_table(out.path(), Table::MapUser).unwrap().rows(), 2);
}

#[test]
fn test_parquet_output_matches_memory() {
    let tmp = pulse_tree();
    let out = tempfile::tempdir().unwrap();
    let mut sink = LocalTableSink::new(out.path(), OutputFormat::Parquet).unwrap();
    let report = run(tmp.path(), &mut sink);

    let total: usize = Table::ALL
        .iter()
        .map(|table| read_table(out.path(), *table).unwrap().rows())
        .sum();
    assert_eq!(total, report.rows_inserted);
}

#[test]
fn test_empty_and_garbage_only_tree() {
    let tmp = tempfile::tempdir().unwrap();
    write_json(tmp.path(), "data/aggregated/user/country/india/2020/1.json", json!({}));
    write_json(tmp.path(), "data/map/insurance/hover/country/india/2020/1.json", json!({"data": []}));
    write_raw(tmp.path(), "data/top/transaction/country/india/2020/1.json", b"");

    let mut sink = MemorySink::new();
    let report = run(tmp.path(), &mut sink);

    assert_eq!(report.files_seen, 3);
    assert_eq!(report.rows_inserted, 0);
    assert_eq!(report.files_empty, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(sink.total_rows(), 0);
}

#[test]
fn test_rerun_drops_tables_that_no_longer_have_rows() {
    let tmp = pulse_tree();
    let out = tempfile::tempdir().unwrap();

    let mut sink = LocalTableSink::new(out.path(), OutputFormat::Parquet).unwrap();
    run(tmp.path(), &mut sink);
    assert!(read_table(out.path(), Table::TopUser).unwrap().is_present());

    fs::remove_dir_all(tmp.path().join("data/top")).unwrap();
    let mut sink = LocalTableSink::new(out.path(), OutputFormat::Parquet).unwrap();
    let report = run(tmp.path(), &mut sink);
    assert_eq!(report.rows_for(Table::TopUser), 0);

    for table in [Table::TopMap, Table::TopUser, Table::TopInsurance] {
        assert!(!read_table(out.path(), table).unwrap().is_present(), "{}", table);
    }
    assert_eq!(read_table(out.path(), Table::MapUser).unwrap().rows(), 2);
}
