use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level source category, the first segment under `data/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Aggregated,
    Map,
    Top,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Aggregated, Category::Map, Category::Top];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Aggregated => "aggregated",
            Category::Map => "map",
            Category::Top => "top",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == segment)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-domain within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Transaction,
    User,
    Insurance,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Transaction, Kind::User, Kind::Insurance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Transaction => "transaction",
            Kind::User => "user",
            Kind::Insurance => "insurance",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == segment)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The nine destination tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    AggregatedTransaction,
    AggregatedUser,
    AggregatedInsurance,
    MapUser,
    MapMap,
    MapInsurance,
    TopUser,
    TopMap,
    TopInsurance,
}

pub const HEADER_COLUMNS: [&str; 6] = [
    "source_path",
    "country",
    "state",
    "district",
    "year",
    "quarter",
];

impl Table {
    pub const ALL: [Table; 9] = [
        Table::AggregatedTransaction,
        Table::AggregatedUser,
        Table::AggregatedInsurance,
        Table::MapUser,
        Table::MapMap,
        Table::MapInsurance,
        Table::TopUser,
        Table::TopMap,
        Table::TopInsurance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::AggregatedTransaction => "aggregated_transaction",
            Table::AggregatedUser => "aggregated_user",
            Table::AggregatedInsurance => "aggregated_insurance",
            Table::MapUser => "map_user",
            Table::MapMap => "map_map",
            Table::MapInsurance => "map_insurance",
            Table::TopUser => "top_user",
            Table::TopMap => "top_map",
            Table::TopInsurance => "top_insurance",
        }
    }

    /// Destination table for a (category, kind) pair. Map and top transaction
    /// files land in `map_map` / `top_map`.
    pub fn for_route(category: Category, kind: Kind) -> Self {
        match (category, kind) {
            (Category::Aggregated, Kind::Transaction) => Table::AggregatedTransaction,
            (Category::Aggregated, Kind::User) => Table::AggregatedUser,
            (Category::Aggregated, Kind::Insurance) => Table::AggregatedInsurance,
            (Category::Map, Kind::Transaction) => Table::MapMap,
            (Category::Map, Kind::User) => Table::MapUser,
            (Category::Map, Kind::Insurance) => Table::MapInsurance,
            (Category::Top, Kind::Transaction) => Table::TopMap,
            (Category::Top, Kind::User) => Table::TopUser,
            (Category::Top, Kind::Insurance) => Table::TopInsurance,
        }
    }

    /// Domain columns following the shared header columns.
    pub fn domain_columns(&self) -> &'static [&'static str] {
        match self {
            Table::AggregatedTransaction => {
                &["transaction_type", "transaction_count", "transaction_amount"]
            }
            Table::AggregatedUser => &["registered_users", "app_opens", "active_users"],
            Table::AggregatedInsurance => &["insurance_type", "total_policies", "total_premium"],
            Table::MapUser => &["registered_users", "app_opens"],
            Table::MapMap => &["total_tx_count", "total_tx_amount"],
            Table::MapInsurance => &["total_policies", "total_premium"],
            Table::TopUser => &["pin_code", "rank", "registered_users", "app_opens"],
            Table::TopMap => &["pin_code", "rank", "total_tx_count", "total_tx_amount"],
            Table::TopInsurance => &["pin_code", "rank", "total_policies", "total_premium"],
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        HEADER_COLUMNS
            .iter()
            .chain(self.domain_columns())
            .copied()
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lineage and scope columns shared by every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowHeader {
    pub source_path: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub year: Option<i32>,
    pub quarter: Option<i32>,
}

impl RowHeader {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            country: None,
            state: None,
            district: None,
            year: None,
            quarter: None,
        }
    }

    /// Copy of this header scoped to a district found in document content.
    pub fn with_district(&self, district: Option<String>) -> Self {
        Self {
            district,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTransactionRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub transaction_type: Option<String>,
    pub transaction_count: Option<i64>,
    pub transaction_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedUserRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub registered_users: i64,
    pub app_opens: i64,
    pub active_users: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedInsuranceRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub insurance_type: Option<String>,
    pub total_policies: i64,
    pub total_premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapUserRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub registered_users: i64,
    pub app_opens: i64,
}

/// Row of the `map_map` table (per-area transaction totals). Both totals are
/// null when the entry carried no metric group at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTransactionRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub total_tx_count: Option<i64>,
    pub total_tx_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInsuranceRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub total_policies: i64,
    pub total_premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopUserRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub pin_code: Option<String>,
    pub rank: i64,
    pub registered_users: i64,
    pub app_opens: i64,
}

/// Row of the `top_map` table (ranked transaction totals).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTransactionRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub pin_code: Option<String>,
    pub rank: i64,
    pub total_tx_count: i64,
    pub total_tx_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopInsuranceRow {
    #[serde(flatten)]
    pub header: RowHeader,
    pub pin_code: Option<String>,
    pub rank: i64,
    pub total_policies: i64,
    pub total_premium: f64,
}

/// An ordered run of records bound for a single table. The variant decides
/// the destination, so a batch can never mix tables.
#[derive(Debug, Clone, PartialEq)]
pub enum TableBatch {
    AggregatedTransaction(Vec<AggregatedTransactionRow>),
    AggregatedUser(Vec<AggregatedUserRow>),
    AggregatedInsurance(Vec<AggregatedInsuranceRow>),
    MapUser(Vec<MapUserRow>),
    MapMap(Vec<MapTransactionRow>),
    MapInsurance(Vec<MapInsuranceRow>),
    TopUser(Vec<TopUserRow>),
    TopMap(Vec<TopTransactionRow>),
    TopInsurance(Vec<TopInsuranceRow>),
}

impl TableBatch {
    pub fn empty(table: Table) -> Self {
        match table {
            Table::AggregatedTransaction => TableBatch::AggregatedTransaction(Vec::new()),
            Table::AggregatedUser => TableBatch::AggregatedUser(Vec::new()),
            Table::AggregatedInsurance => TableBatch::AggregatedInsurance(Vec::new()),
            Table::MapUser => TableBatch::MapUser(Vec::new()),
            Table::MapMap => TableBatch::MapMap(Vec::new()),
            Table::MapInsurance => TableBatch::MapInsurance(Vec::new()),
            Table::TopUser => TableBatch::TopUser(Vec::new()),
            Table::TopMap => TableBatch::TopMap(Vec::new()),
            Table::TopInsurance => TableBatch::TopInsurance(Vec::new()),
        }
    }

    pub fn table(&self) -> Table {
        match self {
            TableBatch::AggregatedTransaction(_) => Table::AggregatedTransaction,
            TableBatch::AggregatedUser(_) => Table::AggregatedUser,
            TableBatch::AggregatedInsurance(_) => Table::AggregatedInsurance,
            TableBatch::MapUser(_) => Table::MapUser,
            TableBatch::MapMap(_) => Table::MapMap,
            TableBatch::MapInsurance(_) => Table::MapInsurance,
            TableBatch::TopUser(_) => Table::TopUser,
            TableBatch::TopMap(_) => Table::TopMap,
            TableBatch::TopInsurance(_) => Table::TopInsurance,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TableBatch::AggregatedTransaction(rows) => rows.len(),
            TableBatch::AggregatedUser(rows) => rows.len(),
            TableBatch::AggregatedInsurance(rows) => rows.len(),
            TableBatch::MapUser(rows) => rows.len(),
            TableBatch::MapMap(rows) => rows.len(),
            TableBatch::MapInsurance(rows) => rows.len(),
            TableBatch::TopUser(rows) => rows.len(),
            TableBatch::TopMap(rows) => rows.len(),
            TableBatch::TopInsurance(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move all rows of `other` onto the end of this batch.
    pub fn append(&mut self, other: TableBatch) -> Result<()> {
        match (self, other) {
            (TableBatch::AggregatedTransaction(a), TableBatch::AggregatedTransaction(b)) => a.extend(b),
            (TableBatch::AggregatedUser(a), TableBatch::AggregatedUser(b)) => a.extend(b),
            (TableBatch::AggregatedInsurance(a), TableBatch::AggregatedInsurance(b)) => a.extend(b),
            (TableBatch::MapUser(a), TableBatch::MapUser(b)) => a.extend(b),
            (TableBatch::MapMap(a), TableBatch::MapMap(b)) => a.extend(b),
            (TableBatch::MapInsurance(a), TableBatch::MapInsurance(b)) => a.extend(b),
            (TableBatch::TopUser(a), TableBatch::TopUser(b)) => a.extend(b),
            (TableBatch::TopMap(a), TableBatch::TopMap(b)) => a.extend(b),
            (TableBatch::TopInsurance(a), TableBatch::TopInsurance(b)) => a.extend(b),
            (target, other) => {
                return Err(anyhow!(
                    "Cannot append {} rows to a {} batch",
                    other.table(),
                    target.table()
                ));
            }
        }
        Ok(())
    }

    /// Headers of every row in order, for lineage checks and frame building.
    pub fn headers(&self) -> Vec<&RowHeader> {
        match self {
            TableBatch::AggregatedTransaction(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::AggregatedUser(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::AggregatedInsurance(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::MapUser(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::MapMap(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::MapInsurance(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::TopUser(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::TopMap(rows) => rows.iter().map(|r| &r.header).collect(),
            TableBatch::TopInsurance(rows) => rows.iter().map(|r| &r.header).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_names() {
        assert_eq!(
            Table::for_route(Category::Map, Kind::Transaction).name(),
            "map_map"
        );
        assert_eq!(
            Table::for_route(Category::Top, Kind::Transaction).name(),
            "top_map"
        );
        assert_eq!(
            Table::for_route(Category::Aggregated, Kind::Insurance).name(),
            "aggregated_insurance"
        );
    }

    #[test]
    fn test_columns_start_with_header() {
        for table in Table::ALL {
            let columns = table.columns();
            assert_eq!(&columns[..6], &HEADER_COLUMNS);
            assert_eq!(columns.len(), 6 + table.domain_columns().len());
        }
        assert_eq!(
            &Table::TopUser.columns()[6..],
            &["pin_code", "rank", "registered_users", "app_opens"]
        );
    }

    #[test]
    fn test_append_rejects_other_table() {
        let header = RowHeader::new("data/map/user/x.json");
        let mut batch = TableBatch::empty(Table::MapUser);
        batch
            .append(TableBatch::MapUser(vec![MapUserRow {
                header: header.clone(),
                registered_users: 1,
                app_opens: 2,
            }]))
            .unwrap();
        assert_eq!(batch.len(), 1);

        let err = batch.append(TableBatch::empty(Table::TopUser));
        assert!(err.is_err());
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_segments_parse() {
        assert_eq!(Category::from_segment("top"), Some(Category::Top));
        assert_eq!(Category::from_segment("Top"), None);
        assert_eq!(Kind::from_segment("insurance"), Some(Kind::Insurance));
        assert_eq!(Kind::from_segment("hover"), None);
    }
}
