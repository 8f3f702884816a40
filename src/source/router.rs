use anyhow::Result;
use serde_json::Value;
use std::path::{Component, Path};

use crate::models::{Category, Kind, RowHeader, Table, TableBatch};
use crate::processor::{
    PathContextResolver, aggregated_insurance_rows, aggregated_transaction_rows,
    aggregated_user_rows, map_insurance_rows, map_transaction_rows, map_user_rows,
    top_insurance_rows, top_transaction_rows, top_user_rows,
};

/// The (category, kind) pair a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    pub category: Category,
    pub kind: Kind,
}

impl Route {
    /// Classify a file by the two segments after `data`:
    /// `data/<category>/<kind>/...`. Paths outside that layout have no route.
    pub fn classify(path: &Path) -> Option<Route> {
        let segments: Vec<&str> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();

        segments.windows(3).find_map(|window| {
            if window[0] != "data" {
                return None;
            }
            let category = Category::from_segment(window[1])?;
            let kind = Kind::from_segment(window[2])?;
            Some(Route { category, kind })
        })
    }

    pub fn table(&self) -> Table {
        Table::for_route(self.category, self.kind)
    }
}

/// Turns a parsed document into rows for its route's table.
pub struct Router {
    resolver: PathContextResolver,
    default_country: Option<String>,
}

impl Router {
    pub fn new(default_country: Option<String>) -> Result<Self> {
        Ok(Router {
            resolver: PathContextResolver::new()?,
            default_country: default_country.filter(|c| !c.trim().is_empty()),
        })
    }

    /// Header for every row of `path`: the path-derived context, with the
    /// default country filling in when the path names none.
    pub fn header_for(&self, path: &Path) -> RowHeader {
        let context = self.resolver.resolve(path);
        RowHeader {
            source_path: path.display().to_string(),
            country: context.country.or_else(|| self.default_country.clone()),
            state: context.state,
            district: context.district,
            year: context.year,
            quarter: context.quarter,
        }
    }

    /// Run the route's extractor over the document's `data` payload.
    pub fn extract(&self, route: Route, path: &Path, document: &Value) -> TableBatch {
        let header = self.header_for(path);
        let data = document.get("data").unwrap_or(&Value::Null);

        match (route.category, route.kind) {
            (Category::Aggregated, Kind::Transaction) => {
                TableBatch::AggregatedTransaction(aggregated_transaction_rows(data, &header).collect())
            }
            (Category::Aggregated, Kind::User) => {
                TableBatch::AggregatedUser(aggregated_user_rows(data, &header).collect())
            }
            (Category::Aggregated, Kind::Insurance) => {
                TableBatch::AggregatedInsurance(aggregated_insurance_rows(data, &header).collect())
            }
            (Category::Map, Kind::Transaction) => {
                TableBatch::MapMap(map_transaction_rows(data, &header).collect())
            }
            (Category::Map, Kind::User) => TableBatch::MapUser(map_user_rows(data, &header).collect()),
            (Category::Map, Kind::Insurance) => {
                TableBatch::MapInsurance(map_insurance_rows(data, &header).collect())
            }
            (Category::Top, Kind::Transaction) => {
                TableBatch::TopMap(top_transaction_rows(data, &header).collect())
            }
            (Category::Top, Kind::User) => TableBatch::TopUser(top_user_rows(data, &header).collect()),
            (Category::Top, Kind::Insurance) => {
                TableBatch::TopInsurance(top_insurance_rows(data, &header).collect())
            }
        }
    }
}
