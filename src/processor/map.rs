use serde_json::{Map, Value};
use std::iter;

use crate::models::{Category, Kind, MapInsuranceRow, MapTransactionRow, MapUserRow, RowHeader};
use crate::processor::shape::{self, AreaContainer, MetricGroup, Shape, aliases};

const UNKNOWN_AREA: &str = "Unknown";

/// Rows for `map_map`, one per hover entry across every candidate container.
///
/// The entry's metric group may be an object or a list of instruments. An
/// entry with no metric group keeps both totals null.
pub fn map_transaction_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = MapTransactionRow> + 'a> {
    let Some(Shape::HoverList(lists)) = shape::detect(Category::Map, Kind::Transaction, data) else {
        return Box::new(iter::empty());
    };

    Box::new(
        lists
            .into_iter()
            .flat_map(|items| items.iter().filter_map(Value::as_object))
            .map(move |entry| {
                let district = shape::text_of(entry, aliases::AREA_NAME)
                    .unwrap_or_else(|| UNKNOWN_AREA.to_string());
                let (count, amount) = match MetricGroup::nested(entry) {
                    Some(group) => (
                        Some(group.count(aliases::COUNT)),
                        Some(group.amount(aliases::AMOUNT)),
                    ),
                    None => (None, None),
                };
                MapTransactionRow {
                    header: header.with_district(Some(district)),
                    total_tx_count: count,
                    total_tx_amount: amount,
                }
            }),
    )
}

/// Rows for `map_user`, one per area in the `hoverData` mapping.
pub fn map_user_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = MapUserRow> + 'a> {
    let Some(Shape::HoverMap(areas)) = shape::detect(Category::Map, Kind::User, data) else {
        return Box::new(iter::empty());
    };

    Box::new(areas.iter().filter_map(move |(name, metrics)| {
        let metrics = metrics.as_object()?;
        Some(MapUserRow {
            header: header.with_district(Some(name.clone())),
            registered_users: shape::count_or_zero(metrics, aliases::MAP_REGISTERED),
            app_opens: shape::count_or_zero(metrics, aliases::MAP_APP_OPENS),
        })
    }))
}

/// Rows for `map_insurance`, from list-of-objects and mapping-of-objects
/// containers alike.
pub fn map_insurance_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = MapInsuranceRow> + 'a> {
    let Some(Shape::AreaContainers(containers)) =
        shape::detect(Category::Map, Kind::Insurance, data)
    else {
        return Box::new(iter::empty());
    };

    Box::new(containers.into_iter().flat_map(move |container| {
        let areas: Box<dyn Iterator<Item = (String, &'a Map<String, Value>)> + 'a> = match container {
            AreaContainer::List(items) => Box::new(items.iter().filter_map(Value::as_object).map(
                |entry| {
                    let name = shape::text_of(entry, aliases::INSURANCE_AREA_NAME)
                        .unwrap_or_else(|| UNKNOWN_AREA.to_string());
                    (name, entry)
                },
            )),
            AreaContainer::Mapping(areas) => Box::new(
                areas
                    .iter()
                    .filter_map(|(name, metrics)| Some((name.clone(), metrics.as_object()?))),
            ),
        };
        areas.map(move |(name, entry)| {
            let (policies, premium) = insurance_measure(entry);
            MapInsuranceRow {
                header: header.with_district(Some(name)),
                total_policies: policies,
                total_premium: premium,
            }
        })
    }))
}

fn insurance_measure(entry: &Map<String, Value>) -> (i64, f64) {
    let sources: &[&[&str]] = &[aliases::POLICIES, aliases::PREMIUM];
    match MetricGroup::resolve(entry, sources) {
        Some(group) => {
            let policies = match group {
                MetricGroup::Object(_) => group.count(aliases::POLICIES),
                MetricGroup::Instruments(_) => group.count(aliases::COUNT),
            };
            let premium = match group {
                MetricGroup::Object(_) => group.amount(aliases::PREMIUM),
                MetricGroup::Instruments(_) => group.amount(aliases::AMOUNT),
            };
            (policies, premium)
        }
        None => (0, 0.0),
    }
}
