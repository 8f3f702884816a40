//! Shape detection and field aliasing for the source documents.
//!
//! Each (category, kind) pair has a closed list of known document layouts,
//! tried in priority order. A layout either matches and hands back borrowed
//! views into the document, or it does not; a document that matches none of
//! its pair's layouts yields no rows.
//!
//! Measurements are read through alias tables: the first key present (not
//! null, not an empty string) wins. Coercion follows one rule everywhere:
//! a present measurement group with a missing or non-numeric value counts as
//! zero, while a missing measurement group stays unknown (`None`) where the
//! destination column is nullable.

use serde_json::{Map, Value};

use crate::models::{Category, Kind};

/// Alias tables, one constant per logical field, candidates in priority order.
pub mod aliases {
    pub const TRANSACTION_DATA: &[&str] = &["transactionData"];
    pub const TRANSACTION_TYPE: &[&str] = &["name"];
    pub const INSTRUMENTS: &[&str] = &["paymentInstruments"];
    pub const INSTRUMENT_TYPE: &[&str] = &["type"];
    pub const TOTAL_MARKER: &str = "TOTAL";

    pub const COUNT: &[&str] = &["count", "totalCount"];
    pub const AMOUNT: &[&str] = &["amount", "totalAmount"];

    pub const USER_SUMMARY: &[&str] = &["registeredUsers", "appOpens", "activeUsers"];
    pub const USER_SUMMARY_CONTAINER: &[&str] = &["aggregated"];
    pub const REGISTERED_USERS: &[&str] = &["registeredUsers"];
    pub const APP_OPENS: &[&str] = &["appOpens"];
    pub const ACTIVE_USERS: &[&str] = &["activeUsers"];
    pub const USERS_BY_DEVICE: &[&str] = &["usersByDevice"];
    pub const DEVICE_REGISTERED: &[&str] = &["registeredUsers", "count"];
    pub const DEVICE_APP_OPENS: &[&str] = &["appOpens", "appOpensCount"];

    pub const INSURANCE_CONTAINER: &[&str] = &["insurance", "insuranceData"];
    pub const INSURANCE_TYPE: &[&str] = &["name", "insuranceType"];
    pub const POLICIES: &[&str] = &["count", "policies"];
    pub const PREMIUM: &[&str] = &["amount", "premium"];

    pub const MAP_TRANSACTION_CONTAINERS: &[&str] = &["hoverDataList", "data", "hoverData", "states"];
    pub const MAP_INSURANCE_CONTAINERS: &[&str] = &["hoverDataList", "insurance", "data"];
    pub const HOVER_DATA: &[&str] = &["hoverData"];
    pub const AREA_NAME: &[&str] = &["name", "district", "state"];
    pub const INSURANCE_AREA_NAME: &[&str] = &["name", "district"];
    pub const METRIC_GROUP: &[&str] = &["metric", "values", "value"];
    pub const MAP_REGISTERED: &[&str] = &["registeredUsers", "registered"];
    pub const MAP_APP_OPENS: &[&str] = &["appOpens", "appOpensCount"];

    pub const TOP_NAME: &[&str] = &["name", "district", "state", "entityName"];
    pub const PIN_CODE: &[&str] = &["pincode", "pin"];
    pub const PIN_CODE_ENTITY: &[&str] = &["pincode", "pin", "entityName", "name"];
    pub const PIN_CODE_LIST: &str = "pincodes";
    pub const RANK: &[&str] = &["rank", "position"];
    pub const TOP_REGISTERED: &[&str] = &["registeredUsers", "count"];
    pub const TOP_APP_OPENS: &[&str] = &["appOpens"];
    pub const TOP_TX_COUNT: &[&str] = &["count", "transactions"];
    pub const TOP_TX_AMOUNT: &[&str] = &["amount", "value"];
}

/// Tag of every known layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeKind {
    /// `data.transactionData[]` of typed entries with payment instruments.
    TransactionTypes,
    /// Top-level user totals on `data`.
    UserSummary,
    /// `data.usersByDevice[]` breakdown.
    UsersByDevice,
    /// `data.insurance` / `data.insuranceData` as a list or single object.
    InsuranceEntries,
    /// Lists of per-area hover entries.
    HoverList,
    /// `data.hoverData` as an area-name to metrics mapping.
    HoverMap,
    /// Insurance area containers, lists or mappings.
    AreaContainers,
    /// Every list reachable through nested objects.
    RankedLists,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::TransactionTypes => "transaction-types",
            ShapeKind::UserSummary => "user-summary",
            ShapeKind::UsersByDevice => "users-by-device",
            ShapeKind::InsuranceEntries => "insurance-entries",
            ShapeKind::HoverList => "hover-list",
            ShapeKind::HoverMap => "hover-map",
            ShapeKind::AreaContainers => "area-containers",
            ShapeKind::RankedLists => "ranked-lists",
        }
    }

    /// Known layouts for a (category, kind) pair, highest priority first.
    pub fn candidates(category: Category, kind: Kind) -> &'static [ShapeKind] {
        match (category, kind) {
            (Category::Aggregated, Kind::Transaction) => &[ShapeKind::TransactionTypes],
            (Category::Aggregated, Kind::User) => {
                &[ShapeKind::UserSummary, ShapeKind::UsersByDevice]
            }
            (Category::Aggregated, Kind::Insurance) => {
                &[ShapeKind::InsuranceEntries, ShapeKind::TransactionTypes]
            }
            (Category::Map, Kind::Transaction) => &[ShapeKind::HoverList],
            (Category::Map, Kind::User) => &[ShapeKind::HoverMap],
            (Category::Map, Kind::Insurance) => &[ShapeKind::AreaContainers],
            (Category::Top, _) => &[ShapeKind::RankedLists],
        }
    }

    fn matches<'a>(&self, data: &'a Value) -> Option<Shape<'a>> {
        match self {
            ShapeKind::TransactionTypes => {
                let obj = data.as_object()?;
                first_present(obj, aliases::TRANSACTION_DATA)?
                    .as_array()
                    .map(|entries| Shape::TransactionTypes(entries.as_slice()))
            }
            ShapeKind::UserSummary => {
                let obj = data.as_object()?;
                let is_summary = |candidate: &Map<String, Value>| {
                    aliases::USER_SUMMARY
                        .iter()
                        .any(|key| candidate.contains_key(*key))
                };
                if is_summary(obj) {
                    return Some(Shape::UserSummary(obj));
                }
                first_present(obj, aliases::USER_SUMMARY_CONTAINER)?
                    .as_object()
                    .filter(|nested| is_summary(nested))
                    .map(Shape::UserSummary)
            }
            ShapeKind::UsersByDevice => {
                let obj = data.as_object()?;
                first_present(obj, aliases::USERS_BY_DEVICE)?
                    .as_array()
                    .filter(|devices| !devices.is_empty())
                    .map(|devices| Shape::UsersByDevice(devices.as_slice()))
            }
            ShapeKind::InsuranceEntries => {
                let obj = data.as_object()?;
                aliases::INSURANCE_CONTAINER.iter().find_map(|key| {
                    let container = obj.get(*key)?;
                    match container {
                        Value::Array(items) if !items.is_empty() => {
                            Some(Shape::InsuranceEntries(items.iter().collect()))
                        }
                        Value::Object(fields) if !fields.is_empty() => {
                            Some(Shape::InsuranceEntries(vec![container]))
                        }
                        _ => None,
                    }
                })
            }
            ShapeKind::HoverList => {
                let lists: Vec<&[Value]> = match data {
                    Value::Object(obj) => aliases::MAP_TRANSACTION_CONTAINERS
                        .iter()
                        .filter_map(|key| obj.get(*key)?.as_array().map(Vec::as_slice))
                        .collect(),
                    Value::Array(items) => vec![items.as_slice()],
                    _ => Vec::new(),
                };
                (!lists.is_empty()).then_some(Shape::HoverList(lists))
            }
            ShapeKind::HoverMap => {
                let obj = data.as_object()?;
                first_present(obj, aliases::HOVER_DATA)?
                    .as_object()
                    .map(|areas| Shape::HoverMap(areas))
            }
            ShapeKind::AreaContainers => {
                let obj = data.as_object()?;
                let containers: Vec<AreaContainer<'a>> = aliases::MAP_INSURANCE_CONTAINERS
                    .iter()
                    .filter_map(|key| match obj.get(*key)? {
                        Value::Array(items) => Some(AreaContainer::List(items.as_slice())),
                        Value::Object(areas) => Some(AreaContainer::Mapping(areas)),
                        _ => None,
                    })
                    .collect();
                (!containers.is_empty()).then_some(Shape::AreaContainers(containers))
            }
            ShapeKind::RankedLists => {
                let mut lists = Vec::new();
                match data {
                    Value::Object(obj) => collect_lists(obj, &mut lists),
                    Value::Array(items) => lists.push(RankedList {
                        key: None,
                        items: items.as_slice(),
                    }),
                    _ => {}
                }
                (!lists.is_empty()).then_some(Shape::RankedLists(lists))
            }
        }
    }
}

/// A detected layout with borrowed views into the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape<'a> {
    TransactionTypes(&'a [Value]),
    UserSummary(&'a Map<String, Value>),
    UsersByDevice(&'a [Value]),
    InsuranceEntries(Vec<&'a Value>),
    HoverList(Vec<&'a [Value]>),
    HoverMap(&'a Map<String, Value>),
    AreaContainers(Vec<AreaContainer<'a>>),
    RankedLists(Vec<RankedList<'a>>),
}

impl Shape<'_> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::TransactionTypes(_) => ShapeKind::TransactionTypes,
            Shape::UserSummary(_) => ShapeKind::UserSummary,
            Shape::UsersByDevice(_) => ShapeKind::UsersByDevice,
            Shape::InsuranceEntries(_) => ShapeKind::InsuranceEntries,
            Shape::HoverList(_) => ShapeKind::HoverList,
            Shape::HoverMap(_) => ShapeKind::HoverMap,
            Shape::AreaContainers(_) => ShapeKind::AreaContainers,
            Shape::RankedLists(_) => ShapeKind::RankedLists,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AreaContainer<'a> {
    List(&'a [Value]),
    Mapping(&'a Map<String, Value>),
}

/// A list found during the recursive search, with the key it was stored under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedList<'a> {
    pub key: Option<&'a str>,
    pub items: &'a [Value],
}

/// Detect the layout of a document's `data` payload.
pub fn detect<'a>(category: Category, kind: Kind, data: &'a Value) -> Option<Shape<'a>> {
    ShapeKind::candidates(category, kind)
        .iter()
        .find_map(|candidate| candidate.matches(data))
}

/// Depth-first over nested objects, collecting every list-valued field.
fn collect_lists<'a>(obj: &'a Map<String, Value>, found: &mut Vec<RankedList<'a>>) {
    for (key, value) in obj {
        match value {
            Value::Array(items) => found.push(RankedList {
                key: Some(key.as_str()),
                items: items.as_slice(),
            }),
            Value::Object(nested) => collect_lists(nested, found),
            _ => {}
        }
    }
}

/// First candidate key whose value is present: not null and not an empty string.
pub fn first_present<'a>(entry: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| match entry.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(value),
    })
}

/// Whether any of `keys` holds a present number or string. A nested object
/// or list under a measurement key is a metric group, not a value.
pub fn has_scalar(entry: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| match entry.get(*key) {
        Some(Value::Number(_)) => true,
        Some(Value::String(s)) => !s.trim().is_empty(),
        _ => false,
    })
}

/// Non-negative integer from a number or numeric string. Fractions truncate.
pub fn count_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .filter(|c| *c >= 0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .filter(|c| *c >= 0)
        }
        _ => None,
    }
}

/// Non-negative float from a number or numeric string.
pub fn amount_of(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

pub fn count_or_zero(entry: &Map<String, Value>, keys: &[&str]) -> i64 {
    first_present(entry, keys).and_then(count_of).unwrap_or(0)
}

pub fn amount_or_zero(entry: &Map<String, Value>, keys: &[&str]) -> f64 {
    first_present(entry, keys).and_then(amount_of).unwrap_or(0.0)
}

/// Present counts coerce (non-numeric becomes 0); absent counts stay `None`.
pub fn count_if_present(entry: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    first_present(entry, keys).map(|value| count_of(value).unwrap_or(0))
}

/// Text from a string value, or the literal form of a number.
pub fn text_of(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match first_present(entry, keys)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Totals over a list of payment instruments: the entry tagged `TOTAL` when
/// it carries the value, otherwise the sum over all entries.
pub fn instrument_totals(instruments: &[Value], count_keys: &[&str], amount_keys: &[&str]) -> (i64, f64) {
    let entries: Vec<&Map<String, Value>> = instruments.iter().filter_map(Value::as_object).collect();
    let total = entries.iter().find(|entry| {
        first_present(entry, aliases::INSTRUMENT_TYPE).and_then(Value::as_str)
            == Some(aliases::TOTAL_MARKER)
    });

    let count = total
        .and_then(|entry| first_present(entry, count_keys))
        .and_then(count_of)
        .unwrap_or_else(|| {
            entries
                .iter()
                .map(|entry| count_or_zero(entry, count_keys))
                .fold(0i64, i64::saturating_add)
        });
    let amount = total
        .and_then(|entry| first_present(entry, amount_keys))
        .and_then(amount_of)
        .unwrap_or_else(|| {
            entries
                .iter()
                .map(|entry| amount_or_zero(entry, amount_keys))
                .sum()
        });

    (count, amount)
}

/// Where an entry's measurements live: on a metrics object, or in a list of
/// instrument entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricGroup<'a> {
    Object(&'a Map<String, Value>),
    Instruments(&'a [Value]),
}

impl<'a> MetricGroup<'a> {
    /// The entry's nested metric group, if it has one.
    pub fn nested(entry: &'a Map<String, Value>) -> Option<Self> {
        match first_present(entry, aliases::METRIC_GROUP)? {
            Value::Object(obj) => Some(MetricGroup::Object(obj)),
            Value::Array(items) => Some(MetricGroup::Instruments(items.as_slice())),
            _ => None,
        }
    }

    /// The entry itself when it carries a scalar under any of `keys`,
    /// otherwise its nested metric group.
    pub fn resolve(entry: &'a Map<String, Value>, keys: &[&[&str]]) -> Option<Self> {
        if keys.iter().any(|k| has_scalar(entry, k)) {
            Some(MetricGroup::Object(entry))
        } else {
            Self::nested(entry)
        }
    }

    pub fn count(&self, keys: &[&str]) -> i64 {
        match self {
            MetricGroup::Object(obj) => count_or_zero(obj, keys),
            MetricGroup::Instruments(items) => instrument_totals(items, keys, &[]).0,
        }
    }

    pub fn amount(&self, keys: &[&str]) -> f64 {
        match self {
            MetricGroup::Object(obj) => amount_or_zero(obj, keys),
            MetricGroup::Instruments(items) => instrument_totals(items, &[], keys).1,
        }
    }
}
