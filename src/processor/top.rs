use serde_json::{Map, Value};
use std::iter;

use crate::models::{Category, Kind, RowHeader, TopInsuranceRow, TopTransactionRow, TopUserRow};
use crate::processor::shape::{self, MetricGroup, RankedList, Shape, aliases};

/// One entry of a ranked list, with the scope and rank it resolves to.
#[derive(Debug, Clone)]
pub struct RankedEntry<'a> {
    pub header: RowHeader,
    pub pin_code: Option<String>,
    pub rank: i64,
    pub fields: &'a Map<String, Value>,
}

impl<'a> RankedEntry<'a> {
    /// The entry itself when it carries any of `keys` directly, else its
    /// nested metric group.
    fn measures(&self, keys: &[&[&str]]) -> Option<MetricGroup<'a>> {
        MetricGroup::resolve(self.fields, keys)
    }
}

/// Flatten every list found in a top document into ranked entries.
///
/// Entries of a `pincodes` list name their pin code (in `entityName` or
/// `name`) and carry no district; all other lists name an area. Rank falls back to the 1-based position in the
/// entry's own list.
pub fn ranked_entries<'a>(
    kind: Kind,
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = RankedEntry<'a>> + 'a> {
    let Some(Shape::RankedLists(lists)) = shape::detect(Category::Top, kind, data) else {
        return Box::new(iter::empty());
    };

    Box::new(lists.into_iter().flat_map(move |list: RankedList<'a>| {
        let pin_list = list.key == Some(aliases::PIN_CODE_LIST);
        list.items
            .iter()
            .enumerate()
            .filter_map(move |(index, item)| {
                let fields = item.as_object()?;
                let (district, pin_code) = if pin_list {
                    (None, shape::text_of(fields, aliases::PIN_CODE_ENTITY))
                } else {
                    (
                        shape::text_of(fields, aliases::TOP_NAME),
                        shape::text_of(fields, aliases::PIN_CODE),
                    )
                };
                let rank = shape::first_present(fields, aliases::RANK)
                    .and_then(shape::count_of)
                    .unwrap_or(index as i64 + 1);
                Some(RankedEntry {
                    header: header.with_district(district),
                    pin_code,
                    rank,
                    fields,
                })
            })
    }))
}

pub fn top_user_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = TopUserRow> + 'a> {
    Box::new(ranked_entries(Kind::User, data, header).map(|entry| {
        let group = entry.measures(&[aliases::TOP_REGISTERED, aliases::TOP_APP_OPENS]);
        TopUserRow {
            registered_users: group.map_or(0, |g| g.count(aliases::TOP_REGISTERED)),
            app_opens: group.map_or(0, |g| g.count(aliases::TOP_APP_OPENS)),
            pin_code: entry.pin_code,
            rank: entry.rank,
            header: entry.header,
        }
    }))
}

/// Rows for `top_map`.
pub fn top_transaction_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = TopTransactionRow> + 'a> {
    Box::new(ranked_entries(Kind::Transaction, data, header).map(|entry| {
        let (count, amount) = match entry.measures(&[aliases::TOP_TX_COUNT, aliases::TOP_TX_AMOUNT]) {
            Some(group @ MetricGroup::Object(_)) => (
                group.count(aliases::TOP_TX_COUNT),
                group.amount(aliases::TOP_TX_AMOUNT),
            ),
            Some(group @ MetricGroup::Instruments(_)) => {
                (group.count(aliases::COUNT), group.amount(aliases::AMOUNT))
            }
            None => (0, 0.0),
        };
        TopTransactionRow {
            total_tx_count: count,
            total_tx_amount: amount,
            pin_code: entry.pin_code,
            rank: entry.rank,
            header: entry.header,
        }
    }))
}

pub fn top_insurance_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = TopInsuranceRow> + 'a> {
    Box::new(ranked_entries(Kind::Insurance, data, header).map(|entry| {
        let (policies, premium) = match entry.measures(&[aliases::POLICIES, aliases::PREMIUM]) {
            Some(group @ MetricGroup::Object(_)) => {
                (group.count(aliases::POLICIES), group.amount(aliases::PREMIUM))
            }
            Some(group @ MetricGroup::Instruments(_)) => {
                (group.count(aliases::COUNT), group.amount(aliases::AMOUNT))
            }
            None => (0, 0.0),
        };
        TopInsuranceRow {
            total_policies: policies,
            total_premium: premium,
            pin_code: entry.pin_code,
            rank: entry.rank,
            header: entry.header,
        }
    }))
}
