use serde_json::{Map, Value};
use std::iter;

use crate::models::{
    AggregatedInsuranceRow, AggregatedTransactionRow, AggregatedUserRow, Category, Kind, RowHeader,
};
use crate::processor::shape::{self, Shape, aliases};

/// Rows for `aggregated_transaction`, one per transaction type.
///
/// The instrument tagged `TOTAL` supplies count and amount when present;
/// otherwise all instruments are summed. When the entry has no instrument
/// list at all both totals are null.
pub fn aggregated_transaction_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = AggregatedTransactionRow> + 'a> {
    let Some(Shape::TransactionTypes(entries)) =
        shape::detect(Category::Aggregated, Kind::Transaction, data)
    else {
        return Box::new(iter::empty());
    };

    Box::new(entries.iter().filter_map(Value::as_object).map(move |entry| {
        let (count, amount) = match instruments(entry) {
            Some(list) => {
                let (count, amount) = shape::instrument_totals(list, aliases::COUNT, aliases::AMOUNT);
                (Some(count), Some(amount))
            }
            None => (None, None),
        };
        AggregatedTransactionRow {
            header: header.clone(),
            transaction_type: shape::text_of(entry, aliases::TRANSACTION_TYPE),
            transaction_count: count,
            transaction_amount: amount,
        }
    }))
}

/// A single row for `aggregated_user`, or none when the document matches
/// neither the summary nor the per-device layout.
///
/// The summary layout keeps `active_users` null when the key is absent. The
/// per-device layout sums registrations and app opens and never reports
/// active users.
pub fn aggregated_user_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = AggregatedUserRow> + 'a> {
    let row = match shape::detect(Category::Aggregated, Kind::User, data) {
        Some(Shape::UserSummary(summary)) => Some(AggregatedUserRow {
            header: header.clone(),
            registered_users: shape::count_or_zero(summary, aliases::REGISTERED_USERS),
            app_opens: shape::count_or_zero(summary, aliases::APP_OPENS),
            active_users: shape::count_if_present(summary, aliases::ACTIVE_USERS),
        }),
        Some(Shape::UsersByDevice(devices)) => {
            let (registered, opens) = devices.iter().filter_map(Value::as_object).fold(
                (0i64, 0i64),
                |(registered, opens), device| {
                    (
                        registered.saturating_add(shape::count_or_zero(device, aliases::DEVICE_REGISTERED)),
                        opens.saturating_add(shape::count_or_zero(device, aliases::DEVICE_APP_OPENS)),
                    )
                },
            );
            Some(AggregatedUserRow {
                header: header.clone(),
                registered_users: registered,
                app_opens: opens,
                active_users: None,
            })
        }
        _ => None,
    };

    Box::new(row.into_iter())
}

/// Rows for `aggregated_insurance`, one per insurance entry.
///
/// Besides the explicit insurance list, documents laid out like transaction
/// summaries are accepted: each type's `TOTAL` instrument (or the instrument
/// sum) becomes its policy count and premium.
pub fn aggregated_insurance_rows<'a>(
    data: &'a Value,
    header: &'a RowHeader,
) -> Box<dyn Iterator<Item = AggregatedInsuranceRow> + 'a> {
    match shape::detect(Category::Aggregated, Kind::Insurance, data) {
        Some(Shape::InsuranceEntries(entries)) => Box::new(
            entries
                .into_iter()
                .filter_map(Value::as_object)
                .map(move |entry| AggregatedInsuranceRow {
                    header: header.clone(),
                    insurance_type: shape::text_of(entry, aliases::INSURANCE_TYPE),
                    total_policies: shape::count_or_zero(entry, aliases::POLICIES),
                    total_premium: shape::amount_or_zero(entry, aliases::PREMIUM),
                }),
        ),
        Some(Shape::TransactionTypes(entries)) => Box::new(
            entries
                .iter()
                .filter_map(Value::as_object)
                .map(move |entry| {
                    let (policies, premium) = instruments(entry)
                        .map(|list| shape::instrument_totals(list, aliases::COUNT, aliases::AMOUNT))
                        .unwrap_or((0, 0.0));
                    AggregatedInsuranceRow {
                        header: header.clone(),
                        insurance_type: shape::text_of(entry, aliases::INSURANCE_TYPE),
                        total_policies: policies,
                        total_premium: premium,
                    }
                }),
        ),
        _ => Box::new(iter::empty()),
    }
}

fn instruments(entry: &Map<String, Value>) -> Option<&[Value]> {
    shape::first_present(entry, aliases::INSTRUMENTS)?
        .as_array()
        .map(Vec::as_slice)
}
