//! Time-windowed views over the catalogue
//!
//! Every window is `[now - within, now]`, inclusive at both ends. `now` is
//! passed in so views are reproducible.

use crate::catalogue::Catalogue;
use crate::count::Quantity;
use crate::history::{Previous, StateSnapshot, TrackedItem};
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

fn window_start(now: DateTime<Utc>, within: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(within).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn in_window(t: DateTime<Utc>, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start <= t && t <= now
}

/// Items created within the window
pub fn added_since(
    catalogue: &Catalogue,
    now: DateTime<Utc>,
    within: Duration,
) -> Vec<&TrackedItem> {
    let start = window_start(now, within);
    catalogue
        .iter()
        .filter(|item| in_window(item.created_at, start, now))
        .collect()
}

/// Items whose latest state relates to some earlier in-window state by `changed(current, before)`
///
/// The latest state itself is never compared, so items with a single state
/// are never returned.
pub fn state_changed<F>(
    catalogue: &Catalogue,
    now: DateTime<Utc>,
    within: Duration,
    changed: F,
) -> Vec<&TrackedItem>
where
    F: Fn(&StateSnapshot, &StateSnapshot) -> bool,
{
    let start = window_start(now, within);
    catalogue
        .iter()
        .filter(|item| {
            let Some((current, earlier)) = item.history().split_last() else {
                return false;
            };
            earlier
                .iter()
                .rev()
                .filter(|before| in_window(before.observed_at, start, now))
                .any(|before| changed(current, before))
        })
        .collect()
}

/// Items that were more expensive at some point within the window
pub fn discounted(
    catalogue: &Catalogue,
    now: DateTime<Utc>,
    within: Duration,
) -> Vec<&TrackedItem> {
    state_changed(catalogue, now, within, |current, before| {
        before.price > current.price
    })
}

/// Items whose stock differed at some point within the window
pub fn stock_changed(
    catalogue: &Catalogue,
    now: DateTime<Utc>,
    within: Duration,
) -> Vec<&TrackedItem> {
    state_changed(catalogue, now, within, |current, before| {
        before.quantity != current.quantity
    })
}

/// Derived facts of one item, as served to viewers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub name: String,
    pub category: String,
    pub url: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "value_or_no_data")]
    pub current_price: Option<i64>,
    pub previous_price: Previous<i64>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_price_change_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "value_or_no_data")]
    pub current_stock: Option<Quantity>,
    pub previous_stock: Previous<Quantity>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_stock_change_at: Option<DateTime<Utc>>,
}

/// An empty history has no current value; rendered like [`Previous::NoData`]
fn value_or_no_data<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => Previous::<T>::NoData.serialize(serializer),
    }
}

impl From<&TrackedItem> for ItemSummary {
    fn from(item: &TrackedItem) -> Self {
        Self {
            name: item.name.clone(),
            category: item.category.clone(),
            url: item.identifier.clone(),
            created_at: item.created_at,
            current_price: item.current_price(),
            previous_price: item.previous_price(),
            last_price_change_at: item.last_price_change_at(),
            current_stock: item.current_stock(),
            previous_stock: item.previous_stock(),
            last_stock_change_at: item.last_stock_change_at(),
        }
    }
}

pub fn summarize(items: &[&TrackedItem]) -> Vec<ItemSummary> {
    items.iter().map(|&item| ItemSummary::from(item)).collect()
}

#[cfg(test)]
#[path = "filters_tests.rs"]
mod tests;
