//! Tracked items and their append-only state history
//!
//! A new state is only appended when it differs from the last recorded one,
//! so the history is a list of transitions rather than a list of polls.

use crate::count::Quantity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Observed price and stock of an item at one refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Price in the catalogue's minor currency unit
    pub price: i64,
    #[serde(rename = "count")]
    pub quantity: Quantity,
    /// Rounded refresh timestamp, epoch seconds on the wire
    #[serde(rename = "time", with = "chrono::serde::ts_seconds")]
    pub observed_at: DateTime<Utc>,
}

impl StateSnapshot {
    pub fn new(price: i64, quantity: Quantity, observed_at: DateTime<Utc>) -> Self {
        Self {
            price,
            quantity,
            observed_at,
        }
    }
}

/// Result of a "previous value" scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Previous<T> {
    /// Fewer than two recorded states
    NoData,
    /// Every recorded state carries the current value
    Unchanged,
    /// The most recent value that differs from the current one
    Value(T),
}

impl<T: fmt::Display> fmt::Display for Previous<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Previous::NoData => f.write_str("-"),
            Previous::Unchanged => f.write_str("same"),
            Previous::Value(v) => fmt::Display::fmt(v, f),
        }
    }
}

impl<T: Serialize> Serialize for Previous<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Previous::NoData => serializer.serialize_str("-"),
            Previous::Unchanged => serializer.serialize_str("same"),
            Previous::Value(v) => v.serialize(serializer),
        }
    }
}

/// One catalogue item, identified by its URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredItem")]
pub struct TrackedItem {
    pub name: String,
    pub category: String,
    /// Stable join key across refreshes
    #[serde(rename = "url")]
    pub identifier: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    history: Vec<StateSnapshot>,
}

impl TrackedItem {
    /// Create an item with no recorded state
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        identifier: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            identifier: identifier.into(),
            created_at,
            history: Vec::new(),
        }
    }

    /// Rebuild an item from a persisted history
    ///
    /// States older than the one before them are dropped.
    pub fn with_history(mut self, history: Vec<StateSnapshot>) -> Self {
        let mut ordered: Vec<StateSnapshot> = Vec::with_capacity(history.len());
        for snapshot in history {
            match ordered.last() {
                Some(prev) if snapshot.observed_at < prev.observed_at => {
                    log::warn!(
                        "Dropping out-of-order stored state for {} ({} < {})",
                        self.identifier,
                        snapshot.observed_at,
                        prev.observed_at
                    );
                }
                _ => ordered.push(snapshot),
            }
        }
        self.history = ordered;
        self
    }

    pub fn history(&self) -> &[StateSnapshot] {
        &self.history
    }

    pub fn latest(&self) -> Option<&StateSnapshot> {
        self.history.last()
    }

    /// Append `snapshot` if it is a meaningful change, returning whether it was appended
    ///
    /// The first state is always kept. After that a state is kept when the
    /// price moved, or when the count moved between two reported values.
    /// States older than the latest one are dropped.
    pub fn record(&mut self, snapshot: StateSnapshot) -> bool {
        let is_new_state = match self.history.last() {
            None => true,
            Some(prev) if snapshot.observed_at < prev.observed_at => {
                log::warn!(
                    "Ignoring out-of-order state for {} ({} < {})",
                    self.identifier,
                    snapshot.observed_at,
                    prev.observed_at
                );
                false
            }
            Some(prev) => {
                prev.price != snapshot.price || prev.quantity.differs_defined(&snapshot.quantity)
            }
        };

        if is_new_state {
            self.history.push(snapshot);
        }
        is_new_state
    }

    pub fn current_price(&self) -> Option<i64> {
        self.latest().map(|s| s.price)
    }

    pub fn previous_price(&self) -> Previous<i64> {
        self.previous_by(|s| s.price)
    }

    pub fn last_price_change_at(&self) -> Option<DateTime<Utc>> {
        self.last_change_by(|s| s.price)
    }

    pub fn current_stock(&self) -> Option<Quantity> {
        self.latest().map(|s| s.quantity)
    }

    pub fn previous_stock(&self) -> Previous<Quantity> {
        self.previous_by(|s| s.quantity)
    }

    pub fn last_stock_change_at(&self) -> Option<DateTime<Utc>> {
        self.last_change_by(|s| s.quantity)
    }

    /// Scan backward from the second-to-last state for the first value differing
    /// from the current one
    fn previous_by<T, F>(&self, project: F) -> Previous<T>
    where
        T: PartialEq,
        F: Fn(&StateSnapshot) -> T,
    {
        let Some((current, earlier)) = self.history.split_last() else {
            return Previous::NoData;
        };
        if earlier.is_empty() {
            return Previous::NoData;
        }

        let current = project(current);
        earlier
            .iter()
            .rev()
            .map(&project)
            .find(|value| *value != current)
            .map_or(Previous::Unchanged, Previous::Value)
    }

    /// Timestamp of the most recent transition of the projected value, `None` if it never moved
    fn last_change_by<T, F>(&self, project: F) -> Option<DateTime<Utc>>
    where
        T: PartialEq,
        F: Fn(&StateSnapshot) -> T,
    {
        self.history
            .windows(2)
            .rev()
            .find(|pair| project(&pair[0]) != project(&pair[1]))
            .map(|pair| pair[1].observed_at)
    }
}

/// Wire shape of [`TrackedItem`]; decoding goes through [`TrackedItem::with_history`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    name: String,
    category: String,
    url: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    history: Vec<StateSnapshot>,
}

impl From<StoredItem> for TrackedItem {
    fn from(stored: StoredItem) -> Self {
        TrackedItem::new(stored.name, stored.category, stored.url, stored.created_at)
            .with_history(stored.history)
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
