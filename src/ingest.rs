//! Ingestion of feed rows into the catalogue
//!
//! Best effort: a malformed cell degrades to a default value and is counted,
//! it never drops the row or the batch.

use crate::catalogue::Catalogue;
use crate::count::Quantity;
use crate::feed::FeedRow;
use crate::history::{StateSnapshot, TrackedItem};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Date format of the feed's creation column
const CREATED_FORMAT: &str = "%Y-%m-%d";

/// Outcome of ingesting one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Rows processed
    pub rows: usize,
    /// Items seen for the first time
    pub created: usize,
    /// States appended to histories
    pub recorded: usize,
    /// Cells that fell back to a default value
    pub degraded_fields: usize,
    /// Whether any history grew, i.e. whether a snapshot save is warranted
    pub changed: bool,
}

/// Record one observation per row, all stamped with `timestamp`
///
/// `timestamp` should be the refresh time rounded to the interval so states
/// of the same cycle compare equal across items.
pub fn ingest(
    catalogue: &mut Catalogue,
    rows: &[FeedRow],
    timestamp: DateTime<Utc>,
) -> IngestReport {
    let mut report = IngestReport::default();

    for row in rows {
        report.rows += 1;

        let price = parse_price(&row.price).unwrap_or_else(|| {
            log::warn!("Invalid price '{}' for {}, using 0", row.price, row.url);
            report.degraded_fields += 1;
            0
        });
        let quantity = Quantity::parse_strict(&row.count).unwrap_or_else(|| {
            log::warn!("Invalid count '{}' for {}, using 0", row.count, row.url);
            report.degraded_fields += 1;
            Quantity::Number(0.0)
        });

        let snapshot = StateSnapshot::new(price, quantity, timestamp);

        let recorded = match catalogue.find_by_identifier_mut(&row.url) {
            Some(item) => item.record(snapshot),
            None => {
                let created_at = parse_created(&row.created).unwrap_or_else(|| {
                    log::warn!(
                        "Invalid creation date '{}' for {}, using epoch",
                        row.created,
                        row.url
                    );
                    report.degraded_fields += 1;
                    DateTime::<Utc>::UNIX_EPOCH
                });
                log::debug!("New gift: {} ({})", row.name, row.url);
                report.created += 1;
                catalogue
                    .insert(TrackedItem::new(&row.name, &row.category, &row.url, created_at))
                    .record(snapshot)
            }
        };

        if recorded {
            report.recorded += 1;
        }
    }

    report.changed = report.recorded > 0;
    report
}

/// Parses a whole-number price
pub fn parse_price(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

/// Parses a `YYYY-MM-DD` creation date as midnight UTC
pub fn parse_created(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, CREATED_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}
