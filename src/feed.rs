//! Gift catalogue CSV feed fetching and parsing

use crate::error::{Result, TrackerError};
use std::borrow::Cow;
use std::io::Read;

/// Default catalogue export
pub const DEFAULT_FEED_URL: &str = "https://www.alik.cz/s/darky/csv";

/// Column order of the feed
mod column {
    pub const CATEGORY: usize = 0;
    pub const NAME: usize = 1;
    pub const PRICE: usize = 2;
    pub const COUNT: usize = 3;
    pub const CREATED: usize = 4;
    pub const URL: usize = 5;
    pub const COUNT_OF_COLUMNS: usize = 6;
}

/// One feed row, fields still unparsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub category: String,
    pub name: String,
    pub price: String,
    pub count: String,
    pub created: String,
    pub url: String,
}

/// Rows of one feed download
#[derive(Debug, Default)]
pub struct FeedBatch {
    pub rows: Vec<FeedRow>,
    /// Records with fewer than six columns
    pub short_rows: usize,
    /// Cells that were not valid UTF-8 and were decoded lossily
    pub lossy_cells: usize,
}

impl FeedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a feed body; the header row is skipped and cells are trimmed
///
/// Invalid UTF-8 inside a cell is replaced rather than failing the batch.
pub fn read_feed<R: Read>(reader: R) -> Result<FeedBatch> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut batch = FeedBatch::default();
    for result in rdr.byte_records() {
        let record = result?;
        if record.len() < column::COUNT_OF_COLUMNS {
            log::warn!(
                "Skipping feed row with {} columns: {:?}",
                record.len(),
                record.iter().map(String::from_utf8_lossy).collect::<Vec<_>>()
            );
            batch.short_rows += 1;
            continue;
        }

        let mut cell = |index: usize| match String::from_utf8_lossy(&record[index]) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => {
                log::warn!("Invalid UTF-8 in feed column {}: {:?}", index, text);
                batch.lossy_cells += 1;
                text
            }
        };
        let row = FeedRow {
            category: cell(column::CATEGORY),
            name: cell(column::NAME),
            price: cell(column::PRICE),
            count: cell(column::COUNT),
            created: cell(column::CREATED),
            url: cell(column::URL),
        };
        batch.rows.push(row);
    }

    Ok(batch)
}

/// HTTP client for the catalogue export
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and parse the feed (async)
    pub async fn fetch(&self) -> Result<FeedBatch> {
        log::debug!("Fetching gift feed from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("User-Agent", "gift_tracker/1.0")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TrackerError::HttpStatus(response.status()));
        }

        let body = response.bytes().await?;
        let batch = read_feed(body.as_ref())?;

        log::debug!(
            "Fetched {} feed rows ({} short rows skipped, {} lossy cells)",
            batch.len(),
            batch.short_rows,
            batch.lossy_cells
        );
        Ok(batch)
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
