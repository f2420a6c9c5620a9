//! One refresh cycle: fetch the feed, ingest it, save if anything changed

use crate::catalogue::SharedCatalogue;
use crate::error::Result;
use crate::feed::FeedClient;
use crate::ingest::{ingest, IngestReport};
use crate::persist::SnapshotStore;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// Default refresh cadence
pub const DEFAULT_INTERVAL_MINUTES: i64 = 10;

/// Truncate `t` to the interval boundary (epoch aligned)
pub fn round_time(t: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    t.duration_trunc(interval).unwrap_or(t)
}

/// Time left until the next interval boundary
pub fn until_next_round(now: DateTime<Utc>, interval: Duration) -> Duration {
    round_time(now, interval) + interval - now
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Rounded timestamp stamped on this cycle's states
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub ingest: IngestReport,
    /// Feed records too short to ingest
    pub short_rows: usize,
    /// Whether the snapshot was written
    pub saved: bool,
}

/// Last finished cycle, shared with the status endpoint
pub type LastCycle = Arc<Mutex<Option<CycleReport>>>;

/// Owns everything the writer side needs
pub struct Refresher {
    feed: FeedClient,
    store: Option<SnapshotStore>,
    catalogue: SharedCatalogue,
    interval: Duration,
    last_cycle: LastCycle,
}

impl Refresher {
    pub fn new(
        feed: FeedClient,
        store: Option<SnapshotStore>,
        catalogue: SharedCatalogue,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            store,
            catalogue,
            interval,
            last_cycle: LastCycle::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_cycle(&self) -> LastCycle {
        Arc::clone(&self.last_cycle)
    }

    /// Run one cycle stamped with `now` rounded to the interval
    ///
    /// A fetch failure is returned and leaves the catalogue untouched. A save
    /// failure is logged; the in-memory catalogue stays current.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let timestamp = round_time(now, self.interval);
        let batch = self.feed.fetch().await?;

        if batch.is_empty() {
            log::warn!("Feed {} returned no gifts", self.feed.url());
        }

        let mut ingest_report = {
            let mut catalogue = self.catalogue.write();
            ingest(&mut catalogue, &batch.rows, timestamp)
        };
        ingest_report.degraded_fields += batch.lossy_cells;

        log::info!(
            "Refresh at {}: {} rows, {} new gifts, {} states recorded, {} degraded fields",
            timestamp,
            ingest_report.rows,
            ingest_report.created,
            ingest_report.recorded,
            ingest_report.degraded_fields
        );

        let saved = ingest_report.changed && self.persist();

        let report = CycleReport {
            timestamp,
            ingest: ingest_report,
            short_rows: batch.short_rows,
            saved,
        };
        *self
            .last_cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        Ok(report)
    }

    /// Write the current catalogue to the snapshot store, returning whether it was written
    pub fn persist(&mut self) -> bool {
        let Some(store) = self.store.as_mut() else {
            log::warn!("No snapshot database, changes are kept in memory only");
            return false;
        };

        let catalogue = self.catalogue.read();
        match store.save(&catalogue) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to save snapshot: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Catalogue;
    use crate::count::Quantity;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = "Druh,Název,Kačky,Počet,Vznik,Odkaz
hračky,Medvěd,120,5,2023-04-01,https://www.alik.cz/s/darky/1
jídlo,Dort,80,?,2023-05-12,https://www.alik.cz/s/darky/2
";

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    async fn feed_server(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn round_time_truncates_to_interval() {
        let interval = Duration::minutes(10);
        // 1_700_000_000 is 22:13:20 UTC
        assert_eq!(round_time(ts(1_700_000_000), interval), ts(1_699_999_800));
        assert_eq!(round_time(ts(1_699_999_800), interval), ts(1_699_999_800));
    }

    #[test]
    fn until_next_round_reaches_boundary() {
        let interval = Duration::minutes(10);
        assert_eq!(until_next_round(ts(1_700_000_000), interval), Duration::seconds(400));
        assert_eq!(until_next_round(ts(1_699_999_800), interval), interval);
    }

    #[tokio::test]
    async fn cycle_ingests_and_saves_on_change() {
        let server = feed_server(FEED).await;
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("gifts.db");

        let catalogue = SharedCatalogue::default();
        let mut refresher = Refresher::new(
            FeedClient::new(server.uri()),
            Some(SnapshotStore::open(&db_path).unwrap()),
            catalogue.clone(),
            Duration::minutes(10),
        );

        let first = refresher.run_cycle(ts(1_700_000_000)).await.unwrap();
        assert_eq!(first.timestamp, ts(1_699_999_800));
        assert_eq!(first.ingest.created, 2);
        assert!(first.saved);
        assert_eq!(
            catalogue
                .read()
                .find_by_identifier("https://www.alik.cz/s/darky/2")
                .unwrap()
                .current_stock(),
            Some(Quantity::Unknown)
        );

        let second = refresher.run_cycle(ts(1_700_000_600)).await.unwrap();
        assert!(!second.ingest.changed);
        assert!(!second.saved);
        assert_eq!(refresher.last_cycle().lock().unwrap().as_ref(), Some(&second));

        let stored = SnapshotStore::open(&db_path).unwrap().load().unwrap();
        assert_eq!(stored, *catalogue.read());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_catalogue_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let catalogue = SharedCatalogue::new(Catalogue::new());
        let mut refresher = Refresher::new(
            FeedClient::new(server.uri()),
            None,
            catalogue.clone(),
            Duration::minutes(10),
        );

        assert!(refresher.run_cycle(ts(1_700_000_000)).await.is_err());
        assert!(catalogue.read().is_empty());
        assert!(refresher.last_cycle().lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn lossy_cells_count_as_degraded_fields() {
        let mut body = FEED.as_bytes().to_vec();
        body.extend_from_slice(b"jidlo,Sy\xffr,30,1,2023-06-01,https://www.alik.cz/s/darky/3\n");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let catalogue = SharedCatalogue::default();
        let mut refresher = Refresher::new(
            FeedClient::new(server.uri()),
            None,
            catalogue.clone(),
            Duration::minutes(10),
        );

        let report = refresher.run_cycle(ts(1_700_000_000)).await.unwrap();
        assert_eq!(report.ingest.created, 3);
        assert_eq!(report.ingest.degraded_fields, 1);
    }

    #[tokio::test]
    async fn missing_store_still_updates_memory() {
        let server = feed_server(FEED).await;
        let catalogue = SharedCatalogue::default();
        let mut refresher = Refresher::new(
            FeedClient::new(server.uri()),
            None,
            catalogue.clone(),
            Duration::minutes(10),
        );

        let report = refresher.run_cycle(ts(1_700_000_000)).await.unwrap();
        assert!(report.ingest.changed);
        assert!(!report.saved);
        assert_eq!(catalogue.read().len(), 2);
    }
}
