//! Tests for the feed adapter

use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAMPLE_FEED: &str = "Druh,Název,Kačky,Počet,Vznik,Odkaz
hračky,Plyšový medvěd,120,5,2023-04-01,https://www.alik.cz/s/darky/1
jídlo,Dort,80,?,2023-05-12,https://www.alik.cz/s/darky/2
  ozdoby , Hvězda ,15,∞,2022-12-24, https://www.alik.cz/s/darky/3
";

#[test]
fn reads_rows_in_column_order() {
    let batch = read_feed(SAMPLE_FEED.as_bytes()).unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.short_rows, 0);

    let first = &batch.rows[0];
    assert_eq!(first.category, "hračky");
    assert_eq!(first.name, "Plyšový medvěd");
    assert_eq!(first.price, "120");
    assert_eq!(first.count, "5");
    assert_eq!(first.created, "2023-04-01");
    assert_eq!(first.url, "https://www.alik.cz/s/darky/1");
}

#[test]
fn trims_cells() {
    let batch = read_feed(SAMPLE_FEED.as_bytes()).unwrap();
    let third = &batch.rows[2];
    assert_eq!(third.category, "ozdoby");
    assert_eq!(third.name, "Hvězda");
    assert_eq!(third.count, "∞");
    assert_eq!(third.url, "https://www.alik.cz/s/darky/3");
}

#[test]
fn header_only_feed_is_empty() {
    let batch = read_feed("Druh,Název,Kačky,Počet,Vznik,Odkaz\n".as_bytes()).unwrap();
    assert!(batch.is_empty());
}

#[test]
fn short_rows_are_skipped_and_counted() {
    let feed = "Druh,Název,Kačky,Počet,Vznik,Odkaz
hračky,Medvěd,120
hračky,Auto,50,1,2023-01-01,https://www.alik.cz/s/darky/9
";
    let batch = read_feed(feed.as_bytes()).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.short_rows, 1);
    assert_eq!(batch.rows[0].name, "Auto");
}

#[test]
fn invalid_utf8_cell_does_not_drop_batch() {
    let mut feed = b"Druh,N\xc3\xa1zev,Ka\xc4\x8dky,Po\xc4\x8det,Vznik,Odkaz\n".to_vec();
    feed.extend_from_slice(b"misc,Medved,120,5,2023-04-01,https://www.alik.cz/s/darky/1\n");
    feed.extend_from_slice(b"misc,Bad\xff\xfe,90,1,2023-04-02,https://www.alik.cz/s/darky/2\n");
    feed.extend_from_slice(b"misc,Auto,50,2,2023-04-03,https://www.alik.cz/s/darky/3\n");

    let batch = read_feed(feed.as_slice()).unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.lossy_cells, 1);
    assert_eq!(batch.rows[1].name, "Bad\u{fffd}\u{fffd}");
    assert_eq!(batch.rows[1].price, "90");
    assert_eq!(batch.rows[2].url, "https://www.alik.cz/s/darky/3");
}

#[test]
fn valid_feed_has_no_lossy_cells() {
    let batch = read_feed(SAMPLE_FEED.as_bytes()).unwrap();
    assert_eq!(batch.lossy_cells, 0);
}

#[tokio::test]
async fn fetch_downloads_and_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/darky/csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_FEED))
        .mount(&server)
        .await;

    let client = FeedClient::new(format!("{}/s/darky/csv", server.uri()));
    let batch = client.fetch().await.unwrap();
    assert_eq!(batch.len(), 3);
}

#[tokio::test]
async fn fetch_reports_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = FeedClient::new(format!("{}/s/darky/csv", server.uri()));
    match client.fetch().await {
        Err(TrackerError::HttpStatus(status)) => assert_eq!(status.as_u16(), 503),
        other => panic!("expected HTTP status error, got {:?}", other),
    }
}
