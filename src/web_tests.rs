//! Router tests for the JSON endpoints

use super::*;
use crate::count::Quantity::{Number, Unknown};
use crate::history::StateSnapshot;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_catalogue() -> SharedCatalogue {
    let now = Utc::now();
    let mut catalogue = Catalogue::new();

    catalogue
        .insert(TrackedItem::new(
            "Plyšový medvěd",
            "hračky",
            "https://www.alik.cz/s/darky/1",
            now - Duration::days(30),
        ))
        .record(StateSnapshot::new(120, Number(5.0), now - Duration::hours(3)));
    catalogue
        .find_by_identifier_mut("https://www.alik.cz/s/darky/1")
        .unwrap()
        .record(StateSnapshot::new(100, Unknown, now - Duration::hours(1)));

    catalogue
        .insert(TrackedItem::new(
            "Dort",
            "jídlo",
            "https://www.alik.cz/s/darky/2",
            now - Duration::hours(2),
        ))
        .record(StateSnapshot::new(80, Number(1.0), now - Duration::hours(2)));

    SharedCatalogue::new(catalogue)
}

fn test_router() -> Router {
    create_router(test_catalogue(), LastCycle::default())
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn urls(value: &Value) -> Vec<&str> {
    value["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["url"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn gifts_json_uses_wire_schema() {
    let (status, value) = get_json(test_router(), "/gifts.json").await;
    assert_eq!(status, StatusCode::OK);

    let gifts = value.as_array().unwrap();
    assert_eq!(gifts.len(), 2);
    assert_eq!(gifts[0]["url"], json!("https://www.alik.cz/s/darky/1"));
    assert_eq!(gifts[0]["history"][0]["count"], json!(5));
    assert_eq!(gifts[0]["history"][1]["count"], json!("?"));
    assert!(gifts[0]["createdAt"].is_i64());
}

#[tokio::test]
async fn added_lists_recent_items() {
    let (status, value) = get_json(test_router(), "/api/added?hours=24").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], json!(true));
    assert_eq!(urls(&value), vec!["https://www.alik.cz/s/darky/2"]);
}

#[tokio::test]
async fn added_defaults_to_a_day() {
    let (_, value) = get_json(test_router(), "/api/added").await;
    assert_eq!(urls(&value).len(), 1);
}

#[tokio::test]
async fn discounted_lists_price_drops() {
    let (_, value) = get_json(test_router(), "/api/discounted?hours=24").await;
    assert_eq!(urls(&value), vec!["https://www.alik.cz/s/darky/1"]);
    assert_eq!(value["data"][0]["previousPrice"], json!(120));
    assert_eq!(value["data"][0]["currentPrice"], json!(100));
}

#[tokio::test]
async fn restocked_lists_stock_changes() {
    let (_, value) = get_json(test_router(), "/api/restocked?hours=24").await;
    assert_eq!(urls(&value), vec!["https://www.alik.cz/s/darky/1"]);
    assert_eq!(value["data"][0]["currentStock"], json!("?"));
}

#[tokio::test]
async fn narrow_window_excludes_older_changes() {
    let (_, value) = get_json(test_router(), "/api/discounted?hours=2").await;
    assert!(urls(&value).is_empty());
}

#[tokio::test]
async fn item_lookup_by_url() {
    let (status, value) = get_json(
        test_router(),
        "/api/item?url=https%3A%2F%2Fwww.alik.cz%2Fs%2Fdarky%2F2",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["name"], json!("Dort"));
    assert_eq!(value["data"]["previousPrice"], json!("-"));
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let (status, _) = get_json(test_router(), "/api/item?url=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reports_counts() {
    let (status, value) = get_json(test_router(), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["gifts"], json!(2));
    assert_eq!(value["data"]["states"], json!(3));
    assert_eq!(value["data"]["lastCycle"], json!(null));
}

#[tokio::test]
async fn responses_allow_any_origin() {
    let response = test_router()
        .oneshot(
            Request::builder()
                .uri("/gifts.json")
                .header("Origin", "https://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[test]
fn api_response_error_serialization() {
    let response: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some("Test error".to_string()),
    };

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":false"));
    assert!(json.contains("\"error\":\"Test error\""));
    assert!(!json.contains("\"data\""));
}
