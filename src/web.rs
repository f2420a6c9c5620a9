//! Web server for the gift tracker
//!
//! Read-only JSON endpoints over the shared catalogue. `/gifts.json` is the
//! full wire dump consumed by external viewers; `/api/*` serve derived views.

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::catalogue::{Catalogue, SharedCatalogue};
use crate::filters::{added_since, discounted, stock_changed, summarize, ItemSummary};
use crate::history::TrackedItem;
use crate::sync::{CycleReport, LastCycle};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 4576;

/// Shared application state (catalogue handle + last refresh report)
#[derive(Clone)]
struct AppState {
    catalogue: SharedCatalogue,
    last_cycle: LastCycle,
}

/// Window query parameters
#[derive(Deserialize)]
struct WindowParams {
    #[serde(default = "default_hours")]
    hours: u32,
}

fn default_hours() -> u32 {
    24
}

#[derive(Deserialize)]
struct ItemParams {
    url: String,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    gifts: usize,
    states: usize,
    last_cycle: Option<CycleReport>,
}

/// GET /gifts.json - whole catalogue in the wire schema
async fn gifts_handler(State(state): State<AppState>) -> Response {
    let body = {
        let catalogue = state.catalogue.read();
        serde_json::to_vec(&*catalogue)
    };

    match body {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            log::error!("Failed to serialize catalogue: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn window_view<F>(
    state: &AppState,
    params: &WindowParams,
    view: F,
) -> Json<ApiResponse<Vec<ItemSummary>>>
where
    F: for<'a> Fn(&'a Catalogue, chrono::DateTime<Utc>, Duration) -> Vec<&'a TrackedItem>,
{
    let catalogue = state.catalogue.read();
    let items = view(&*catalogue, Utc::now(), Duration::hours(i64::from(params.hours)));
    ApiResponse::ok(summarize(&items))
}

/// GET /api/added?hours={hours}
async fn added_handler(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Json<ApiResponse<Vec<ItemSummary>>> {
    window_view(&state, &params, added_since)
}

/// GET /api/discounted?hours={hours}
async fn discounted_handler(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Json<ApiResponse<Vec<ItemSummary>>> {
    window_view(&state, &params, discounted)
}

/// GET /api/restocked?hours={hours}
async fn restocked_handler(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Json<ApiResponse<Vec<ItemSummary>>> {
    window_view(&state, &params, stock_changed)
}

/// GET /api/item?url={identifier}
async fn item_handler(
    State(state): State<AppState>,
    Query(params): Query<ItemParams>,
) -> Result<Json<ApiResponse<ItemSummary>>, StatusCode> {
    let catalogue = state.catalogue.read();
    match catalogue.find_by_identifier(&params.url) {
        Some(item) => Ok(ApiResponse::ok(ItemSummary::from(item))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/status
async fn status_handler(State(state): State<AppState>) -> Json<ApiResponse<Status>> {
    let (gifts, states) = {
        let catalogue = state.catalogue.read();
        (catalogue.len(), catalogue.snapshot_count())
    };
    let last_cycle = state
        .last_cycle
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();

    ApiResponse::ok(Status {
        gifts,
        states,
        last_cycle,
    })
}

/// Build the web server router
pub fn create_router(catalogue: SharedCatalogue, last_cycle: LastCycle) -> Router {
    let state = AppState {
        catalogue,
        last_cycle,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/gifts.json", get(gifts_handler))
        .route("/api/added", get(added_handler))
        .route("/api/discounted", get(discounted_handler))
        .route("/api/restocked", get(restocked_handler))
        .route("/api/item", get(item_handler))
        .route("/api/status", get(status_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the web server (async), stopping on Ctrl-C
///
/// Binds to 0.0.0.0 (all interfaces) to work with Docker port mapping.
pub async fn serve(
    catalogue: SharedCatalogue,
    last_cycle: LastCycle,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(catalogue, last_cycle);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;
