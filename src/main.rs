//! Gift Tracker - price and stock history of a gift catalogue
//!
//! Restores the last snapshot, refreshes from the CSV feed on round interval
//! boundaries and serves the JSON API.

use clap::Parser;
use gift_tracker::feed::DEFAULT_FEED_URL;
use gift_tracker::sync::{until_next_round, DEFAULT_INTERVAL_MINUTES};
use gift_tracker::web::DEFAULT_PORT;
use gift_tracker::{restore, FeedClient, Refresher, RestoreSource, SharedCatalogue, SnapshotStore};
use std::path::PathBuf;
use std::time::Duration as StdDuration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Gift catalogue tracker - records price and stock changes and serves them over HTTP
#[derive(Parser, Debug)]
#[command(name = "gift_tracker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite snapshot file
    #[arg(short, long, env = "GIFT_TRACKER_DATABASE", default_value_t = default_db_path())]
    database: String,

    /// JSON document (wire schema) used to seed an empty snapshot
    #[arg(long, env = "GIFT_TRACKER_BOOTSTRAP")]
    bootstrap_json: Option<PathBuf>,

    /// CSV export of the gift catalogue
    #[arg(long, env = "GIFT_TRACKER_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Refresh interval in minutes; refreshes run on multiples of it
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MINUTES as u32,
          value_parser = clap::value_parser!(u32).range(1..))]
    interval_minutes: u32,

    /// HTTP port of the JSON API
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Do not start the web server
    #[arg(long, default_value_t = false)]
    no_web: bool,

    /// Run one refresh and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

/// Returns the default snapshot path: ~/.local/share/gift_tracker/gifts.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gift_tracker")
        .join("gifts.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);

    log::info!("Starting gift_tracker...");
    log::info!("Snapshot path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create snapshot directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    // A broken snapshot file must not keep the service down
    let store = match SnapshotStore::open(&db_path) {
        Ok(store) => Some(store),
        Err(e) => {
            log::error!("Failed to open snapshot database, running without persistence: {}", e);
            None
        }
    };

    let (catalogue, source) = restore(store.as_ref(), args.bootstrap_json.as_deref());
    let catalogue = SharedCatalogue::new(catalogue);

    let interval = chrono::Duration::minutes(i64::from(args.interval_minutes));
    let mut refresher = Refresher::new(
        FeedClient::new(&args.feed_url),
        store,
        catalogue.clone(),
        interval,
    );

    match source {
        RestoreSource::Bootstrap => {
            refresher.persist();
        }
        RestoreSource::Empty => {
            log::info!("Running initial refresh");
            run_sync(&mut refresher).await;
        }
        RestoreSource::Snapshot => {}
    }

    if args.once {
        if source != RestoreSource::Empty {
            run_sync(&mut refresher).await;
        }
        return;
    }

    // Spawn web server unless --no-web specified
    if !args.no_web {
        let web_catalogue = catalogue.clone();
        let last_cycle = refresher.last_cycle();
        let port = args.port;
        tokio::spawn(async move {
            if let Err(e) = gift_tracker::web::serve(web_catalogue, last_cycle, port).await {
                log::error!("Web server error: {}", e);
                std::process::exit(1);
            }
        });
    }

    log::info!(
        "Running in daemon mode, refreshing every {} minute(s)",
        args.interval_minutes
    );
    tokio::select! {
        _ = run_daemon(&mut refresher) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutting down");
        }
    }
}

/// Run the refresh loop - one cycle on every interval boundary
async fn run_daemon(refresher: &mut Refresher) {
    let period = refresher
        .interval()
        .to_std()
        .unwrap_or(StdDuration::from_secs(60 * DEFAULT_INTERVAL_MINUTES as u64));
    let wait = until_next_round(chrono::Utc::now(), refresher.interval())
        .to_std()
        .unwrap_or(StdDuration::ZERO);

    let mut ticker = interval_at(Instant::now() + wait, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        log::debug!("Scheduled refresh triggered");
        run_sync(refresher).await;
    }
}

/// Run a single refresh; failures are logged and wait for the next tick
async fn run_sync(refresher: &mut Refresher) {
    match refresher.run_cycle(chrono::Utc::now()).await {
        Ok(report) => {
            if report.short_rows > 0 {
                log::warn!("Skipped {} short feed rows", report.short_rows);
            }
            if report.ingest.changed && !report.saved {
                log::warn!("Changes were not saved, durability lost for this cycle");
            }
        }
        Err(e) => {
            log::error!("Refresh failed: {}", e);
        }
    }
}
