//! Gift Tracker - price and stock history of a gift catalogue
//!
//! Periodically ingests the catalogue's CSV export, keeps an append-only
//! history of price and stock changes per gift, persists it to SQLite and
//! serves "added / discounted / restocked" views over HTTP.

pub mod catalogue;
pub mod count;
pub mod error;
pub mod feed;
pub mod filters;
pub mod history;
pub mod ingest;
pub mod persist;
pub mod sync;
pub mod web;

pub use catalogue::{Catalogue, SharedCatalogue};
pub use count::Quantity;
pub use error::{Result, TrackerError};
pub use feed::{FeedBatch, FeedClient, FeedRow};
pub use history::{Previous, StateSnapshot, TrackedItem};
pub use ingest::{ingest, IngestReport};
pub use persist::{restore, RestoreSource, SnapshotStore};
pub use sync::{CycleReport, Refresher};
