//! Durable catalogue snapshots
//!
//! The primary snapshot is a SQLite file rewritten in full, inside one
//! transaction, after every cycle that changed something. A JSON document in
//! the wire schema can seed an empty store.
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).

use crate::catalogue::Catalogue;
use crate::count::Quantity;
use crate::error::Result;
use crate::history::{StateSnapshot, TrackedItem};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const KIND_NUMBER: &str = "number";
const KIND_UNKNOWN: &str = "unknown";
const KIND_UNLIMITED: &str = "unlimited";

/// Initialize the snapshot schema
///
/// Creates tables if they don't exist:
/// - `items`: one row per tracked item, `position` is first-seen order
/// - `snapshots`: recorded states, `seq` is the position within the history
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS items (
            position INTEGER PRIMARY KEY,
            url TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- count is NULL unless count_kind = 'number'
        CREATE TABLE IF NOT EXISTS snapshots (
            item_position INTEGER NOT NULL,
            seq INTEGER NOT NULL,
            price INTEGER NOT NULL,
            count_kind TEXT NOT NULL,
            count REAL,
            observed_at INTEGER NOT NULL,
            PRIMARY KEY (item_position, seq),
            FOREIGN KEY (item_position) REFERENCES items(position)
        );
        ",
    )?;

    log::debug!("Snapshot schema initialized");
    Ok(())
}

fn quantity_columns(quantity: Quantity) -> (&'static str, Option<f64>) {
    match quantity {
        Quantity::Number(n) => (KIND_NUMBER, Some(n)),
        Quantity::Unknown => (KIND_UNKNOWN, None),
        Quantity::Unlimited => (KIND_UNLIMITED, None),
    }
}

fn quantity_from_columns(kind: &str, count: Option<f64>) -> Quantity {
    match kind {
        KIND_UNKNOWN => Quantity::Unknown,
        KIND_UNLIMITED => Quantity::Unlimited,
        KIND_NUMBER => Quantity::Number(count.unwrap_or(0.0)),
        other => {
            log::warn!("Unknown count kind '{}' in snapshot, using number", other);
            Quantity::Number(count.unwrap_or(0.0))
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// SQLite file holding the last saved catalogue
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (or create) the snapshot database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        log::info!("Opened snapshot database: {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Replace the stored snapshot with `catalogue`, returning the number of states written
    pub fn save(&mut self, catalogue: &Catalogue) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let count = save_tx(&tx, catalogue)?;
        tx.commit()?;
        log::info!(
            "Saved snapshot: {} gifts, {} states",
            catalogue.len(),
            count
        );
        Ok(count)
    }

    /// Read the stored snapshot in first-seen order
    pub fn load(&self) -> Result<Catalogue> {
        let mut stmt = self.conn.prepare(
            "SELECT position, url, name, category, created_at
             FROM items
             ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let position: i64 = row.get(0)?;
            let url: String = row.get(1)?;
            let name: String = row.get(2)?;
            let category: String = row.get(3)?;
            let created_at: i64 = row.get(4)?;
            Ok((position, TrackedItem::new(name, category, url, timestamp(created_at))))
        })?;

        let mut items = Vec::new();
        let mut slots = HashMap::new();
        for row in rows {
            let (position, item) = row?;
            slots.insert(position, items.len());
            items.push((item, Vec::new()));
        }

        let mut stmt = self.conn.prepare(
            "SELECT item_position, price, count_kind, count, observed_at
             FROM snapshots
             ORDER BY item_position ASC, seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let position: i64 = row.get(0)?;
            let price: i64 = row.get(1)?;
            let kind: String = row.get(2)?;
            let count: Option<f64> = row.get(3)?;
            let observed_at: i64 = row.get(4)?;
            Ok((
                position,
                StateSnapshot::new(
                    price,
                    quantity_from_columns(&kind, count),
                    timestamp(observed_at),
                ),
            ))
        })?;

        for row in rows {
            let (position, snapshot) = row?;
            match slots.get(&position) {
                Some(&slot) => items[slot].1.push(snapshot),
                None => log::warn!("Dropping state of unknown item position {}", position),
            }
        }

        let items = items
            .into_iter()
            .map(|(item, history)| item.with_history(history))
            .collect();
        Ok(Catalogue::from_items(items))
    }
}

fn save_tx(tx: &Transaction<'_>, catalogue: &Catalogue) -> Result<usize> {
    tx.execute("DELETE FROM snapshots", [])?;
    tx.execute("DELETE FROM items", [])?;

    let mut item_stmt = tx.prepare_cached(
        "INSERT INTO items (position, url, name, category, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut state_stmt = tx.prepare_cached(
        "INSERT INTO snapshots (item_position, seq, price, count_kind, count, observed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut count = 0;
    for (position, item) in catalogue.iter().enumerate() {
        let position = position as i64;
        item_stmt.execute(params![
            position,
            &item.identifier,
            &item.name,
            &item.category,
            item.created_at.timestamp(),
        ])?;

        for (seq, state) in item.history().iter().enumerate() {
            let (kind, value) = quantity_columns(state.quantity);
            state_stmt.execute(params![
                position,
                seq as i64,
                state.price,
                kind,
                value,
                state.observed_at.timestamp(),
            ])?;
            count += 1;
        }
    }

    Ok(count)
}

/// Read a catalogue from a JSON document in the wire schema
pub fn load_json(path: &Path) -> Result<Catalogue> {
    let file = File::open(path)?;
    let catalogue: Catalogue = serde_json::from_reader(BufReader::new(file))?;
    Ok(catalogue)
}

/// Where the startup catalogue came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    Snapshot,
    Bootstrap,
    /// Nothing usable; the caller should refresh immediately
    Empty,
}

/// Restore the catalogue: SQLite snapshot, then the JSON bootstrap document, then empty
///
/// Failures are logged and fall through to the next source. `store` is
/// `None` when the snapshot database could not be opened.
pub fn restore(
    store: Option<&SnapshotStore>,
    bootstrap: Option<&Path>,
) -> (Catalogue, RestoreSource) {
    if let Some(store) = store {
        match store.load() {
            Ok(catalogue) if !catalogue.is_empty() => {
                log::info!("Loaded {} gifts from snapshot", catalogue.len());
                return (catalogue, RestoreSource::Snapshot);
            }
            Ok(_) => log::info!("Snapshot is empty"),
            Err(e) => log::error!("Failed to load snapshot: {}", e),
        }
    }

    if let Some(path) = bootstrap {
        match load_json(path) {
            Ok(catalogue) if !catalogue.is_empty() => {
                log::info!(
                    "Loaded {} gifts from bootstrap document {}",
                    catalogue.len(),
                    path.display()
                );
                return (catalogue, RestoreSource::Bootstrap);
            }
            Ok(_) => log::info!("Bootstrap document {} is empty", path.display()),
            Err(e) => log::error!(
                "Failed to load bootstrap document {}: {}",
                path.display(),
                e
            ),
        }
    }

    log::info!("Nothing loaded, starting with an empty catalogue");
    (Catalogue::new(), RestoreSource::Empty)
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
