//! Catalogue of tracked items
//!
//! Items keep the order in which they were first seen. Lookups go through a
//! hash index from identifier to position; the first item inserted under an
//! identifier wins.

use crate::history::TrackedItem;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ordered collection of tracked items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalogue {
    items: Vec<TrackedItem>,
    index: HashMap<String, usize>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalogue from items in first-seen order
    pub fn from_items(items: Vec<TrackedItem>) -> Self {
        let mut index = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            index.entry(item.identifier.clone()).or_insert(position);
        }
        Self { items, index }
    }

    pub fn find_by_identifier(&self, identifier: &str) -> Option<&TrackedItem> {
        self.index.get(identifier).map(|&position| &self.items[position])
    }

    pub fn find_by_identifier_mut(&mut self, identifier: &str) -> Option<&mut TrackedItem> {
        match self.index.get(identifier) {
            Some(&position) => self.items.get_mut(position),
            None => None,
        }
    }

    /// Append an item, returning a handle to it
    ///
    /// No uniqueness check: a duplicate identifier is stored but stays
    /// shadowed by the earlier item for lookups.
    pub fn insert(&mut self, item: TrackedItem) -> &mut TrackedItem {
        let position = self.items.len();
        self.index.entry(item.identifier.clone()).or_insert(position);
        self.items.push(item);
        &mut self.items[position]
    }

    pub fn items(&self) -> &[TrackedItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of recorded states across all items
    pub fn snapshot_count(&self) -> usize {
        self.items.iter().map(|item| item.history().len()).sum()
    }
}

impl Serialize for Catalogue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Catalogue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<TrackedItem>::deserialize(deserializer).map(Catalogue::from_items)
    }
}

/// Catalogue shared between the refresh loop (sole writer) and request handlers
///
/// A whole batch is ingested under one write guard, so readers never see a
/// half-applied refresh.
#[derive(Debug, Clone, Default)]
pub struct SharedCatalogue {
    inner: Arc<RwLock<Catalogue>>,
}

impl SharedCatalogue {
    pub fn new(catalogue: Catalogue) -> Self {
        Self {
            inner: Arc::new(RwLock::new(catalogue)),
        }
    }

    /// Read access; a writer that panicked leaves the last complete state readable
    pub fn read(&self) -> RwLockReadGuard<'_, Catalogue> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Catalogue> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
