//! Per-table cache state.
//!
//! A [`TableCache`] owns the family list, the fetched rows per family and
//! the table's [`EncodingViewIndex`]. An absent row means "not fetched
//! yet"; a fetched row with zero columns is cached like any other.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::Row;
use crate::{Error, Result};

use super::view_index::EncodingViewIndex;

/// Cached state of one table.
#[derive(Debug)]
pub struct TableCache {
    /// Table name.
    name: String,
    /// Family names in the order the store listed them.
    families: RwLock<Vec<String>>,
    /// family -> row key -> row
    rows: RwLock<HashMap<String, HashMap<Bytes, Arc<Row>>>>,
    /// Row keys and their projections.
    index: RwLock<EncodingViewIndex>,
}

impl TableCache {
    /// Create an empty table cache.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            families: RwLock::new(Vec::new()),
            rows: RwLock::new(HashMap::new()),
            index: RwLock::new(EncodingViewIndex::new()),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered family names.
    pub fn families(&self) -> Vec<String> {
        self.families.read().clone()
    }

    /// Check if a family is registered.
    pub fn has_family(&self, family: &str) -> bool {
        self.rows.read().contains_key(family)
    }

    /// Record the families listed by the store and return the registered
    /// set.
    ///
    /// If another caller registered families first, its list is kept.
    pub(crate) fn register_families(&self, names: Vec<String>) -> Vec<String> {
        let mut families = self.families.write();
        if !families.is_empty() {
            return families.clone();
        }

        let mut rows = self.rows.write();
        for name in names {
            if !families.contains(&name) {
                rows.entry(name.clone()).or_default();
                families.push(name);
            }
        }
        families.clone()
    }

    /// Look up a fetched row.
    pub fn cached_row(&self, family: &str, key: &[u8]) -> Result<Option<Arc<Row>>> {
        let rows = self.rows.read();
        let family_rows = rows
            .get(family)
            .ok_or_else(|| Error::unknown_family(&self.name, family))?;
        Ok(family_rows.get(key).cloned())
    }

    /// Store a fetched row and return the cached instance.
    ///
    /// When two fetches of the same key race, the first stored row wins;
    /// both carry the same content.
    pub(crate) fn insert_row(&self, row: Row) -> Result<Arc<Row>> {
        let mut rows = self.rows.write();
        let family_rows = rows
            .get_mut(row.family())
            .ok_or_else(|| Error::unknown_family(&self.name, row.family()))?;
        let cached = family_rows
            .entry(row.key().clone())
            .or_insert_with(|| Arc::new(row));
        Ok(Arc::clone(cached))
    }

    /// Drop a fetched row so the next lookup goes to the store.
    pub fn evict_row(&self, family: &str, key: &[u8]) -> Result<bool> {
        let mut rows = self.rows.write();
        let family_rows = rows
            .get_mut(family)
            .ok_or_else(|| Error::unknown_family(&self.name, family))?;
        Ok(family_rows.remove(key).is_some())
    }

    /// Number of fetched rows across all families.
    pub fn row_count(&self) -> usize {
        self.rows.read().values().map(HashMap::len).sum()
    }

    /// Read access to the row-name index.
    pub fn index(&self) -> RwLockReadGuard<'_, EncodingViewIndex> {
        self.index.read()
    }

    pub(crate) fn index_mut(&self) -> RwLockWriteGuard<'_, EncodingViewIndex> {
        self.index.write()
    }
}
