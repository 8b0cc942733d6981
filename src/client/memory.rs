//! In-memory wide-column store.
//!
//! Implements [`RemoteStoreClient`] over process-local maps. Every call is
//! counted, availability can be switched off to simulate an unreachable
//! cluster, and scans can be slowed down or made to fail part-way.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use super::{ClientError, ClientResult, RemoteStoreClient, RowKeyScan};
use crate::types::Cell;

/// family -> qualifier -> value
type FamilyCells = BTreeMap<String, BTreeMap<String, Bytes>>;

#[derive(Debug, Default)]
struct MemoryTable {
    families: Vec<String>,
    rows: BTreeMap<Bytes, FamilyCells>,
}

/// Snapshot of how many times each client operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_tables: u64,
    pub list_families: u64,
    pub get_row: u64,
    pub scan_row_keys: u64,
    pub put_cell: u64,
    pub reconnect: u64,
}

impl CallCounts {
    /// Calls that read from the store.
    pub fn reads(&self) -> u64 {
        self.list_tables + self.list_families + self.get_row + self.scan_row_keys
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    list_tables: AtomicU64,
    list_families: AtomicU64,
    get_row: AtomicU64,
    scan_row_keys: AtomicU64,
    put_cell: AtomicU64,
    reconnect: AtomicU64,
}

/// Scan behaviour knobs.
#[derive(Debug, Clone, Copy, Default)]
struct ScanBehavior {
    delay: Option<Duration>,
    fail_after: Option<usize>,
}

/// An in-memory store usable wherever a [`RemoteStoreClient`] is expected.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, MemoryTable>>,
    calls: CallCounters,
    available: AtomicBool,
    scan: Mutex<ScanBehavior>,
    config: RwLock<BTreeMap<String, String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            calls: CallCounters::default(),
            available: AtomicBool::new(true),
            scan: Mutex::new(ScanBehavior::default()),
            config: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a table with the given families. Existing tables are replaced.
    pub fn create_table(&self, name: &str, families: &[&str]) {
        let table = MemoryTable {
            families: families.iter().map(|f| f.to_string()).collect(),
            rows: BTreeMap::new(),
        };
        self.tables.write().insert(name.to_string(), table);
    }

    /// Seed a cell without counting it as a client call.
    pub fn insert(
        &self,
        table: &str,
        family: &str,
        row_key: &[u8],
        qualifier: &str,
        value: &[u8],
    ) -> ClientResult<()> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| ClientError::new(format!("table not found: {}", table)))?;
        if !t.families.iter().any(|f| f == family) {
            return Err(ClientError::new(format!(
                "family {} not found in table {}",
                family, table
            )));
        }
        t.rows
            .entry(Bytes::copy_from_slice(row_key))
            .or_default()
            .entry(family.to_string())
            .or_default()
            .insert(qualifier.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }

    /// Read a cell directly, bypassing counters.
    pub fn cell(&self, table: &str, family: &str, row_key: &[u8], qualifier: &str) -> Option<Bytes> {
        self.tables
            .read()
            .get(table)?
            .rows
            .get(row_key)?
            .get(family)?
            .get(qualifier)
            .cloned()
    }

    /// Make every subsequent call succeed or fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Sleep this long before yielding each scanned key.
    pub fn set_scan_delay(&self, delay: Option<Duration>) {
        self.scan.lock().delay = delay;
    }

    /// Fail scans after yielding `n` keys.
    pub fn set_scan_failure_after(&self, n: Option<usize>) {
        self.scan.lock().fail_after = n;
    }

    /// Counts of calls made so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list_tables: self.calls.list_tables.load(Ordering::Relaxed),
            list_families: self.calls.list_families.load(Ordering::Relaxed),
            get_row: self.calls.get_row.load(Ordering::Relaxed),
            scan_row_keys: self.calls.scan_row_keys.load(Ordering::Relaxed),
            put_cell: self.calls.put_cell.load(Ordering::Relaxed),
            reconnect: self.calls.reconnect.load(Ordering::Relaxed),
        }
    }

    /// Settings passed to the most recent `reconnect`.
    pub fn config(&self) -> BTreeMap<String, String> {
        self.config.read().clone()
    }

    fn enter(&self, counter: &AtomicU64) -> ClientResult<()> {
        counter.fetch_add(1, Ordering::Relaxed);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::new("cluster unreachable"))
        }
    }
}

impl RemoteStoreClient for MemoryStore {
    fn list_tables(&self) -> ClientResult<Vec<String>> {
        self.enter(&self.calls.list_tables)?;
        Ok(self.tables.read().keys().cloned().collect())
    }

    fn list_families(&self, table: &str) -> ClientResult<Vec<String>> {
        self.enter(&self.calls.list_families)?;
        self.tables
            .read()
            .get(table)
            .map(|t| t.families.clone())
            .ok_or_else(|| ClientError::new(format!("table not found: {}", table)))
    }

    fn get_row_under_family(
        &self,
        table: &str,
        row_key: &[u8],
        family: &str,
    ) -> ClientResult<Vec<Cell>> {
        self.enter(&self.calls.get_row)?;
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| ClientError::new(format!("table not found: {}", table)))?;
        let cells = t
            .rows
            .get(row_key)
            .and_then(|families| families.get(family))
            .map(|qualifiers| {
                qualifiers
                    .iter()
                    .map(|(q, v)| Cell::new(q.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(cells)
    }

    fn scan_row_keys(&self, table: &str) -> ClientResult<RowKeyScan> {
        self.enter(&self.calls.scan_row_keys)?;
        let keys: Vec<Bytes> = self
            .tables
            .read()
            .get(table)
            .ok_or_else(|| ClientError::new(format!("table not found: {}", table)))?
            .rows
            .keys()
            .cloned()
            .collect();
        let behavior = *self.scan.lock();

        Ok(Box::new(MemoryScan {
            keys: keys.into_iter(),
            yielded: 0,
            behavior,
            failed: false,
        }))
    }

    fn put_cell(
        &self,
        table: &str,
        family: &str,
        row_key: &[u8],
        qualifier: &str,
        value: &[u8],
    ) -> ClientResult<()> {
        self.enter(&self.calls.put_cell)?;
        self.insert(table, family, row_key, qualifier, value)
    }

    fn reconnect(&self, settings: &BTreeMap<String, String>) -> ClientResult<()> {
        self.enter(&self.calls.reconnect)?;
        *self.config.write() = settings.clone();
        Ok(())
    }
}

struct MemoryScan {
    keys: std::vec::IntoIter<Bytes>,
    yielded: usize,
    behavior: ScanBehavior,
    failed: bool,
}

impl Iterator for MemoryScan {
    type Item = ClientResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.behavior.fail_after == Some(self.yielded) {
            self.failed = true;
            return Some(Err(ClientError::new("scanner lease expired")));
        }
        let key = self.keys.next()?;
        if let Some(delay) = self.behavior.delay {
            thread::sleep(delay);
        }
        self.yielded += 1;
        Some(Ok(key))
    }
}
