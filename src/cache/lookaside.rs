//! LookasideCache - the cache between a browsing session and the remote
//! store.
//!
//! Every lookup checks the cache first and, on a miss, issues exactly one
//! remote call whose result is stored before it is returned.
//!
//! # Invalidation
//!
//! All cached state lives in one generation object behind an [`ArcSwap`].
//! Changing a setting swaps in a fresh, empty state. Operations already
//! running keep the snapshot they loaded and finish against it; everything
//! issued afterwards sees the new state.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::client::{ClientResult, RemoteStoreClient};
use crate::codec::Encoding;
use crate::options::Options;
use crate::settings::SettingsStore;
use crate::types::{Row, RowView};
use crate::{Error, Result};

use super::population::{PopulationHandle, PopulationSlot, RowKeyStream};
use super::stats::CacheStats;
use super::table_cache::TableCache;
use super::view_index::PopulationState;

/// Table registry for one generation of the cache.
#[derive(Debug, Default)]
struct Catalog {
    /// Table names in enumeration order.
    names: Vec<String>,
    tables: HashMap<String, Arc<TableCache>>,
}

/// Everything cached for one store identity.
#[derive(Debug)]
struct CacheState {
    generation: u64,
    catalog: RwLock<Catalog>,
}

impl CacheState {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            catalog: RwLock::new(Catalog::default()),
        }
    }

    fn table(&self, table: &str) -> Result<Arc<TableCache>> {
        self.catalog
            .read()
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }
}

/// Lookaside cache over a [`RemoteStoreClient`].
///
/// Thread-safe; share it across threads with `Arc`.
pub struct LookasideCache {
    client: Arc<dyn RemoteStoreClient>,
    settings: Arc<dyn SettingsStore>,
    options: Arc<Options>,
    /// Current cache generation (atomically swappable).
    state: ArcSwap<CacheState>,
    population: PopulationSlot,
    stats: Arc<CacheStats>,
}

impl LookasideCache {
    /// Create a cache with default options.
    pub fn new(
        client: Arc<dyn RemoteStoreClient>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self> {
        Self::with_options(client, settings, Options::default())
    }

    /// Create a cache with custom options.
    ///
    /// The stored settings are handed to the client once. A client that
    /// cannot connect yet is not an error here; the first remote call will
    /// report it.
    pub fn with_options(
        client: Arc<dyn RemoteStoreClient>,
        settings: Arc<dyn SettingsStore>,
        options: Options,
    ) -> Result<Self> {
        options.validate()?;

        if let Err(e) = client.reconnect(&settings.snapshot()) {
            warn!(error = %e, "initial reconnect failed");
        }

        Ok(Self {
            client,
            settings,
            options: Arc::new(options),
            state: ArcSwap::from_pointee(CacheState::new(0)),
            population: PopulationSlot::new(),
            stats: Arc::new(CacheStats::new()),
        })
    }

    /// Table names in enumeration order.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let state = self.state.load_full();
        {
            let catalog = state.catalog.read();
            if !catalog.names.is_empty() {
                self.stats.hit();
                return Ok(catalog.names.clone());
            }
        }

        self.stats.miss();
        let names = self.remote("list tables", "*", || self.client.list_tables())?;

        let mut catalog = state.catalog.write();
        if catalog.names.is_empty() {
            for name in names {
                if !catalog.tables.contains_key(&name) {
                    catalog
                        .tables
                        .insert(name.clone(), Arc::new(TableCache::new(name.as_str())));
                    catalog.names.push(name);
                }
            }
            debug!(
                generation = state.generation,
                tables = catalog.names.len(),
                "table list cached"
            );
        }
        Ok(catalog.names.clone())
    }

    /// Column families of a table registered by [`list_tables`].
    ///
    /// [`list_tables`]: LookasideCache::list_tables
    pub fn list_families(&self, table: &str) -> Result<Vec<String>> {
        let cached = self.state.load().table(table)?;
        let families = cached.families();
        if !families.is_empty() {
            self.stats.hit();
            return Ok(families);
        }

        self.stats.miss();
        let names = self.remote("list families", table, || self.client.list_families(table))?;
        let families = cached.register_families(names);
        debug!(table, families = families.len(), "families cached");
        Ok(families)
    }

    /// Row data under `family`, with values rendered under `encoding`.
    ///
    /// A row is fetched at most once per cache generation regardless of the
    /// encoding asked for. A fetched row with no columns is final.
    pub fn get_row(
        &self,
        table: &str,
        row_key: &[u8],
        family: &str,
        encoding: Encoding,
    ) -> Result<RowView> {
        let cached = self.state.load().table(table)?;
        if let Some(row) = cached.cached_row(family, row_key)? {
            self.stats.hit();
            trace!(table, family, "row cache hit");
            return Ok(RowView::new(row, encoding));
        }

        self.stats.miss();
        let target = row_target(table, family, row_key);
        let cells = self.remote("get row", &target, || {
            self.client.get_row_under_family(table, row_key, family)
        })?;
        debug!(row = %target, columns = cells.len(), "row fetched");

        let row = cached.insert_row(Row::from_cells(
            family,
            Bytes::copy_from_slice(row_key),
            cells,
        ))?;
        Ok(RowView::new(row, encoding))
    }

    /// [`get_row`] for a row key displayed under `encoding`.
    ///
    /// The name is decoded before anything else, so malformed input never
    /// reaches the store.
    ///
    /// [`get_row`]: LookasideCache::get_row
    pub fn get_row_by_name(
        &self,
        table: &str,
        name: &str,
        family: &str,
        encoding: Encoding,
    ) -> Result<RowView> {
        let row_key = encoding.decode(name)?;
        self.get_row(table, &row_key, family, encoding)
    }

    /// Start enumerating a table's row keys.
    ///
    /// Keys are appended to the table's index under every encoding as the
    /// returned stream is consumed. Starting a population cancels the one
    /// previously active. Calling this twice for the same table appends
    /// the keys twice.
    pub fn populate_row_keys(&self, table: &str) -> Result<RowKeyStream> {
        let cached = self.state.load().table(table)?;
        let token = self.population.activate(table);

        let scan = match self.remote("scan row keys", table, || self.client.scan_row_keys(table)) {
            Ok(scan) => scan,
            Err(e) => {
                self.population.release(&token);
                return Err(e);
            }
        };

        let run = {
            let mut index = cached.index_mut();
            if !index.is_empty() {
                warn!(table, keys = index.len(), "row keys already populated; appending again");
            }
            index.begin()
        };
        info!(table, "row key population started");

        Ok(RowKeyStream::new(
            cached,
            scan,
            token,
            self.population.clone(),
            Arc::clone(&self.stats),
            run,
        ))
    }

    /// Run [`populate_row_keys`] on a background thread.
    ///
    /// [`populate_row_keys`]: LookasideCache::populate_row_keys
    pub fn spawn_population(&self, table: &str) -> Result<PopulationHandle> {
        let stream = self.populate_row_keys(table)?;
        PopulationHandle::spawn(
            stream,
            self.options.population_buffer,
            &self.options.population_thread_name,
        )
    }

    /// Cancel the active population, if any. A population that already
    /// ended is no longer active.
    pub fn cancel_population(&self) {
        if let Some(table) = self.population.cancel() {
            debug!(table = %table, "population cancelled");
        }
    }

    /// Row names projected under `encoding`. Empty until a population has
    /// appended keys; grows while one is running.
    pub fn get_encoded_row_names(&self, table: &str, encoding: Encoding) -> Result<Vec<String>> {
        let cached = self.state.load().table(table)?;
        let names = cached.index().names(encoding).to_vec();
        Ok(names)
    }

    /// Projected row names containing `needle`.
    pub fn search_row_names(
        &self,
        table: &str,
        encoding: Encoding,
        needle: &str,
    ) -> Result<Vec<String>> {
        let cached = self.state.load().table(table)?;
        let names = cached.index().search(encoding, needle);
        Ok(names)
    }

    /// Raw row keys in discovery order.
    pub fn row_keys(&self, table: &str) -> Result<Vec<Bytes>> {
        let cached = self.state.load().table(table)?;
        let keys = cached.index().row_keys().to_vec();
        Ok(keys)
    }

    /// Raw row key at a position of the row-name lists.
    pub fn row_key_at(&self, table: &str, index: usize) -> Result<Option<Bytes>> {
        let cached = self.state.load().table(table)?;
        let key = cached.index().key_at(index).cloned();
        Ok(key)
    }

    /// Population progress of a table.
    pub fn population_state(&self, table: &str) -> Result<PopulationState> {
        let cached = self.state.load().table(table)?;
        let state = cached.index().state();
        Ok(state)
    }

    /// Write one cell through to the store.
    ///
    /// The cached row for `(table, family, row_key)` is left as it was;
    /// call [`evict_row`] to observe the new value.
    ///
    /// [`evict_row`]: LookasideCache::evict_row
    pub fn write_cell(
        &self,
        table: &str,
        family: &str,
        row_key: &[u8],
        column: &str,
        value: &[u8],
    ) -> Result<()> {
        let cached = self.state.load().table(table)?;
        if self.options.check_families_on_write && !cached.has_family(family) {
            return Err(Error::unknown_family(table, family));
        }

        let target = format!("{}:{}", row_target(table, family, row_key), column);
        self.remote("put cell", &target, || {
            self.client.put_cell(table, family, row_key, column, value)
        })?;
        debug!(cell = %target, bytes = value.len(), "cell written");
        Ok(())
    }

    /// Write a cell whose value was edited as text under `encoding`.
    pub fn write_cell_text(
        &self,
        table: &str,
        family: &str,
        row_key: &[u8],
        column: &str,
        text: &str,
        encoding: Encoding,
    ) -> Result<()> {
        let value = encoding.decode(text)?;
        self.write_cell(table, family, row_key, column, &value)
    }

    /// Drop a cached row. Returns whether a row was cached.
    pub fn evict_row(&self, table: &str, family: &str, row_key: &[u8]) -> Result<bool> {
        let cached = self.state.load().table(table)?;
        cached.evict_row(family, row_key)
    }

    /// Change a connection setting and drop the entire cache.
    ///
    /// The cache is dropped even when the settings store fails to persist
    /// the value. The client is then reconnected with the new settings.
    pub fn update_setting(&self, key: &str, value: &str) -> Result<()> {
        let stored = self.settings.set(key, value);
        self.invalidate();
        info!(key, value, "setting changed");
        stored?;

        let settings = self.settings.snapshot();
        self.remote("reconnect", key, || self.client.reconnect(&settings))
    }

    /// Current value of a setting.
    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings.get(key)
    }

    /// Drop every table, family, row and row-name index.
    pub fn invalidate(&self) {
        self.cancel_population();
        let previous = self
            .state
            .rcu(|current| CacheState::new(current.generation + 1));
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        info!(generation = previous.generation + 1, "cache invalidated");
    }

    /// Number of times the cache has been dropped.
    pub fn generation(&self) -> u64 {
        self.state.load().generation
    }

    /// Cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Options in effect.
    pub fn options(&self) -> &Options {
        &self.options
    }

    fn remote<T, F>(&self, operation: &str, target: impl Display, f: F) -> Result<T>
    where
        F: FnOnce() -> ClientResult<T>,
    {
        self.stats.remote_calls.fetch_add(1, Ordering::Relaxed);
        f().map_err(|e| {
            self.stats.remote_failures.fetch_add(1, Ordering::Relaxed);
            warn!(operation, target = %target, error = %e, "remote call failed");
            Error::remote(operation, target.to_string(), e)
        })
    }
}

impl Drop for LookasideCache {
    fn drop(&mut self) {
        self.cancel_population();
    }
}

fn row_target(table: &str, family: &str, row_key: &[u8]) -> String {
    format!("{}/{}/{}", table, family, Encoding::Hex.encode(row_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PopulationEvent;
    use crate::client::memory::MemoryStore;
    use crate::settings::{MemorySettings, ROOT_DIR};

    fn setup() -> (Arc<MemoryStore>, LookasideCache) {
        let store = Arc::new(MemoryStore::new());
        store.create_table("users", &["info", "meta"]);
        store.create_table("orders", &["d"]);
        store.insert("users", "info", b"\x01", "name", b"Ann").unwrap();
        store.insert("users", "info", b"\x02", "name", b"Bob").unwrap();

        let cache = LookasideCache::new(store.clone(), Arc::new(MemorySettings::new())).unwrap();
        (store, cache)
    }

    #[test]
    fn test_list_tables_cached() {
        let (store, cache) = setup();
        let tables = cache.list_tables().unwrap();
        assert_eq!(tables, vec!["orders".to_string(), "users".to_string()]);

        assert_eq!(cache.list_tables().unwrap(), tables);
        assert_eq!(store.calls().list_tables, 1);
    }

    #[test]
    fn test_list_families_requires_table() {
        let (store, cache) = setup();
        assert_eq!(
            cache.list_families("users"),
            Err(Error::UnknownTable("users".into()))
        );
        assert_eq!(store.calls().list_families, 0);

        cache.list_tables().unwrap();
        let families = cache.list_families("users").unwrap();
        assert_eq!(families, vec!["info".to_string(), "meta".to_string()]);
        cache.list_families("users").unwrap();
        assert_eq!(store.calls().list_families, 1);
    }

    #[test]
    fn test_get_row_once_for_all_encodings() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        cache.list_families("users").unwrap();

        let utf8 = cache.get_row("users", b"\x01", "info", Encoding::Utf8).unwrap();
        assert_eq!(utf8.columns(), &["name".to_string()]);
        assert_eq!(utf8.values(), &["Ann".to_string()]);

        let hex = cache.get_row("users", b"\x01", "info", Encoding::Hex).unwrap();
        assert_eq!(hex.values(), &["416E6E".to_string()]);
        assert!(Arc::ptr_eq(utf8.row(), hex.row()));
        assert_eq!(store.calls().get_row, 1);
    }

    #[test]
    fn test_get_row_unknown_family() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();

        // Families not listed yet
        assert!(matches!(
            cache.get_row("users", b"\x01", "info", Encoding::Utf8),
            Err(Error::UnknownFamily { .. })
        ));

        cache.list_families("users").unwrap();
        assert!(matches!(
            cache.get_row("users", b"\x01", "audit", Encoding::Utf8),
            Err(Error::UnknownFamily { .. })
        ));
        assert_eq!(store.calls().get_row, 0);
    }

    #[test]
    fn test_empty_row_is_final() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        cache.list_families("users").unwrap();

        for _ in 0..3 {
            let row = cache.get_row("users", b"\x01", "meta", Encoding::Utf8).unwrap();
            assert!(row.is_empty());
        }
        assert_eq!(store.calls().get_row, 1);
    }

    #[test]
    fn test_get_row_by_malformed_hex_name() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        cache.list_families("users").unwrap();

        let err = cache
            .get_row_by_name("users", "0G", "info", Encoding::Hex)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEncodingInput { .. }));
        assert_eq!(store.calls().get_row, 0);

        let row = cache
            .get_row_by_name("users", "02", "info", Encoding::Hex)
            .unwrap();
        assert_eq!(row.values(), &["426F62".to_string()]);
    }

    #[test]
    fn test_populate_row_keys() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        assert!(cache
            .get_encoded_row_names("users", Encoding::Hex)
            .unwrap()
            .is_empty());
        assert_eq!(cache.population_state("users").unwrap(), PopulationState::Empty);

        let keys: Vec<Bytes> = cache
            .populate_row_keys("users")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(keys.len(), 2);

        assert_eq!(
            cache.get_encoded_row_names("users", Encoding::Hex).unwrap(),
            vec!["01".to_string(), "02".to_string()]
        );
        assert_eq!(cache.population_state("users").unwrap(), PopulationState::Populated);
        assert_eq!(cache.row_key_at("users", 1).unwrap(), Some(Bytes::from_static(b"\x02")));
        assert_eq!(cache.row_keys("users").unwrap().len(), 2);
        assert_eq!(store.calls().scan_row_keys, 1);

        // Switching encodings never goes back to the store.
        for encoding in Encoding::ALL {
            assert_eq!(cache.get_encoded_row_names("users", encoding).unwrap().len(), 2);
        }
        assert_eq!(store.calls().scan_row_keys, 1);
    }

    #[test]
    fn test_population_switch_cancels_previous() {
        let (store, cache) = setup();
        store.insert("orders", "d", b"o1", "total", b"10").unwrap();
        cache.list_tables().unwrap();

        let mut users = cache.populate_row_keys("users").unwrap();
        assert!(users.next().unwrap().is_ok());

        let orders = cache.populate_row_keys("orders").unwrap();
        assert!(users.next().is_none());
        assert_eq!(cache.population_state("users").unwrap(), PopulationState::Stopped);
        assert_eq!(cache.row_keys("users").unwrap().len(), 1);

        assert_eq!(orders.count(), 1);
        assert_eq!(cache.population_state("orders").unwrap(), PopulationState::Populated);
    }

    #[test]
    fn test_finished_population_is_not_active() {
        let (_store, cache) = setup();
        cache.list_tables().unwrap();

        let stream = cache.populate_row_keys("users").unwrap();
        let token = stream.cancel_token();
        assert_eq!(cache.population.active_table().as_deref(), Some("users"));

        assert_eq!(stream.count(), 2);
        assert_eq!(cache.population.active_table(), None);

        // Nothing left to cancel.
        cache.cancel_population();
        assert!(!token.is_cancelled());
        assert_eq!(cache.population_state("users").unwrap(), PopulationState::Populated);

        let handle = cache.spawn_population("users").unwrap();
        assert_eq!(handle.join(), Some(PopulationEvent::Finished { keys: 2 }));
        assert_eq!(cache.population.active_table(), None);
    }

    #[test]
    fn test_failed_scan_start_leaves_index_empty() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        store.set_available(false);

        assert!(matches!(
            cache.populate_row_keys("users"),
            Err(Error::RemoteUnavailable { .. })
        ));
        assert_eq!(cache.population_state("users").unwrap(), PopulationState::Empty);
        assert_eq!(cache.population.active_table(), None);
    }

    #[test]
    fn test_write_cell_leaves_cached_row_stale() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        cache.list_families("users").unwrap();

        let before = cache.get_row("users", b"\x01", "info", Encoding::Utf8).unwrap();
        cache.write_cell("users", "info", b"\x01", "name", b"Anna").unwrap();
        assert_eq!(
            store.cell("users", "info", b"\x01", "name"),
            Some(Bytes::from_static(b"Anna"))
        );

        let stale = cache.get_row("users", b"\x01", "info", Encoding::Utf8).unwrap();
        assert_eq!(stale.values(), before.values());

        assert!(cache.evict_row("users", "info", b"\x01").unwrap());
        let fresh = cache.get_row("users", b"\x01", "info", Encoding::Utf8).unwrap();
        assert_eq!(fresh.values(), &["Anna".to_string()]);
        assert_eq!(store.calls().get_row, 2);
    }

    #[test]
    fn test_write_cell_text() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        cache.list_families("users").unwrap();

        cache
            .write_cell_text("users", "info", b"\x01", "flag", "0AFF", Encoding::Hex)
            .unwrap();
        assert_eq!(
            store.cell("users", "info", b"\x01", "flag"),
            Some(Bytes::from_static(b"\x0a\xff"))
        );

        assert!(matches!(
            cache.write_cell_text("users", "info", b"\x01", "flag", "abc", Encoding::Hex),
            Err(Error::InvalidEncodingInput { .. })
        ));
        assert_eq!(store.calls().put_cell, 1);
    }

    #[test]
    fn test_write_cell_checks_family() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        assert!(matches!(
            cache.write_cell("users", "info", b"\x01", "name", b"x"),
            Err(Error::UnknownFamily { .. })
        ));
        assert_eq!(store.calls().put_cell, 0);
    }

    #[test]
    fn test_update_setting_drops_everything() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        cache.list_families("users").unwrap();
        assert_eq!(cache.generation(), 0);

        cache.update_setting(ROOT_DIR, "/new/path").unwrap();
        assert_eq!(cache.generation(), 1);
        assert_eq!(cache.setting(ROOT_DIR).as_deref(), Some("/new/path"));
        assert_eq!(
            store.config().get(ROOT_DIR).map(String::as_str),
            Some("/new/path")
        );

        assert!(matches!(
            cache.list_families("users"),
            Err(Error::UnknownTable(_))
        ));

        cache.list_tables().unwrap();
        assert_eq!(store.calls().list_tables, 2);
    }

    #[test]
    fn test_update_setting_reconnect_failure() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        store.set_available(false);

        let err = cache.update_setting(ROOT_DIR, "/other").unwrap_err();
        assert!(err.is_retryable());
        // Cache was dropped anyway.
        assert!(matches!(
            cache.list_families("users"),
            Err(Error::UnknownTable(_))
        ));
    }

    #[test]
    fn test_remote_error_context() {
        let (store, cache) = setup();
        cache.list_tables().unwrap();
        cache.list_families("users").unwrap();
        store.set_available(false);

        match cache.get_row("users", b"\x01", "info", Encoding::Utf8) {
            Err(Error::RemoteUnavailable {
                operation, target, ..
            }) => {
                assert_eq!(operation, "get row");
                assert_eq!(target, "users/info/01");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let stats = cache.stats();
        assert_eq!(stats.remote_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_search_row_names() {
        let (store, cache) = setup();
        store.insert("users", "info", b"user:10", "name", b"x").unwrap();
        cache.list_tables().unwrap();
        cache.populate_row_keys("users").unwrap().for_each(drop);

        assert_eq!(
            cache.search_row_names("users", Encoding::Utf8, "user").unwrap(),
            vec!["user:10".to_string()]
        );
        assert_eq!(
            cache.search_row_names("users", Encoding::Hex, "0").unwrap().len(),
            3
        );
    }

    #[test]
    fn test_spawn_population() {
        let (_store, cache) = setup();
        cache.list_tables().unwrap();

        let handle = cache.spawn_population("users").unwrap();
        assert_eq!(
            handle.join(),
            Some(PopulationEvent::Finished { keys: 2 })
        );
        assert_eq!(cache.row_keys("users").unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_options() {
        let store = Arc::new(MemoryStore::new());
        let options = Options {
            population_buffer: 0,
            ..Options::default()
        };
        assert!(LookasideCache::with_options(store, Arc::new(MemorySettings::new()), options)
            .is_err());
    }
}
