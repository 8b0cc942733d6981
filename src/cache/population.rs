//! Row-key population.
//!
//! A [`RowKeyStream`] drives one remote enumeration of a table's row keys,
//! appending each key to the table's [`EncodingViewIndex`] before handing
//! it to the caller. [`PopulationHandle`] runs the same stream on a
//! background thread and forwards progress through a bounded channel.
//!
//! Cancellation is advisory: a key that arrives after the token was
//! cancelled is discarded rather than appended.
//!
//! [`EncodingViewIndex`]: super::EncodingViewIndex

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::client::RowKeyScan;
use crate::{Error, Result};

use super::stats::CacheStats;
use super::table_cache::TableCache;

/// Shared stop flag for a population.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Check if both tokens share the same flag.
    pub(crate) fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

struct ActivePopulation {
    table: String,
    token: CancelToken,
}

/// Holder of the one population allowed to append row keys.
///
/// Shared between the cache and the streams it starts; a stream clears the
/// slot itself once it ends.
#[derive(Clone, Default)]
pub(crate) struct PopulationSlot(Arc<Mutex<Option<ActivePopulation>>>);

impl PopulationSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make a fresh token active for `table`, cancelling the previous one.
    pub(crate) fn activate(&self, table: &str) -> CancelToken {
        let token = CancelToken::new();
        let previous = self.0.lock().replace(ActivePopulation {
            table: table.to_string(),
            token: token.clone(),
        });
        if let Some(previous) = previous {
            previous.token.cancel();
            debug!(previous = %previous.table, next = table, "population target switched");
        }
        token
    }

    /// Clear the slot if `token` is still the active one.
    pub(crate) fn release(&self, token: &CancelToken) {
        let mut active = self.0.lock();
        if active.as_ref().map_or(false, |a| a.token.same_as(token)) {
            *active = None;
        }
    }

    /// Cancel and clear the active population, returning its table.
    pub(crate) fn cancel(&self) -> Option<String> {
        let active = self.0.lock().take()?;
        active.token.cancel();
        Some(active.table)
    }

    /// Table of the active population.
    pub(crate) fn active_table(&self) -> Option<String> {
        self.0.lock().as_ref().map(|a| a.table.clone())
    }
}

/// Lazy sequence of row keys discovered by one enumeration.
///
/// Each yielded key has already been appended to the table's index under
/// every encoding. The stream is not restartable; dropping it before the
/// end marks the population as stopped.
pub struct RowKeyStream {
    table: Arc<TableCache>,
    scan: RowKeyScan,
    token: CancelToken,
    slot: PopulationSlot,
    stats: Arc<CacheStats>,
    run: u64,
    yielded: u64,
    done: bool,
    completed: bool,
}

impl RowKeyStream {
    pub(crate) fn new(
        table: Arc<TableCache>,
        scan: RowKeyScan,
        token: CancelToken,
        slot: PopulationSlot,
        stats: Arc<CacheStats>,
        run: u64,
    ) -> Self {
        Self {
            table,
            scan,
            token,
            slot,
            stats,
            run,
            yielded: 0,
            done: false,
            completed: false,
        }
    }

    /// Name of the table being enumerated.
    pub fn table(&self) -> &str {
        self.table.name()
    }

    /// Token that stops this stream.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Number of keys yielded so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Check if the enumeration ran to its end.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn halt(&mut self) {
        self.done = true;
        self.table.index_mut().stop(self.run);
        self.slot.release(&self.token);
        debug!(table = %self.table.name(), keys = self.yielded, "row key population stopped");
    }
}

impl Iterator for RowKeyStream {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.token.is_cancelled() {
            self.halt();
            return None;
        }

        match self.scan.next() {
            None => {
                self.done = true;
                self.completed = true;
                self.table.index_mut().finish(self.run);
                self.slot.release(&self.token);
                info!(table = %self.table.name(), keys = self.yielded, "row key population finished");
                None
            }
            Some(Err(e)) => {
                self.stats.remote_failures.fetch_add(1, Ordering::Relaxed);
                warn!(table = %self.table.name(), keys = self.yielded, error = %e, "row key scan failed");
                self.halt();
                Some(Err(Error::remote("scan row keys", self.table.name(), e)))
            }
            Some(Ok(key)) => {
                {
                    let mut index = self.table.index_mut();
                    if self.token.is_cancelled() {
                        index.stop(self.run);
                        drop(index);
                        self.done = true;
                        self.slot.release(&self.token);
                        return None;
                    }
                    index.push(key.clone());
                }
                self.yielded += 1;
                self.stats.keys_populated.fetch_add(1, Ordering::Relaxed);
                Some(Ok(key))
            }
        }
    }
}

impl Drop for RowKeyStream {
    fn drop(&mut self) {
        if !self.done {
            self.table.index_mut().stop(self.run);
            self.slot.release(&self.token);
        }
    }
}

/// Progress reported by a background population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulationEvent {
    /// A row key was discovered and indexed.
    Key(Bytes),
    /// The enumeration completed.
    Finished { keys: u64 },
    /// The population was cancelled; `keys` were indexed before it stopped.
    Cancelled { keys: u64 },
    /// The enumeration failed; keys indexed so far are kept.
    Failed(Error),
}

impl PopulationEvent {
    /// Check if this is the last event of a population.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PopulationEvent::Key(_))
    }
}

/// A row-key population running on a background thread.
///
/// Dropping the handle cancels the population without waiting for
/// outstanding remote I/O.
pub struct PopulationHandle {
    table: String,
    token: CancelToken,
    events: Receiver<PopulationEvent>,
    thread_handle: Option<JoinHandle<()>>,
    received: AtomicU64,
}

impl PopulationHandle {
    pub(crate) fn spawn(stream: RowKeyStream, buffer: usize, thread_name: &str) -> Result<Self> {
        let table = stream.table().to_string();
        let token = stream.cancel_token();
        let (tx, rx) = mpsc::sync_channel(buffer);

        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run_population(stream, tx))?;

        Ok(Self {
            table,
            token,
            events: rx,
            thread_handle: Some(handle),
            received: AtomicU64::new(0),
        })
    }

    /// Name of the table being populated.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of events received through this handle.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Block until the next event. `None` once the population has ended
    /// and every event was consumed.
    pub fn recv(&self) -> Option<PopulationEvent> {
        let event = self.events.recv().ok()?;
        self.received.fetch_add(1, Ordering::Relaxed);
        Some(event)
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PopulationEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.received.fetch_add(1, Ordering::Relaxed);
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&self) -> Option<PopulationEvent> {
        match self.events.try_recv() {
            Ok(event) => {
                self.received.fetch_add(1, Ordering::Relaxed);
                Some(event)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Iterate over events until the population ends.
    pub fn events(&self) -> impl Iterator<Item = PopulationEvent> + '_ {
        std::iter::from_fn(move || self.recv())
    }

    /// Drain remaining events, wait for the thread and return the terminal
    /// event.
    ///
    /// Returns `None` if the population thread panicked before reporting
    /// one; the panic is logged.
    pub fn join(mut self) -> Option<PopulationEvent> {
        let mut last = None;
        while let Some(event) = self.recv() {
            if event.is_terminal() {
                last = Some(event);
            }
        }
        if let Some(handle) = self.thread_handle.take() {
            if let Err(payload) = handle.join() {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(table = %self.table, panic = %message, "population thread panicked");
            }
        }
        last
    }
}

impl Drop for PopulationHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn run_population(mut stream: RowKeyStream, tx: SyncSender<PopulationEvent>) {
    let token = stream.cancel_token();

    for item in stream.by_ref() {
        match item {
            Ok(key) => {
                if tx.send(PopulationEvent::Key(key)).is_err() {
                    // Receiver is gone; nobody is watching this table anymore.
                    token.cancel();
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(PopulationEvent::Failed(e));
                return;
            }
        }
    }

    let keys = stream.yielded();
    let event = if stream.is_completed() {
        PopulationEvent::Finished { keys }
    } else {
        PopulationEvent::Cancelled { keys }
    };
    let _ = tx.send(event);
}
