//! Remote wide-column store client interface.
//!
//! The cache only ever talks to the store through [`RemoteStoreClient`].
//! [`memory::MemoryStore`] is a complete in-process implementation.

pub mod memory;

use std::collections::BTreeMap;

use bytes::Bytes;
use thiserror::Error;

use crate::types::Cell;

/// Failure reported by a remote store client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ClientError(String);

impl ClientError {
    /// Create a client error with the given message.
    pub fn new<S: Into<String>>(msg: S) -> Self {
        ClientError(msg.into())
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Result type for client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Lazy enumeration of raw row keys, in the store's natural order.
pub type RowKeyScan = Box<dyn Iterator<Item = ClientResult<Bytes>> + Send>;

/// Capability the cache consumes to reach the remote store.
///
/// Implementations must be shareable across threads: reads and a
/// background row-key scan can run at the same time.
pub trait RemoteStoreClient: Send + Sync {
    /// Enumerate table names.
    fn list_tables(&self) -> ClientResult<Vec<String>>;

    /// Enumerate the column families of a table.
    fn list_families(&self, table: &str) -> ClientResult<Vec<String>>;

    /// Fetch the cells of one row under one family. Empty if none.
    fn get_row_under_family(
        &self,
        table: &str,
        row_key: &[u8],
        family: &str,
    ) -> ClientResult<Vec<Cell>>;

    /// Start a first-key-only, single-version scan over every row key.
    fn scan_row_keys(&self, table: &str) -> ClientResult<RowKeyScan>;

    /// Write one cell.
    fn put_cell(
        &self,
        table: &str,
        family: &str,
        row_key: &[u8],
        qualifier: &str,
        value: &[u8],
    ) -> ClientResult<()>;

    /// Apply connection settings. Called at start-up and after every
    /// settings change.
    fn reconnect(&self, _settings: &BTreeMap<String, String>) -> ClientResult<()> {
        Ok(())
    }
}
