//! # cellscope
//!
//! A lookaside cache and multi-encoding view layer for interactively
//! browsing a remote wide-column (table/family/row/qualifier) store.
//!
//! ## Features
//!
//! - **Fetch once**: tables, families and rows are fetched on first use and
//!   served from memory afterwards
//! - **Encoding views**: row names are projected under hex, UTF-8, ASCII and
//!   cp1251 at discovery time, so switching encodings is free
//! - **Background population**: row keys stream in on a cancellable thread
//!   while reads stay responsive
//! - **Safe invalidation**: changing a connection setting swaps in an empty
//!   cache; in-flight readers finish against their own snapshot
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cellscope::{Encoding, LookasideCache, MemorySettings, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let cache = LookasideCache::new(store, Arc::new(MemorySettings::new()))?;
//!
//! let tables = cache.list_tables()?;
//! let families = cache.list_families(&tables[0])?;
//!
//! let handle = cache.spawn_population(&tables[0])?;
//! for event in handle.events() {
//!     // report progress
//! }
//!
//! let names = cache.get_encoded_row_names(&tables[0], Encoding::Hex)?;
//! let row = cache.get_row_by_name(&tables[0], &names[0], &families[0], Encoding::Hex)?;
//! ```

// Public modules
pub mod client;
pub mod codec;
pub mod error;
pub mod logging;
pub mod options;
pub mod settings;
pub mod types;

// Internal modules
mod cache;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, OptionsBuilder};
pub use types::{Cell, Row, RowView};

// Codec
pub use codec::Encoding;

// Client
pub use client::memory::{CallCounts, MemoryStore};
pub use client::{ClientError, ClientResult, RemoteStoreClient, RowKeyScan};

// Settings
pub use settings::{FileSettings, MemorySettings, SettingsStore};

// Cache
pub use cache::{
    CacheStats, CancelToken, EncodingViewIndex, LookasideCache, PopulationEvent,
    PopulationHandle, PopulationState, RowKeyStream, TableCache,
};
