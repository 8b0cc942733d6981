//! Lookaside caching between a browsing session and the remote store.
//!
//! - **LookasideCache**: table, family and row lookups with fetch-on-miss
//!   and whole-cache invalidation on settings changes
//! - **TableCache**: per-table families, fetched rows and row-name index
//! - **EncodingViewIndex**: row names projected under every encoding
//! - **Population**: streaming and background row-key enumeration

mod lookaside;
mod population;
mod stats;
mod table_cache;
mod view_index;

pub use lookaside::LookasideCache;
pub use population::{CancelToken, PopulationEvent, PopulationHandle, RowKeyStream};
pub use stats::CacheStats;
pub use table_cache::TableCache;
pub use view_index::{EncodingViewIndex, PopulationState};
