//! Per-table row-name projections under every supported encoding.
//!
//! The index holds the raw row keys in discovery order and, for each
//! [`Encoding`], one projected name per key. All projections grow together
//! so switching the displayed encoding never needs the remote store.

use bytes::Bytes;

use crate::codec::Encoding;

/// Progress of a table's row-key population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopulationState {
    /// No population has started.
    #[default]
    Empty,
    /// Keys are being appended.
    Populating,
    /// The enumeration ran to completion.
    Populated,
    /// The enumeration was cancelled or failed; the prefix is kept.
    Stopped,
}

/// Row keys plus one name list per encoding.
///
/// `names(e)[i]` is always `e.encode(&row_keys()[i])`.
#[derive(Debug, Clone, Default)]
pub struct EncodingViewIndex {
    state: PopulationState,
    /// Id of the most recently started population.
    run: u64,
    row_keys: Vec<Bytes>,
    names: [Vec<String>; Encoding::COUNT],
}

impl EncodingViewIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current population state.
    pub fn state(&self) -> PopulationState {
        self.state
    }

    /// Number of known row keys.
    pub fn len(&self) -> usize {
        self.row_keys.len()
    }

    /// Check if no row keys are known.
    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty()
    }

    /// Raw row keys in discovery order.
    pub fn row_keys(&self) -> &[Bytes] {
        &self.row_keys
    }

    /// Row key at `index`.
    pub fn key_at(&self, index: usize) -> Option<&Bytes> {
        self.row_keys.get(index)
    }

    /// Projected names under `encoding`.
    pub fn names(&self, encoding: Encoding) -> &[String] {
        &self.names[encoding.index()]
    }

    /// Position of a projected name.
    pub fn position(&self, encoding: Encoding, name: &str) -> Option<usize> {
        self.names(encoding).iter().position(|n| n == name)
    }

    /// Projected names containing `needle`, in discovery order.
    pub fn search(&self, encoding: Encoding, needle: &str) -> Vec<String> {
        self.names(encoding)
            .iter()
            .filter(|n| n.contains(needle))
            .cloned()
            .collect()
    }

    /// Mark a population as started and return its run id. Only the latest
    /// run may finish or stop the index.
    pub(crate) fn begin(&mut self) -> u64 {
        self.run += 1;
        self.state = PopulationState::Populating;
        self.run
    }

    pub(crate) fn push(&mut self, key: Bytes) {
        for encoding in Encoding::ALL {
            self.names[encoding.index()].push(encoding.encode(&key));
        }
        self.row_keys.push(key);
    }

    pub(crate) fn finish(&mut self, run: u64) {
        if run == self.run {
            self.state = PopulationState::Populated;
        }
    }

    pub(crate) fn stop(&mut self, run: u64) {
        if run == self.run && self.state == PopulationState::Populating {
            self.state = PopulationState::Stopped;
        }
    }
}
