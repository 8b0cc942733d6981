//! Connection settings.
//!
//! Settings are a flat key/value map describing how to reach the remote
//! store. The cache passes them through to the client untouched; changing
//! any of them invalidates everything cached.

mod file;

pub use file::FileSettings;

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::Result;

/// ZooKeeper quorum used to locate the cluster.
pub const ZOOKEEPER_QUORUM: &str = "hbase.zookeeper.quorum";

/// Master endpoint.
pub const MASTER: &str = "hbase.master";

/// Storage root location.
pub const ROOT_DIR: &str = "hbase.rootdir";

/// Whether the cluster runs distributed.
pub const CLUSTER_DISTRIBUTED: &str = "hbase.cluster.distributed";

/// Local data directory.
pub const TMP_DIR: &str = "hbase.tmp.dir";

/// Keys the connection layer understands.
pub const CONNECTION_KEYS: [&str; 5] = [
    ZOOKEEPER_QUORUM,
    MASTER,
    ROOT_DIR,
    CLUSTER_DISTRIBUTED,
    TMP_DIR,
];

/// Key/value accessor for settings.
pub trait SettingsStore: Send + Sync {
    /// Get the value of a key.
    fn get(&self, key: &str) -> Option<String>;

    /// Set the value of a key.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// All keys currently set.
    fn keys(&self) -> Vec<String>;

    /// All key/value pairs.
    fn snapshot(&self) -> BTreeMap<String, String> {
        self.keys()
            .into_iter()
            .filter_map(|k| self.get(&k).map(|v| (k, v)))
            .collect()
    }
}

/// Settings held only in memory.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemorySettings {
    /// Create empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings pre-filled with `pairs`.
    pub fn with_values<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().clone()
    }
}
