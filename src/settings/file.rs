//! Settings persisted to a flat `key=value` file.
//!
//! File format:
//! ```text
//! # comment
//! hbase.zookeeper.quorum=zk1,zk2
//! hbase.rootdir=hdfs://namenode:8020/hbase
//! ```
//!
//! Everything after the first `=` is the value, kept byte for byte.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use super::SettingsStore;
use crate::{Error, Result};

/// Settings backed by a file that is rewritten atomically on every change.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
    /// Serializes rewrites of the file.
    write_mutex: Mutex<()>,
}

impl FileSettings {
    /// Open settings at `path`, loading existing values if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            parse(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
            write_mutex: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let mut content = String::new();
        for (key, value) in values {
            content.push_str(key);
            content.push('=');
            content.push_str(value);
            content.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)?;

        let file = fs::File::open(&temp_path)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Update the value in memory, then rewrite the file.
    ///
    /// The in-memory value stays updated even if the rewrite fails.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty()
            || key.trim() != key
            || key.starts_with('#')
            || key.contains(['=', '\n', '\r'])
        {
            return Err(Error::settings(format!("invalid settings key: {:?}", key)));
        }
        if value.contains(['\n', '\r']) {
            return Err(Error::settings(format!(
                "value for {} contains a line break",
                key
            )));
        }

        let _guard = self.write_mutex.lock();
        let snapshot = {
            let mut values = self.values.write();
            values.insert(key.to_string(), value.to_string());
            values.clone()
        };
        self.persist(&snapshot)
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().clone()
    }
}

fn parse(content: &str) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for (lineno, line) in content.lines().enumerate() {
        let head = line.trim_start();
        if head.is_empty() || head.starts_with('#') {
            continue;
        }
        let (key, value) = head.split_once('=').ok_or_else(|| {
            Error::settings(format!("line {}: expected key=value", lineno + 1))
        })?;
        let key = key.trim_end();
        if key.is_empty() {
            return Err(Error::settings(format!("line {}: empty key", lineno + 1)));
        }
        values.insert(key.to_string(), value.to_string());
    }
    Ok(values)
}
