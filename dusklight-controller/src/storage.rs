//! JSON file backed record store
//!
//! Keeps every record in memory and rewrites the whole file after each
//! write, so a crash loses at most the write in flight.

use anyhow::{Context, Result};
use dusklight_gradient_lib::{KeyValueStore, MemoryStore, StoredValue};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonFileStore {
    path: PathBuf,
    records: MemoryStore,
}

impl JsonFileStore {
    /// Open `path`, starting empty when it does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let buf = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let records: MemoryStore = serde_json::from_slice(&buf)
                .with_context(|| format!("parsing {}", path.display()))?;
            info!(
                "Storage: loaded {} records from {}",
                records.len(),
                path.display()
            );
            records
        } else {
            info!(
                "Storage: {} does not exist, starting empty",
                path.display()
            );
            MemoryStore::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.records)?;
        // Write then rename so a reader never sees a truncated file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!("Storage: saved {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    type Error = anyhow::Error;

    fn read(&self, namespace: &str, key: &str) -> Option<StoredValue> {
        self.records.read(namespace, key)
    }

    fn write(&mut self, namespace: &str, key: &str, value: StoredValue) -> Result<()> {
        self.records
            .write(namespace, key, value)
            .unwrap_or_else(|never| match never {});
        self.save()
    }
}
