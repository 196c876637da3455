//! Client-side store of tracking records. The whole record list is persisted
//! as one JSON document under a single well-known key, and the store seeds
//! itself the first time it finds nothing there.
use crate::metrics_defs::LOCAL_CACHE_SEEDED;
use crate::normalize::TrackingKey;
use crate::seed::seed_records;
use crate::types::TrackingRecord;
use parking_lot::Mutex;
use shared::counter;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const STORAGE_KEY: &str = "ship-easy-tracking-data";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stored tracking data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whole-value key/value storage the cache persists into.
pub trait StorageBacking: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryBacking {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBacking for MemoryBacking {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Stores each key as `<base_dir>/<key>.json`.
pub struct FilesystemBacking {
    base_dir: PathBuf,
}

impl FilesystemBacking {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        FilesystemBacking {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl StorageBacking for FilesystemBacking {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_dir)?;

        // Write to a sibling file first so a crash never leaves a truncated document.
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!("Stored tracking data to {:?}, bytes: {}", path, value.len());
        Ok(())
    }
}

pub struct LocalCacheStore {
    backing: Arc<dyn StorageBacking>,
    // Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl LocalCacheStore {
    pub fn new(backing: Arc<dyn StorageBacking>) -> Self {
        LocalCacheStore {
            backing,
            lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBacking::new()))
    }

    pub fn get_all(&self) -> Result<Vec<TrackingRecord>, StoreError> {
        let _guard = self.lock.lock();
        self.load()
    }

    pub fn get(&self, key: &TrackingKey) -> Result<Option<TrackingRecord>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.into_iter().find(|record| record.key() == *key))
    }

    /// Inserts the record, replacing any record with the same normalized code.
    /// The stored copy carries the normalized code.
    pub fn save(&self, mut record: TrackingRecord) -> Result<(), StoreError> {
        let key = record.key();
        record.code = key.to_string();

        let _guard = self.lock.lock();
        let mut records = self.load()?;
        match records.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.persist(&records)
    }

    /// Removes the record for `key`. Returns false if there was none.
    pub fn delete(&self, key: &TrackingKey) -> Result<bool, StoreError> {
        let _guard = self.lock.lock();
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|record| record.key() != *key);

        if records.len() == before {
            return Ok(false);
        }
        self.persist(&records)?;
        Ok(true)
    }

    fn load(&self) -> Result<Vec<TrackingRecord>, StoreError> {
        match self.backing.read(STORAGE_KEY)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => {
                let seeds = seed_records();
                self.persist(&seeds)?;
                tracing::info!("Initialized local tracking cache with {} records", seeds.len());
                counter!(LOCAL_CACHE_SEEDED).increment(1);
                Ok(seeds)
            }
        }
    }

    fn persist(&self, records: &[TrackingRecord]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(records)?;
        self.backing.write(STORAGE_KEY, &raw)
    }
}
