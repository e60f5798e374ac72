//! In-memory record store, for hosts without persistence and for tests.

use std::collections::HashMap;

use bridge_traits::error::Result;
use bridge_traits::{CacheRecordStore, StoredCacheRecord};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<String, StoredCacheRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Snapshot of the record under `key`.
    pub fn get(&self, key: &str) -> Option<StoredCacheRecord> {
        self.records.lock().get(key).cloned()
    }
}

impl CacheRecordStore for InMemoryRecordStore {
    fn load(&self, key: &str) -> Result<Option<StoredCacheRecord>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, record: &StoredCacheRecord) -> Result<()> {
        self.records.lock().insert(key.to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.records.lock().remove(key);
        Ok(())
    }
}
