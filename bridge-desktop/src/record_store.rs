//! Cache Record Store backed by JSON files
//!
//! One document per key under a root directory. Saves go through a
//! temporary file and a rename so a crash never leaves a torn record.

use bridge_traits::{
    error::Result,
    storage::{file_name_for_key, CacheRecordStore, StoredCacheRecord},
};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// JSON-file implementation of [`CacheRecordStore`].
pub struct JsonFileRecordStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRecordStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(path = ?root, "Opened JSON record store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", file_name_for_key(key)))
    }
}

impl CacheRecordStore for JsonFileRecordStore {
    fn load(&self, key: &str) -> Result<Option<StoredCacheRecord>> {
        let path = self.record_path(key);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = ?path, error = %e, "Discarding unreadable cache record");
                Ok(None)
            }
        }
    }

    fn save(&self, key: &str, record: &StoredCacheRecord) -> Result<()> {
        let path = self.record_path(key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;

        let _guard = self.write_lock.lock();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(path = ?path, chunks = %record.chunks, "Saved cache record");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
