//! Local persistence for the in-progress draft.
//!
//! A store holds exactly one [`LocalDraftRecord`] under a fixed key. Records
//! are kept as serialized JSON, the same way browser storage would hold them,
//! so a corrupt slot is possible and reads as "no recoverable draft".

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::document::LocalDraftRecord;
use crate::error::StoreError;

/// Single-slot key-value persistence for the local draft.
///
/// Pure read/write/clear. Scheduling lives in the autosave scheduler.
pub trait LocalDraftStore: Send + Sync + 'static {
    /// Read the slot. A missing or unreadable record is `Ok(None)`.
    fn load(&self) -> Result<Option<LocalDraftRecord>, StoreError>;

    /// Overwrite the slot.
    fn save(&self, record: &LocalDraftRecord) -> Result<(), StoreError>;

    /// Delete the slot. Clearing an empty slot succeeds.
    fn clear(&self) -> Result<(), StoreError>;
}

impl<T: LocalDraftStore> LocalDraftStore for Arc<T> {
    fn load(&self) -> Result<Option<LocalDraftRecord>, StoreError> {
        (**self).load()
    }

    fn save(&self, record: &LocalDraftRecord) -> Result<(), StoreError> {
        (**self).save(record)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// Parse a raw slot value, treating corrupt data as absent.
fn decode_record(key: &str, raw: &str) -> Option<LocalDraftRecord> {
    match serde_json::from_str(raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring corrupt local draft record");
            None
        }
    }
}

/// In-memory store, for tests and sessions without durable storage.
///
/// Clones share the same slot.
#[derive(Clone, Debug)]
pub struct MemoryDraftStore {
    key: Arc<str>,
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryDraftStore {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            key: Arc::from(key.as_ref()),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Seed the slot with raw text, bypassing serialization.
    pub fn with_raw(self, raw: impl Into<String>) -> Self {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
        self
    }

    /// Raw slot contents, for assertions and debugging.
    pub fn raw(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl LocalDraftStore for MemoryDraftStore {
    fn load(&self) -> Result<Option<LocalDraftRecord>, StoreError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.as_deref().and_then(|raw| decode_record(&self.key, raw)))
    }

    fn save(&self, record: &LocalDraftRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// File-backed store: one JSON file per storage key inside a profile directory.
///
/// ```text
/// <profile>/
///   draftkeep_draft.json   # key "draftkeep:draft"
/// ```
#[derive(Clone, Debug)]
pub struct FileDraftStore {
    key: String,
    path: PathBuf,
}

impl FileDraftStore {
    /// Create a store for `key` under `dir`. The directory is created on first write.
    pub fn new(dir: impl AsRef<Path>, key: impl Into<String>) -> Self {
        let key = key.into();
        let path = dir.as_ref().join(format!("{}.json", file_stem(&key)));
        Self { key, path }
    }

    /// Location of the slot on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Map a storage key to a filesystem-safe stem.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl LocalDraftStore for FileDraftStore {
    fn load(&self) -> Result<Option<LocalDraftRecord>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(decode_record(&self.key, &raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &LocalDraftRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(record)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Rename over the slot; readers never see a torn record.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
