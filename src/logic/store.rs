//! Bounded Snapshot Store
//!
//! Local persistence for the prediction history and the dashboard
//! snapshot. The history is FIFO-bounded, and writes that hit a storage
//! quota recover by shedding the oldest records before giving up.
//!
//! The backend is a trait so tests (and embedded hosts) can swap the
//! filesystem for an in-memory map.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::{self, QUOTA_DROP_FRACTION, QUOTA_RETRY_ROUNDS};
use crate::logic::types::{FleetSnapshot, Prediction};

/// Persistence errors
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Backend refused the write for size; recovery rounds were exhausted
    QuotaExceeded,
    Io(String),
    Corrupt(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded => write!(f, "Storage quota exceeded"),
            Self::Io(e) => write!(f, "Storage I/O error: {}", e),
            Self::Corrupt(e) => write!(f, "Corrupt stored data: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// Key/value persistence backend
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Filesystem backend; each key is a JSON file in the data directory
pub struct FileBackend {
    dir: PathBuf,
    quota_bytes: Option<usize>,
}

impl FileBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            quota_bytes: None,
        }
    }

    /// Cap the byte size of any single stored value
    pub fn with_quota(dir: PathBuf, quota_bytes: usize) -> Self {
        Self {
            dir,
            quota_bytes: Some(quota_bytes),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            if value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::write(self.path_for(key), value).map_err(|e| StorageError::Io(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }
}

/// In-memory backend for tests and hosts without a writable disk
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            if value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Snapshot and prediction-history store over a pluggable backend
pub struct SnapshotStore {
    backend: Arc<dyn StorageBackend>,
    max_predictions: usize,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn StorageBackend>, max_predictions: usize) -> Self {
        Self {
            backend,
            max_predictions,
        }
    }

    pub fn max_predictions(&self) -> usize {
        self.max_predictions
    }

    /// Read and deserialize a stored value. Corrupt entries are removed
    /// and treated as absent so one bad write cannot wedge startup.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read '{}': {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Discarding corrupt entry '{}': {}", key, e);
                if let Err(e) = self.backend.remove(key) {
                    log::warn!("Failed to remove corrupt entry '{}': {}", key, e);
                }
                None
            }
        }
    }

    /// Stored prediction history, oldest first
    pub fn load_predictions(&self) -> Vec<Prediction> {
        self.read_json(constants::PREDICTIONS_KEY).unwrap_or_default()
    }

    /// Last persisted dashboard snapshot
    pub fn load_snapshot(&self) -> Option<FleetSnapshot> {
        self.read_json(constants::DASHBOARD_KEY)
    }

    /// Append a prediction to the bounded history and persist it. Returns
    /// the history as actually stored (after any bounding or quota drops).
    pub fn append_prediction(
        &self,
        prediction: Prediction,
    ) -> Result<Vec<Prediction>, StorageError> {
        let mut predictions = self.load_predictions();
        predictions.push(prediction);
        bound_fifo(&mut predictions, self.max_predictions);
        self.save_predictions(predictions)
    }

    /// Persist a full history, bounding it first
    pub fn save_predictions(
        &self,
        mut predictions: Vec<Prediction>,
    ) -> Result<Vec<Prediction>, StorageError> {
        bound_fifo(&mut predictions, self.max_predictions);
        self.write_with_recovery(constants::PREDICTIONS_KEY, predictions, drop_oldest_quarter)
    }

    /// Persist the dashboard snapshot; under quota pressure the snapshot
    /// sheds its oldest predictions the same way the history does.
    pub fn save_snapshot(&self, mut snapshot: FleetSnapshot) -> Result<FleetSnapshot, StorageError> {
        bound_fifo(&mut snapshot.predictions, self.max_predictions);
        self.write_with_recovery(constants::DASHBOARD_KEY, snapshot, |s| {
            drop_oldest_quarter(&mut s.predictions)
        })
    }

    /// Remove everything this store owns
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove(constants::PREDICTIONS_KEY)?;
        self.backend.remove(constants::DASHBOARD_KEY)?;
        Ok(())
    }

    /// Serialize and write, recovering from quota errors by shedding old
    /// data and retrying. `shrink` drops a batch and reports whether it
    /// removed anything; once it cannot, or the rounds run out, the quota
    /// error is surfaced.
    fn write_with_recovery<T: Serialize>(
        &self,
        key: &str,
        mut value: T,
        shrink: impl Fn(&mut T) -> bool,
    ) -> Result<T, StorageError> {
        for round in 0..=QUOTA_RETRY_ROUNDS {
            let raw = serde_json::to_string(&value)
                .map_err(|e| StorageError::Corrupt(e.to_string()))?;
            match self.backend.write(key, &raw) {
                Ok(()) => {
                    if round > 0 {
                        log::warn!(
                            "Write of '{}' succeeded after dropping old records ({} recovery rounds)",
                            key,
                            round
                        );
                    }
                    return Ok(value);
                }
                Err(StorageError::QuotaExceeded) if round < QUOTA_RETRY_ROUNDS => {
                    if !shrink(&mut value) {
                        return Err(StorageError::QuotaExceeded);
                    }
                    log::warn!("Quota hit writing '{}', shedding oldest records", key);
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::QuotaExceeded)
    }
}

/// Keep only the newest `max` entries, dropping from the front
fn bound_fifo(predictions: &mut Vec<Prediction>, max: usize) {
    if predictions.len() > max {
        let excess = predictions.len() - max;
        predictions.drain(..excess);
    }
}

/// Drop the oldest quarter (at least one record). Returns false when empty.
fn drop_oldest_quarter(predictions: &mut Vec<Prediction>) -> bool {
    if predictions.is_empty() {
        return false;
    }
    let count = ((predictions.len() as f64 * QUOTA_DROP_FRACTION) as usize).max(1);
    predictions.drain(..count.min(predictions.len()));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use crate::logic::types::{RiskCategory, Ship};

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn prediction(ship_id: &str, level: u8) -> Prediction {
        Prediction {
            ship_id: ship_id.to_string(),
            biofouling_level: level,
            risk_category: RiskCategory::Low,
            confidence: 0.5,
            timestamp_iso: "2024-01-01T00:00:00+00:00".to_string(),
            impact: None,
            recommended_action: String::new(),
        }
    }

    /// Backend that always reports quota exhaustion; counts write attempts
    struct AlwaysFullBackend {
        writes: AtomicUsize,
    }

    impl StorageBackend for AlwaysFullBackend {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::QuotaExceeded)
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    /// Backend that rejects the first N writes for quota, then accepts
    struct FlakyBackend {
        inner: MemoryBackend,
        failures_left: AtomicUsize,
    }

    impl StorageBackend for FlakyBackend {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.read(key)
        }
        fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::QuotaExceeded);
            }
            self.inner.write(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_history_is_fifo_bounded() {
        let store = SnapshotStore::new(Arc::new(MemoryBackend::new()), 5);
        for i in 0..8 {
            store.append_prediction(prediction(&format!("ship-{}", i), 0)).unwrap();
        }
        let predictions = store.load_predictions();
        assert_eq!(predictions.len(), 5);
        assert_eq!(predictions[0].ship_id, "ship-3");
        assert_eq!(predictions[4].ship_id, "ship-7");
    }

    #[test]
    fn test_corrupt_entry_self_heals() {
        init_logs();
        let backend = Arc::new(MemoryBackend::new());
        backend.write(constants::PREDICTIONS_KEY, "{not json").unwrap();

        let store = SnapshotStore::new(backend.clone(), 10);
        assert!(store.load_predictions().is_empty());
        // the bad entry was removed, not left to fail every load
        assert!(backend.read(constants::PREDICTIONS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_quota_exhaustion_attempts_then_fails() {
        let backend = Arc::new(AlwaysFullBackend {
            writes: AtomicUsize::new(0),
        });
        let store = SnapshotStore::new(backend.clone(), 100);

        let mut predictions = Vec::new();
        for i in 0..40 {
            predictions.push(prediction(&format!("ship-{}", i), 0));
        }
        let result = store.save_predictions(predictions);
        assert!(matches!(result, Err(StorageError::QuotaExceeded)));
        // initial write plus one per recovery round
        assert_eq!(backend.writes.load(Ordering::SeqCst), 1 + QUOTA_RETRY_ROUNDS as usize);
    }

    #[test]
    fn test_quota_recovery_sheds_oldest_and_succeeds() {
        init_logs();
        let backend = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicUsize::new(2),
        });
        let store = SnapshotStore::new(backend, 100);

        let mut predictions = Vec::new();
        for i in 0..40 {
            predictions.push(prediction(&format!("ship-{}", i), 0));
        }
        let stored = store.save_predictions(predictions).unwrap();
        // two recovery rounds drop 10 then 7 of the oldest records
        assert_eq!(stored.len(), 23);
        assert_eq!(stored[0].ship_id, "ship-17");
        assert_eq!(store.load_predictions().len(), 23);
    }

    #[test]
    fn test_quota_with_nothing_left_to_drop() {
        let backend = Arc::new(AlwaysFullBackend {
            writes: AtomicUsize::new(0),
        });
        let store = SnapshotStore::new(backend, 100);
        let result = store.save_predictions(Vec::new());
        assert!(matches!(result, Err(StorageError::QuotaExceeded)));
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FileBackend::new(dir.path().to_path_buf()));
        let store = SnapshotStore::new(backend, 10);

        store.append_prediction(prediction("Atlas", 2)).unwrap();
        let snapshot = FleetSnapshot {
            ships: vec![Ship {
                id: "Atlas".to_string(),
                name: "Atlas".to_string(),
                current_level: 2,
                risk_category: RiskCategory::High,
                location: Ship::default_location(),
            }],
            predictions: vec![prediction("Atlas", 2)],
        };
        store.save_snapshot(snapshot).unwrap();

        assert_eq!(store.load_predictions().len(), 1);
        let loaded = store.load_snapshot().unwrap();
        assert_eq!(loaded.ships[0].id, "Atlas");
    }

    #[test]
    fn test_file_backend_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().to_path_buf());
        assert!(backend.read("absent").unwrap().is_none());
        // removing a missing key is not an error
        backend.remove("absent").unwrap();
    }

    #[test]
    fn test_clear_removes_both_keys() {
        let store = SnapshotStore::new(Arc::new(MemoryBackend::new()), 10);
        store.append_prediction(prediction("Atlas", 1)).unwrap();
        store.save_snapshot(FleetSnapshot::default()).unwrap();
        store.clear().unwrap();
        assert!(store.load_predictions().is_empty());
        assert!(store.load_snapshot().is_none());
    }
}
