use crate::error::UsageError;
use crate::record::SessionRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::fs;

/// Persistence boundary for the session record collection.
///
/// Implementations return typed errors so callers can decide how to
/// degrade; the swallow-and-log contract lives in the tracker, not here.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Load the full record collection in insertion order.
    async fn load(&self) -> Result<Vec<SessionRecord>, UsageError>;

    /// Overwrite the persisted collection.
    async fn save(&self, records: &[SessionRecord]) -> Result<(), UsageError>;
}

/// File-backed store: one JSON array of records.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UsageStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<SessionRecord>, UsageError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            // A store that has never been written to is an empty collection.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let records = serde_json::from_str(&json)?;
        Ok(records)
    }

    async fn save(&self, records: &[SessionRecord]) -> Result<(), UsageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(records)?;
        // Write to a sibling temp file and rename over the target so an
        // interrupted save never leaves a truncated file behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn load(&self) -> Result<Vec<SessionRecord>, UsageError> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(records.clone())
    }

    async fn save(&self, records: &[SessionRecord]) -> Result<(), UsageError> {
        let mut guard = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = records.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<SessionRecord> {
        let mut a = SessionRecord::new("u1", "2026-01-05T10:00:00+00:00");
        a.messages_sent = 3;
        a.location = Some("CA".into());
        let b = SessionRecord::new("u2", "2026-01-05T11:00:00+00:00");
        vec![a, b]
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("usage_stats.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("usage_stats.json"));

        let records = sample_records();
        store.save(&records).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/deeper/usage_stats.json"));
        store.save(&sample_records()).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("usage_stats.json"));

        store.save(&sample_records()).await.unwrap();
        store.save(&[]).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("usage_stats.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(matches!(
            store.load().await,
            Err(UsageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_empty());

        let records = sample_records();
        store.save(&records).await.unwrap();
        assert_eq!(store.load().await.unwrap(), records);
    }
}
