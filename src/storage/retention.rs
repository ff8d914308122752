//! Bounded FIFO retention over a remote bucket.
//!
//! Eviction happens before upload, so a failed upload can leave the bucket
//! one artifact short of the bound until the next successful run.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ObjectStore;
use crate::config::{ARTIFACT_CONTENT_TYPE, ARTIFACT_EXTENSION};
use crate::error::StorageError;

pub struct RetentionStore {
    store: Arc<dyn ObjectStore>,
    max_artifacts: usize,
}

impl RetentionStore {
    pub fn new(store: Arc<dyn ObjectStore>, max_artifacts: usize) -> Self {
        Self {
            store,
            max_artifacts,
        }
    }

    /// Artifact names currently in the bucket, oldest first
    pub async fn artifacts(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|object| object.name)
            .filter(|name| name.ends_with(ARTIFACT_EXTENSION))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Rotate the bucket and upload the local artifact.
    ///
    /// Returns `true` only on a confirmed upload. The local file is removed
    /// before returning, whether or not the upload succeeded.
    pub async fn publish(&self, local_path: &Path) -> bool {
        let published = match self.try_publish(local_path).await {
            Ok(name) => {
                info!(artifact = %name, "CSV uploaded");
                true
            }
            Err(e) => {
                error!(path = %local_path.display(), error = %e, "Publish failed");
                false
            }
        };

        // Scratch space must not accumulate across runs
        match tokio::fs::remove_file(local_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %local_path.display(), error = %e, "Failed to remove local artifact")
            }
        }

        published
    }

    async fn try_publish(&self, local_path: &Path) -> Result<String, StorageError> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::Upload {
                name: local_path.display().to_string(),
                reason: "artifact path has no file name".to_string(),
            })?
            .to_string();

        self.evict_oldest().await?;

        let bytes = tokio::fs::read(local_path).await?;
        self.store
            .upload(&name, bytes, ARTIFACT_CONTENT_TYPE, true)
            .await?;

        Ok(name)
    }

    /// Remove the oldest artifact if the bucket is already at the bound.
    /// Only a listing failure is returned; delete failures are logged.
    async fn evict_oldest(&self) -> Result<(), StorageError> {
        let names = self.artifacts().await?;

        if names.len() < self.max_artifacts {
            return Ok(());
        }
        let Some(oldest) = names.first() else {
            return Ok(());
        };

        match self.store.remove(std::slice::from_ref(oldest)).await {
            Ok(()) => info!(artifact = %oldest, "Oldest artifact removed (FIFO)"),
            Err(e) => warn!(artifact = %oldest, error = %e, "Failed to remove oldest artifact"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    fn local_artifact(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "ID_Interno\nCSV_X_001_00\n").unwrap();
        path
    }

    #[tokio::test]
    async fn test_publish_evicts_oldest_at_bound() {
        let store = Arc::new(MemoryStore::with_objects(&[
            "market_data_20240301_100000.csv",
            "market_data_20240301_100200.csv",
            "market_data_20240301_100400.csv",
        ]));
        let retention = RetentionStore::new(store.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = local_artifact(dir.path(), "market_data_20240301_100600.csv");

        assert!(retention.publish(&path).await);

        assert_eq!(
            store.names(),
            vec![
                "market_data_20240301_100200.csv",
                "market_data_20240301_100400.csv",
                "market_data_20240301_100600.csv",
            ]
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_publish_below_bound_keeps_all() {
        let store = Arc::new(MemoryStore::with_objects(&["market_data_20240301_100000.csv"]));
        let retention = RetentionStore::new(store.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = local_artifact(dir.path(), "market_data_20240301_100200.csv");

        assert!(retention.publish(&path).await);
        assert_eq!(store.names().len(), 2);

        let uploaded = store.objects.lock().unwrap()["market_data_20240301_100200.csv"].clone();
        assert_eq!(uploaded, b"ID_Interno\nCSV_X_001_00\n".to_vec());
    }

    #[tokio::test]
    async fn test_non_artifacts_ignored_for_retention() {
        let store = Arc::new(MemoryStore::with_objects(&[
            ".emptyFolderPlaceholder",
            "a_notes.txt",
            "market_data_20240301_100000.csv",
            "market_data_20240301_100200.csv",
        ]));
        let retention = RetentionStore::new(store.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = local_artifact(dir.path(), "market_data_20240301_100400.csv");

        assert!(retention.publish(&path).await);
        // Two CSVs before upload: nothing evicted, non-CSV objects untouched
        assert_eq!(store.names().len(), 5);
        assert!(store.names().contains(&"a_notes.txt".to_string()));
    }

    #[tokio::test]
    async fn test_upload_failure_returns_false_and_cleans_up() {
        let store = Arc::new(MemoryStore::with_objects(&[]));
        store.fail_upload.store(true, Ordering::SeqCst);
        let retention = RetentionStore::new(store.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = local_artifact(dir.path(), "market_data_20240301_100000.csv");

        assert!(!retention.publish(&path).await);
        assert!(!path.exists());
        assert!(store.names().is_empty());
    }

    #[tokio::test]
    async fn test_eviction_failure_still_uploads() {
        let store = Arc::new(MemoryStore::with_objects(&[
            "market_data_20240301_100000.csv",
            "market_data_20240301_100200.csv",
            "market_data_20240301_100400.csv",
        ]));
        store.fail_remove.store(true, Ordering::SeqCst);
        let retention = RetentionStore::new(store.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = local_artifact(dir.path(), "market_data_20240301_100600.csv");

        assert!(retention.publish(&path).await);
        assert_eq!(store.names().len(), 4);
    }

    #[tokio::test]
    async fn test_list_failure_returns_false() {
        let store = Arc::new(MemoryStore::default());
        store.fail_list.store(true, Ordering::SeqCst);
        let retention = RetentionStore::new(store.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = local_artifact(dir.path(), "market_data_20240301_100000.csv");

        assert!(!retention.publish(&path).await);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let store = Arc::new(MemoryStore::default());
        let retention = RetentionStore::new(store.clone(), 3);
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("market_data_20240301_100000.csv");
        assert!(!retention.publish(&path).await);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_artifacts_sorted() {
        let store = Arc::new(MemoryStore::with_objects(&[
            "market_data_20240302_000000.csv",
            "market_data_20240301_235959.csv",
        ]));
        let retention = RetentionStore::new(store, 3);
        assert_eq!(
            retention.artifacts().await.unwrap(),
            vec![
                "market_data_20240301_235959.csv",
                "market_data_20240302_000000.csv",
            ]
        );
    }
}
