//! Artifact storage: local CSV snapshots and the remote retention bucket
//!
//! Artifacts are written to local scratch, uploaded to a Supabase Storage
//! bucket holding at most `max_artifacts` of them, then removed locally.

pub mod artifact;
pub mod retention;
pub mod supabase;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StorageError;

pub use artifact::{Artifact, ArtifactWriter};
pub use retention::RetentionStore;
pub use supabase::SupabaseStorage;

/// Object as reported by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredObject {
    pub name: String,
}

/// Minimal bucket operations the retention policy needs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list(&self) -> Result<Vec<StoredObject>, StorageError>;

    async fn remove(&self, names: &[String]) -> Result<(), StorageError>;

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StorageError>;
}

#[cfg(test)]
pub mod memory {
    //! In-memory bucket for tests, with switchable failures.

    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
        pub fail_list: AtomicBool,
        pub fail_remove: AtomicBool,
        pub fail_upload: AtomicBool,
        pub uploads: AtomicUsize,
    }

    impl MemoryStore {
        pub fn with_objects(names: &[&str]) -> Self {
            let store = Self::default();
            {
                let mut objects = store.objects.lock().unwrap();
                for name in names {
                    objects.insert(name.to_string(), Vec::new());
                }
            }
            store
        }

        pub fn names(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(StorageError::List {
                    bucket: "memory".to_string(),
                    reason: "injected".to_string(),
                });
            }
            Ok(self
                .names()
                .into_iter()
                .map(|name| StoredObject { name })
                .collect())
        }

        async fn remove(&self, names: &[String]) -> Result<(), StorageError> {
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err(StorageError::Delete {
                    names: names.to_vec(),
                    reason: "injected".to_string(),
                });
            }
            let mut objects = self.objects.lock().unwrap();
            for name in names {
                objects.remove(name);
            }
            Ok(())
        }

        async fn upload(
            &self,
            name: &str,
            bytes: Vec<u8>,
            _content_type: &str,
            _upsert: bool,
        ) -> Result<(), StorageError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload.load(Ordering::SeqCst) {
                return Err(StorageError::Upload {
                    name: name.to_string(),
                    reason: "injected".to_string(),
                });
            }
            self.objects.lock().unwrap().insert(name.to_string(), bytes);
            Ok(())
        }
    }
}
