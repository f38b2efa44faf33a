//! In-memory `PackageStore` for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{key_prefix, object_key, PackageStore, StoreError};

/// Package store backed by a `HashMap`, keyed `{bucket}/{filename}`.
#[derive(Default)]
pub struct MemoryPackageStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with empty files, for listing tests.
    pub fn with_files(bucket: &str, filenames: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut objects = store.objects.lock().unwrap();
            for filename in filenames {
                objects.insert(object_key(bucket, filename), Vec::new());
            }
        }
        store
    }
}

#[async_trait]
impl PackageStore for MemoryPackageStore {
    async fn exists(&self, bucket: &str, filename: &str) -> Result<bool, StoreError> {
        let key = object_key(bucket, filename);
        Ok(self.objects.lock().unwrap().contains_key(&key))
    }

    async fn write(&self, bucket: &str, filename: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let key = object_key(bucket, filename);
        self.objects.lock().unwrap().insert(key, data);
        Ok(())
    }

    async fn read(&self, bucket: &str, filename: &str) -> Result<Vec<u8>, StoreError> {
        let key = object_key(bucket, filename);
        let objects = self.objects.lock().unwrap();
        objects.get(&key).cloned().ok_or(StoreError::NotFound(key))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let full_prefix = key_prefix(bucket, prefix);
        let strip = format!("{bucket}/");
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|key| key.starts_with(&full_prefix))
            .filter_map(|key| key.strip_prefix(&strip))
            .map(|filename| filename.to_string())
            .collect())
    }
}
