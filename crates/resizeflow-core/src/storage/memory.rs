use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{object_path, BlobStore, StorageError, StorageResult};

/// In-process blob store.
///
/// Keeps every object in memory and counts writes, which makes it the store
/// of choice for embedding the pipeline in tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a pipeline write.
    pub fn insert(&self, container: &str, key: &str, data: Vec<u8>) {
        self.lock()
            .insert((container.to_string(), key.to_string()), data);
    }

    /// Whether an object exists.
    pub fn contains(&self, container: &str, key: &str) -> bool {
        self.lock()
            .contains_key(&(container.to_string(), key.to_string()))
    }

    /// Read an object synchronously.
    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of successful `put` calls since creation.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Vec<u8>>> {
        // A poisoned map is still structurally valid.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, container: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.object(container, key)
            .ok_or_else(|| StorageError::NotFound(object_path(container, key)))
    }

    async fn put(&self, container: &str, key: &str, data: Vec<u8>) -> StorageResult<()> {
        self.insert(container, key, data);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
