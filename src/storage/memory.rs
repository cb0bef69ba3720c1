//! In-memory collection, the reference backend for the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Collection, Record, Snapshot, StorageResult};

pub struct MemoryCollection<T: Record> {
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    version: u64,
    records: HashMap<String, T>,
}

impl<T: Record> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                version: 0,
                records: HashMap::new(),
            }),
        }
    }
}

impl<T: Record> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_key<T: Record>(mut records: Vec<T>) -> Vec<T> {
    records.sort_by_key(|r| r.key());
    records
}

#[async_trait]
impl<T: Record> Collection<T> for MemoryCollection<T> {
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(key).cloned())
    }

    async fn find_by(&self, index: &str, value: &str) -> StorageResult<Vec<T>> {
        let inner = self.inner.read().await;
        let matches = inner
            .records
            .values()
            .filter(|r| {
                r.index_entries()
                    .iter()
                    .any(|(name, entry)| *name == index && entry == value)
            })
            .cloned()
            .collect();
        Ok(sorted_by_key(matches))
    }

    async fn list(&self) -> StorageResult<Vec<T>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_key(inner.records.values().cloned().collect()))
    }

    async fn snapshot(&self) -> StorageResult<Snapshot<T>> {
        let inner = self.inner.read().await;
        Ok(Snapshot {
            version: inner.version,
            records: sorted_by_key(inner.records.values().cloned().collect()),
        })
    }

    async fn commit(&self, expected_version: u64, records: Vec<T>) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.version != expected_version {
            return Ok(false);
        }
        inner.records = records.into_iter().map(|r| (r.key(), r)).collect();
        inner.version += 1;
        Ok(true)
    }

    async fn put(&self, record: T) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        inner.records.insert(record.key(), record);
        inner.version += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner.records.remove(key).is_some();
        if removed {
            inner.version += 1;
        }
        Ok(removed)
    }
}
