//! Key-addressed persistence for entity collections.
//!
//! Every entity type implements [`Record`] and is stored in its own
//! collection. A collection offers point lookups, secondary-index scans,
//! and a versioned snapshot/commit pair for multi-record mutations:
//! readers take a [`Snapshot`], compute the new collection contents, and
//! [`Collection::commit`] succeeds only if no other writer landed in
//! between. Adapters: [`MemoryCollection`] and [`JsonFileCollection`],
//! both exercised by the same contract suite.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::shared::error::{CoreError, CoreResult};

pub mod file;
pub mod memory;

pub use file::JsonFileCollection;
pub use memory::MemoryCollection;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A persistable entity. The primary key must be unique within the
/// collection; secondary index entries are (index name, value) pairs used
/// by [`Collection::find_by`].
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn key(&self) -> String;

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// A versioned view of a whole collection. The version changes on every
/// successful write, so a commit against a stale snapshot is rejected.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub version: u64,
    pub records: Vec<T>,
}

/// Storage contract per entity collection. `list` and `find_by` return
/// records in primary-key order.
#[async_trait]
pub trait Collection<T: Record>: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<T>>;

    async fn find_by(&self, index: &str, value: &str) -> StorageResult<Vec<T>>;

    async fn list(&self) -> StorageResult<Vec<T>>;

    async fn snapshot(&self) -> StorageResult<Snapshot<T>>;

    /// Replace the whole collection. Returns `false` when the collection
    /// has moved past `expected_version`, leaving it untouched.
    async fn commit(&self, expected_version: u64, records: Vec<T>) -> StorageResult<bool>;

    /// Upsert a single record by its primary key.
    async fn put(&self, record: T) -> StorageResult<()>;

    /// Returns whether a record was actually removed.
    async fn remove(&self, key: &str) -> StorageResult<bool>;
}

/// Bounded optimistic-retry budget for snapshot/commit mutations.
pub const MAX_COMMIT_ATTEMPTS: usize = 4;

/// Runs `apply` against a fresh snapshot until the commit lands or the
/// retry budget is exhausted, at which point the conflict surfaces to the
/// caller. Errors from `apply` abort immediately without committing.
pub async fn commit_with_retry<T, R, F>(
    collection: &Arc<dyn Collection<T>>,
    mut apply: F,
) -> CoreResult<R>
where
    T: Record,
    F: FnMut(&mut Vec<T>) -> CoreResult<R>,
{
    for _ in 0..MAX_COMMIT_ATTEMPTS {
        let Snapshot {
            version,
            mut records,
        } = collection.snapshot().await?;
        let value = apply(&mut records)?;
        if collection.commit(version, records).await? {
            return Ok(value);
        }
    }
    Err(CoreError::Conflict(format!(
        "collection {} kept changing underneath the update",
        T::COLLECTION
    )))
}
