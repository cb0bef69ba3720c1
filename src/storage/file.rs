//! Flat-file collection: one JSON document per collection, rewritten
//! whole on every mutation. Writes go through a temp file and rename so
//! readers never observe a partial document.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{Collection, Record, Snapshot, StorageResult};

pub struct JsonFileCollection<T: Record> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u64,
    records: Vec<T>,
}

impl<T: Record> JsonFileCollection<T> {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(format!("{}.json", T::COLLECTION)),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    async fn load(&self) -> StorageResult<Envelope<T>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Envelope {
                version: 0,
                records: Vec::new(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, envelope: &Envelope<T>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(envelope)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn sorted_by_key<T: Record>(mut records: Vec<T>) -> Vec<T> {
    records.sort_by_key(|r| r.key());
    records
}

#[async_trait]
impl<T: Record> Collection<T> for JsonFileCollection<T> {
    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let envelope = self.load().await?;
        Ok(envelope.records.into_iter().find(|r| r.key() == key))
    }

    async fn find_by(&self, index: &str, value: &str) -> StorageResult<Vec<T>> {
        let envelope = self.load().await?;
        let matches = envelope
            .records
            .into_iter()
            .filter(|r| {
                r.index_entries()
                    .iter()
                    .any(|(name, entry)| *name == index && entry == value)
            })
            .collect();
        Ok(sorted_by_key(matches))
    }

    async fn list(&self) -> StorageResult<Vec<T>> {
        let envelope = self.load().await?;
        Ok(sorted_by_key(envelope.records))
    }

    async fn snapshot(&self) -> StorageResult<Snapshot<T>> {
        let envelope = self.load().await?;
        Ok(Snapshot {
            version: envelope.version,
            records: sorted_by_key(envelope.records),
        })
    }

    async fn commit(&self, expected_version: u64, records: Vec<T>) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let envelope = self.load().await?;
        if envelope.version != expected_version {
            return Ok(false);
        }
        self.save(&Envelope {
            version: envelope.version + 1,
            records,
        })
        .await?;
        Ok(true)
    }

    async fn put(&self, record: T) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut envelope = self.load().await?;
        let key = record.key();
        envelope.records.retain(|r| r.key() != key);
        envelope.records.push(record);
        envelope.version += 1;
        self.save(&envelope).await
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut envelope = self.load().await?;
        let before = envelope.records.len();
        envelope.records.retain(|r| r.key() != key);
        if envelope.records.len() == before {
            return Ok(false);
        }
        envelope.version += 1;
        self.save(&envelope).await?;
        Ok(true)
    }
}
