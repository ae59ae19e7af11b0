//! In-memory key-value store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{KeyValueStore, StorageError, validate_key};

/// A write applied to a [`MemoryStore`], in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRecord {
    /// `save(key, value)` succeeded.
    Save { key: String, value: String },
    /// `remove(key)` succeeded.
    Remove { key: String },
}

/// Process-local store.
///
/// Besides backing ephemeral carts, it can simulate a misbehaving device:
/// reads or writes can be made to fail, and writes can be held until released.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<WriteRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_gate: watch::Sender<bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_gate: watch::Sender::new(true),
        }
    }

    /// A store pre-seeded with one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        lock(&store.entries).insert(key.to_owned(), value.to_owned());
        store
    }

    /// Make subsequent reads fail (`true`) or succeed (`false`).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail (`true`) or succeed (`false`).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every write until [`Self::resume_writes`] is called.
    pub fn pause_writes(&self) {
        self.write_gate.send_replace(false);
    }

    /// Release held writes.
    pub fn resume_writes(&self) {
        self.write_gate.send_replace(true);
    }

    /// Current value under `key`, bypassing failure injection.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    /// Successful writes so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        lock(&self.writes).clone()
    }

    async fn admit_write(&self) -> Result<(), StorageError> {
        let mut gate = self.write_gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| StorageError::Unavailable("store dropped".to_owned()))?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("simulated write failure".to_owned()));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("simulated read failure".to_owned()));
        }
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.admit_write().await?;
        lock(&self.entries).insert(key.to_owned(), value.to_owned());
        lock(&self.writes).push(WriteRecord::Save {
            key: key.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.admit_write().await?;
        lock(&self.entries).remove(key);
        lock(&self.writes).push(WriteRecord::Remove {
            key: key.to_owned(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_write_log() {
        let store = MemoryStore::new();
        store.save("cart", "a").await.unwrap();
        store.remove("cart").await.unwrap();
        assert!(store.load("cart").await.unwrap().is_none());
        assert_eq!(
            store.writes(),
            vec![
                WriteRecord::Save {
                    key: "cart".into(),
                    value: "a".into()
                },
                WriteRecord::Remove { key: "cart".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::with_entry("cart", "[]");
        store.fail_reads(true);
        assert!(store.load("cart").await.is_err());

        store.fail_writes(true);
        assert!(store.save("cart", "x").await.is_err());
        assert_eq!(store.get("cart").as_deref(), Some("[]"));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_paused_writes_wait_for_resume() {
        let store = Arc::new(MemoryStore::new());
        store.pause_writes();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.save("cart", "held").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get("cart").is_none());

        store.resume_writes();
        writer.await.unwrap().unwrap();
        assert_eq!(store.get("cart").as_deref(), Some("held"));
    }
}
