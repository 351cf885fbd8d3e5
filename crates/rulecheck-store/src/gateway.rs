//! Key-value persistence boundary.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock};

use crate::StoreError;
use crate::file::FileLock;

/// Well-known keys.
pub mod keys {
    /// JSON array of rules.
    pub const RULES: &str = "rules";
    /// Plain-text system prompt.
    pub const SYSTEM_PROMPT: &str = "system_prompt";
    /// Plain-text bearer credential for the completion endpoint.
    pub const CREDENTIAL: &str = "credential";
    /// Plain-text subject matter being evaluated.
    pub const SUBJECT_MATTER: &str = "subject_matter";
}

/// Durable string blobs addressed by key.
///
/// Implementations must make each `set` atomic: a reader sees either the old
/// value or the new one, never a mix.
pub trait PersistenceGateway: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key. Absent keys are not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Take the storage-wide write lock, blocking until it is free.
    ///
    /// Every handle on the same storage (another gateway, another process)
    /// contends for the same lock. Hold it across a read-modify-write so
    /// concurrent writers cannot overwrite each other's changes.
    fn lock(&self) -> Result<GatewayLock<'_>, StoreError>;
}

/// Exclusive hold on a gateway's storage. Released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct GatewayLock<'a> {
    _held: Held<'a>,
}

// Guards are held only for their drop.
#[allow(dead_code)]
enum Held<'a> {
    Memory(MutexGuard<'a, ()>),
    File(FileLock),
}

impl<'a> GatewayLock<'a> {
    fn memory(guard: MutexGuard<'a, ()>) -> Self {
        Self {
            _held: Held::Memory(guard),
        }
    }

    pub(crate) fn file(lock: FileLock) -> Self {
        Self {
            _held: Held::File(lock),
        }
    }
}

/// Keys become file names, so keep them to a conservative alphabet.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// In-process gateway. Nothing survives the process; used for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    entries: RwLock<HashMap<String, String>>,
    writer: Mutex<()>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Other("memory gateway lock poisoned".into())
}

impl PersistenceGateway for MemoryGateway {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn lock(&self) -> Result<GatewayLock<'_>, StoreError> {
        let guard = self.writer.lock().map_err(poisoned)?;
        Ok(GatewayLock::memory(guard))
    }
}
