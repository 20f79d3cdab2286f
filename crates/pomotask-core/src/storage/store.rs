//! Pluggable key-value backends for the session cache.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;

/// Rewrites one stored value. Receives the current value (`None` if absent)
/// and returns the replacement (`None` deletes the key).
pub type UpdateFn<'a> =
    dyn FnMut(Option<String>) -> Result<Option<String>, StorageError> + 'a;

/// A named-value store, scoped to the local device.
///
/// [`update`](Self::update) must be atomic against every other writer of the
/// same backing storage, including other store instances and processes.
pub trait SessionStore: Send + Sync {
    /// Read the value under `key`, `None` if never written or removed.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`.
    fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Read, rewrite and write back the value under `key` as one atomic step.
    /// An error from `apply` leaves the stored value untouched.
    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<(), StorageError>;
}

/// In-process store, used in tests and for ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        match apply(values.get(key).cloned())? {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };
        Ok(())
    }
}
