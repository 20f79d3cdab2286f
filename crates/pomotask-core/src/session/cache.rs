//! Local session cache.
//!
//! Append-only list of [`SessionRecord`]s kept under one named key of a
//! [`SessionStore`]. Every mutation is a whole-list read-modify-write run
//! through [`SessionStore::update`], so caches in different threads or
//! processes that share one backing store never lose each other's appends.
//!
//! Records leave the cache only through [`SessionCache::clear_sessions`] or
//! [`SessionCache::take_sessions`], which reconciliation calls after the
//! records have been uploaded.

use std::collections::BTreeMap;

use tracing::debug;

use super::record::{SessionRecord, TaskId};
use crate::error::StorageError;
use crate::storage::SessionStore;

/// Key the serialized record list lives under.
pub const SESSIONS_KEY: &str = "pomodoro_sessions";

pub struct SessionCache {
    store: Box<dyn SessionStore>,
}

impl SessionCache {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// All stored records in insertion order. Empty if nothing was saved.
    pub fn get_sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        decode(self.store.load(SESSIONS_KEY)?)
    }

    /// Append one record.
    pub fn save_session(&self, record: SessionRecord) -> Result<(), StorageError> {
        debug!(
            task_id = %record.task_id(),
            duration = record.duration(),
            "caching session"
        );
        self.store.update(SESSIONS_KEY, &mut |raw| {
            let mut sessions = decode(raw)?;
            sessions.push(record.clone());
            encode(&sessions).map(Some)
        })
    }

    /// Total worked seconds recorded for `task_id`, 0 if none.
    pub fn worked_seconds(&self, task_id: &TaskId) -> Result<u64, StorageError> {
        Ok(self
            .get_sessions()?
            .iter()
            .filter(|s| s.task_id() == task_id)
            .map(SessionRecord::duration)
            .sum())
    }

    /// Worked seconds for every task that has at least one record.
    pub fn worked_by_task(&self) -> Result<BTreeMap<TaskId, u64>, StorageError> {
        let mut totals = BTreeMap::new();
        for session in self.get_sessions()? {
            *totals.entry(session.task_id().clone()).or_insert(0) += session.duration();
        }
        Ok(totals)
    }

    /// Drop every record unconditionally.
    ///
    /// Only call this once the records are safely stored elsewhere; the cache
    /// cannot tell whether they were.
    pub fn clear_sessions(&self) -> Result<(), StorageError> {
        self.store.update(SESSIONS_KEY, &mut |_| Ok(None))
    }

    /// Remove and return the oldest `count` records.
    ///
    /// Records appended after the caller's snapshot stay in place, which
    /// makes this the safe way to acknowledge a partial upload.
    pub fn take_sessions(&self, count: usize) -> Result<Vec<SessionRecord>, StorageError> {
        let mut taken = Vec::new();
        self.store.update(SESSIONS_KEY, &mut |raw| {
            let mut sessions = decode(raw)?;
            let count = count.min(sessions.len());
            taken = sessions.drain(..count).collect();
            if sessions.is_empty() {
                Ok(None)
            } else {
                encode(&sessions).map(Some)
            }
        })?;
        Ok(taken)
    }
}

fn decode(raw: Option<String>) -> Result<Vec<SessionRecord>, StorageError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            key: SESSIONS_KEY.into(),
            message: e.to_string(),
        }),
    }
}

fn encode(sessions: &[SessionRecord]) -> Result<String, StorageError> {
    serde_json::to_string(sessions).map_err(|e| StorageError::Corrupt {
        key: SESSIONS_KEY.into(),
        message: e.to_string(),
    })
}
