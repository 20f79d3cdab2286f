//! Session records: one contiguous interval of worked time on a task.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque, non-empty identifier of the task a session is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyTaskId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl FromStr for TaskId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable record of one stopped or completed work interval.
///
/// `duration` is derived from the bounding timestamps and is always whole
/// seconds, so `ended_at - started_at == duration` holds for every record,
/// including ones decoded from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSessionRecord")]
pub struct SessionRecord {
    task_id: TaskId,
    duration: u64,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Build a record for the interval `[started_at, stopped_at)`.
    ///
    /// The duration is the floor of the elapsed seconds; `ended_at` is
    /// truncated to `started_at + duration`. A clock that went backwards
    /// yields a zero-length record.
    pub fn new(task_id: TaskId, started_at: DateTime<Utc>, stopped_at: DateTime<Utc>) -> Self {
        let elapsed_ms = (stopped_at - started_at).num_milliseconds().max(0);
        let duration = (elapsed_ms / 1000) as u64;
        Self {
            task_id,
            duration,
            started_at,
            ended_at: started_at + Duration::seconds(duration as i64),
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Worked time in whole seconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSessionRecord {
    task_id: TaskId,
    duration: u64,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl TryFrom<RawSessionRecord> for SessionRecord {
    type Error = String;

    fn try_from(raw: RawSessionRecord) -> Result<Self, Self::Error> {
        let exact = i64::try_from(raw.duration)
            .ok()
            .and_then(Duration::try_seconds)
            .is_some_and(|d| raw.ended_at - raw.started_at == d);
        if !exact {
            return Err(format!(
                "duration {} does not match interval {}..{}",
                raw.duration, raw.started_at, raw.ended_at
            ));
        }
        Ok(Self {
            task_id: raw.task_id,
            duration: raw.duration,
            started_at: raw.started_at,
            ended_at: raw.ended_at,
        })
    }
}
