use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{SessionRecord, TaskId};
use crate::timer::Phase;

/// Every state change of a timer produces an Event.
/// The CLI prints them; observers subscribe through the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        task_id: TaskId,
        phase: Phase,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        task_id: TaskId,
        phase: Phase,
        time_left_secs: u64,
        /// The work interval written to the cache, if any.
        session: Option<SessionRecord>,
        at: DateTime<Utc>,
    },
    /// The cache refused a finished work interval. The timer is stopped
    /// regardless; the record is carried here so the caller can retry.
    SessionSaveFailed {
        session: SessionRecord,
        error: String,
        at: DateTime<Utc>,
    },
    /// A phase counted down to zero and the next one is loaded.
    PhaseCompleted {
        task_id: TaskId,
        completed: Phase,
        next: Phase,
        next_secs: u64,
        completed_work_phases: u32,
        session: Option<SessionRecord>,
        at: DateTime<Utc>,
    },
    TimerReset {
        task_id: TaskId,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The record a failed save left uncached, if this is such an event.
    pub fn unsaved_session(&self) -> Option<&SessionRecord> {
        match self {
            Event::SessionSaveFailed { session, .. } => Some(session),
            _ => None,
        }
    }
}
