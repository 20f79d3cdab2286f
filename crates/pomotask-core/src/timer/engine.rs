//! Pomodoro timer engine.
//!
//! A countdown state machine for one task. It does not own a thread: every
//! elapsed second is delivered by calling [`PomodoroEngine::tick`], either
//! from a [`TimerRunner`](super::TimerRunner) or directly in tests.
//!
//! ## State Transitions
//!
//! ```text
//! Work --expiry--> Break (short, or long every n-th work phase)
//! Break --expiry--> Work
//! any  --reset---> Work (fresh)
//! ```
//!
//! Finished work intervals are appended to the shared [`SessionCache`] when
//! the timer stops, whether by `stop()` or by expiry. Break time is never
//! recorded.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = PomodoroEngine::new(task_id, TimerConfig::default(), cache)?;
//! engine.start();
//! // Once per second:
//! let events = engine.tick();
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::phase::{Phase, TimerConfig};
use crate::error::Result;
use crate::events::Event;
use crate::session::{SessionCache, SessionRecord, TaskId};

/// Read-only view of the live countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub task_id: TaskId,
    pub time_left_secs: u64,
    pub is_running: bool,
    pub is_break: bool,
    pub completed_work_phases: u32,
    pub phase_started_at: Option<DateTime<Utc>>,
}

pub struct PomodoroEngine<C: Clock = SystemClock> {
    task_id: TaskId,
    config: TimerConfig,
    cache: Arc<SessionCache>,
    clock: C,
    time_left_secs: u64,
    is_running: bool,
    phase: Phase,
    completed_work_phases: u32,
    phase_started_at: Option<DateTime<Utc>>,
}

impl PomodoroEngine<SystemClock> {
    /// Create an engine for `task_id` reading wall-clock time.
    ///
    /// # Errors
    /// Fails if `config` has a zero-length phase or cycle.
    pub fn new(
        task_id: TaskId,
        config: TimerConfig,
        cache: Arc<SessionCache>,
    ) -> Result<Self> {
        Self::with_clock(task_id, config, cache, SystemClock)
    }
}

impl<C: Clock> PomodoroEngine<C> {
    pub fn with_clock(
        task_id: TaskId,
        config: TimerConfig,
        cache: Arc<SessionCache>,
        clock: C,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            time_left_secs: config.work_secs(),
            task_id,
            config,
            cache,
            clock,
            is_running: false,
            phase: Phase::Work,
            completed_work_phases: 0,
            phase_started_at: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn time_left_secs(&self) -> u64 {
        self.time_left_secs
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_break(&self) -> bool {
        self.phase == Phase::Break
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn completed_work_phases(&self) -> u32 {
        self.completed_work_phases
    }

    pub fn phase_started_at(&self) -> Option<DateTime<Utc>> {
        self.phase_started_at
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            task_id: self.task_id.clone(),
            time_left_secs: self.time_left_secs,
            is_running: self.is_running,
            is_break: self.is_break(),
            completed_work_phases: self.completed_work_phases,
            phase_started_at: self.phase_started_at,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin (or continue) counting down. No-op while already running.
    pub fn start(&mut self) -> Option<Event> {
        if self.is_running {
            return None;
        }
        let now = self.clock.now();
        self.phase_started_at = Some(now);
        self.is_running = true;
        debug!(task_id = %self.task_id, phase = ?self.phase, left = self.time_left_secs, "timer started");
        Some(Event::TimerStarted {
            task_id: self.task_id.clone(),
            phase: self.phase,
            time_left_secs: self.time_left_secs,
            at: now,
        })
    }

    /// Freeze the countdown and record the interval if it was work.
    ///
    /// Returns `TimerStopped`, or `SessionSaveFailed` if the cache refused the
    /// record; in both cases the timer is stopped afterwards. No-op while
    /// stopped.
    pub fn stop(&mut self) -> Option<Event> {
        if !self.is_running {
            return None;
        }
        let now = self.clock.now();
        match self.halt(now) {
            Ok(session) => Some(Event::TimerStopped {
                task_id: self.task_id.clone(),
                phase: self.phase,
                time_left_secs: self.time_left_secs,
                session,
                at: now,
            }),
            Err(failed) => Some(failed),
        }
    }

    /// Return to a fresh work phase. An in-flight interval is abandoned
    /// without being recorded.
    pub fn reset(&mut self) -> Option<Event> {
        self.is_running = false;
        self.phase = Phase::Work;
        self.time_left_secs = self.config.work_secs();
        self.completed_work_phases = 0;
        self.phase_started_at = None;
        debug!(task_id = %self.task_id, "timer reset");
        Some(Event::TimerReset {
            task_id: self.task_id.clone(),
            at: self.clock.now(),
        })
    }

    /// Advance the countdown by one second.
    ///
    /// Does nothing while stopped. When the countdown reaches zero the timer
    /// stops (recording a finished work phase) and the next phase is loaded;
    /// the returned events then end with `PhaseCompleted`, preceded by
    /// `SessionSaveFailed` if the record could not be cached.
    pub fn tick(&mut self) -> Vec<Event> {
        if !self.is_running {
            return Vec::new();
        }
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if self.time_left_secs > 0 {
            return Vec::new();
        }
        self.expire()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn expire(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let mut events = Vec::new();
        let session = match self.halt(now) {
            Ok(session) => session,
            Err(failed) => {
                events.push(failed);
                None
            }
        };

        let completed = self.phase;
        match completed {
            Phase::Work => {
                self.completed_work_phases += 1;
                self.time_left_secs = self.config.break_secs_after(self.completed_work_phases);
                self.phase = Phase::Break;
            }
            Phase::Break => {
                self.time_left_secs = self.config.work_secs();
                self.phase = Phase::Work;
            }
        }
        debug!(
            task_id = %self.task_id,
            completed = ?completed,
            next = ?self.phase,
            next_secs = self.time_left_secs,
            "phase completed"
        );

        events.push(Event::PhaseCompleted {
            task_id: self.task_id.clone(),
            completed,
            next: self.phase,
            next_secs: self.time_left_secs,
            completed_work_phases: self.completed_work_phases,
            session,
            at: now,
        });
        events
    }

    /// Shared stop logic. The timer is stopped on every path; a cache
    /// failure comes back as a ready-made `SessionSaveFailed` event.
    fn halt(&mut self, now: DateTime<Utc>) -> Result<Option<SessionRecord>, Event> {
        self.is_running = false;
        let Some(started_at) = self.phase_started_at.take() else {
            return Ok(None);
        };
        if self.phase == Phase::Break {
            return Ok(None);
        }

        let record = SessionRecord::new(self.task_id.clone(), started_at, now);
        match self.cache.save_session(record.clone()) {
            Ok(()) => {
                info!(task_id = %self.task_id, duration = record.duration(), "session recorded");
                Ok(Some(record))
            }
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "failed to cache session");
                Err(Event::SessionSaveFailed {
                    session: record,
                    error: e.to_string(),
                    at: now,
                })
            }
        }
    }
}
