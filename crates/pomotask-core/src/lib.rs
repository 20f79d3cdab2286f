//! # Pomotask Core Library
//!
//! Business logic for Pomotask's per-task focus timer. Like the CLI built on
//! top of it, the library is usable on its own: every operation the binary
//! exposes is a plain call here.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a countdown state machine alternating work and break
//!   phases; the caller (or a [`TimerRunner`]) delivers one `tick()` per second
//! - **Session Cache**: append-only local list of worked intervals, shared by
//!   every engine in the process
//! - **Storage**: pluggable key-value backends (in-memory, SQLite) and
//!   TOML-based configuration
//! - **Sync**: uploads cached sessions to a server and acknowledges them
//!
//! ## Key Components
//!
//! - [`PomodoroEngine`]: core timer state machine
//! - [`SessionCache`]: local session store with per-task aggregation
//! - [`Config`]: application configuration management
//! - [`reconcile`]: drain the cache into a [`SessionSink`]

pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod sync;
pub mod timer;

pub use error::{ConfigError, CoreError, StorageError, SyncError, ValidationError};
pub use events::Event;
pub use session::{SessionCache, SessionRecord, TaskId};
pub use storage::{Config, MemoryStore, SessionStore, SqliteStore};
pub use sync::{reconcile, HttpSink, ReconcileReport, SessionSink};
pub use timer::{Phase, PomodoroEngine, TimerConfig, TimerRunner, TimerSnapshot};
