//! End-to-end: engines recording into a SQLite-backed cache, then
//! reconciliation draining it.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use pomotask_core::timer::ManualClock;
use pomotask_core::{
    reconcile, Event, PomodoroEngine, SessionCache, SessionRecord, SessionSink, SqliteStore,
    SyncError, TaskId, TimerConfig,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn engine_for(
    task: &str,
    cache: &Arc<SessionCache>,
    clock: &ManualClock,
) -> PomodoroEngine<ManualClock> {
    PomodoroEngine::with_clock(
        TaskId::new(task).unwrap(),
        TimerConfig::default(),
        Arc::clone(cache),
        clock.clone(),
    )
    .unwrap()
}

fn tick_for(engine: &mut PomodoroEngine<ManualClock>, clock: &ManualClock, secs: u64) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..secs {
        clock.advance(Duration::seconds(1));
        events.extend(engine.tick());
    }
    events
}

#[derive(Default)]
struct CollectingSink {
    uploaded: Mutex<Vec<SessionRecord>>,
}

impl SessionSink for CollectingSink {
    async fn upload(&self, record: &SessionRecord) -> Result<(), SyncError> {
        self.uploaded.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[test]
fn ninety_second_stop_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomotask.db");
    let clock = ManualClock::new(t0());

    {
        let cache = Arc::new(SessionCache::new(SqliteStore::open_at(&path).unwrap()));
        let mut engine = engine_for("essay", &cache, &clock);
        engine.start();
        tick_for(&mut engine, &clock, 90);
        engine.stop();
        assert_eq!(engine.time_left_secs(), 1410);
    }

    let cache = SessionCache::new(SqliteStore::open_at(&path).unwrap());
    let sessions = cache.get_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration(), 90);
    assert_eq!(sessions[0].started_at(), t0());
    assert_eq!(sessions[0].ended_at(), t0() + Duration::seconds(90));
}

#[test]
fn natural_expiry_flips_to_break() {
    let cache = Arc::new(SessionCache::new(SqliteStore::open_memory().unwrap()));
    let clock = ManualClock::new(t0());
    let mut engine = engine_for("essay", &cache, &clock);

    engine.start();
    let events = tick_for(&mut engine, &clock, 25 * 60);

    assert!(engine.is_break());
    assert_eq!(engine.completed_work_phases(), 1);
    assert_eq!(engine.time_left_secs(), 300);
    assert_eq!(events.len(), 1);
    assert_eq!(
        cache.worked_seconds(&TaskId::new("essay").unwrap()).unwrap(),
        25 * 60
    );
}

#[tokio::test]
async fn two_tasks_then_reconcile() {
    let cache = Arc::new(SessionCache::new(SqliteStore::open_memory().unwrap()));
    let clock = ManualClock::new(t0());
    let mut essay = engine_for("essay", &cache, &clock);
    let mut email = engine_for("email", &cache, &clock);

    essay.start();
    tick_for(&mut essay, &clock, 300);
    essay.stop();

    email.start();
    tick_for(&mut email, &clock, 120);
    email.reset();

    email.start();
    tick_for(&mut email, &clock, 45);
    email.stop();

    assert_eq!(cache.worked_seconds(&TaskId::new("essay").unwrap()).unwrap(), 300);
    assert_eq!(cache.worked_seconds(&TaskId::new("email").unwrap()).unwrap(), 45);

    let sink = CollectingSink::default();
    let report = reconcile(&cache, &sink).await.unwrap();
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.uploaded_seconds, 345);
    assert!(cache.get_sessions().unwrap().is_empty());
    assert_eq!(sink.uploaded.lock().unwrap()[0].task_id().as_str(), "essay");
}
