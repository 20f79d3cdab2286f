//! Drives a [`PomodoroEngine`] from a one-second tokio interval.
//!
//! The ticker task exists only while the engine is running. It is aborted on
//! stop, on reset, when the phase expires, and when the runner is dropped, so
//! no tick can reach an engine whose owner is gone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::engine::{PomodoroEngine, TimerSnapshot};
use crate::events::Event;

const EVENT_CAPACITY: usize = 64;

pub struct TimerRunner<C: Clock + 'static = SystemClock> {
    engine: Arc<Mutex<PomodoroEngine<C>>>,
    events: broadcast::Sender<Event>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
}

impl<C: Clock + 'static> TimerRunner<C> {
    /// Take ownership of `engine`.
    pub fn new(engine: PomodoroEngine<C>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            events,
            ticker: Mutex::new(None),
            tick_interval: Duration::from_secs(1),
        }
    }

    /// Receive every event produced from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.engine.lock().await.snapshot()
    }

    /// Start the engine and its ticker. Must be called inside a tokio
    /// runtime, since the ticker is a spawned task.
    pub async fn start(&self) -> Option<Event> {
        // The ticker slot is held across the engine command so the ticker
        // always matches the engine's running state.
        let mut ticker = self.ticker.lock().await;
        let event = self.engine.lock().await.start()?;
        self.publish(&event);
        self.spawn_ticker(&mut ticker);
        Some(event)
    }

    pub async fn stop(&self) -> Option<Event> {
        let mut ticker = self.ticker.lock().await;
        let event = self.engine.lock().await.stop();
        cancel_ticker(&mut ticker);
        if let Some(ref event) = event {
            self.publish(event);
        }
        event
    }

    pub async fn reset(&self) -> Option<Event> {
        let mut ticker = self.ticker.lock().await;
        let event = self.engine.lock().await.reset();
        cancel_ticker(&mut ticker);
        if let Some(ref event) = event {
            self.publish(event);
        }
        event
    }

    fn publish(&self, event: &Event) {
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
    }

    fn spawn_ticker(&self, slot: &mut Option<JoinHandle<()>>) {
        cancel_ticker(slot);

        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            // Ticks missed while the process was suspended are replayed so the
            // countdown tracks elapsed time.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;

                let (produced, still_running) = {
                    let mut guard = engine.lock().await;
                    if !guard.is_running() {
                        break;
                    }
                    let produced = guard.tick();
                    (produced, guard.is_running())
                };

                for event in produced {
                    let _ = events.send(event);
                }
                if !still_running {
                    debug!("phase expired, ticker exiting");
                    break;
                }
            }
        });

        *slot = Some(handle);
    }
}

fn cancel_ticker(slot: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = slot.take() {
        handle.abort();
    }
}

impl<C: Clock + 'static> Drop for TimerRunner<C> {
    fn drop(&mut self) {
        cancel_ticker(self.ticker.get_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionCache, TaskId};
    use crate::storage::MemoryStore;
    use crate::timer::{Phase, TimerConfig};
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn runner(work_minutes: u32) -> (TimerRunner, Arc<SessionCache>) {
        let cache = Arc::new(SessionCache::new(MemoryStore::new()));
        let config = TimerConfig {
            work_minutes,
            ..TimerConfig::default()
        };
        let engine =
            PomodoroEngine::new(TaskId::new("runner-task").unwrap(), config, Arc::clone(&cache))
                .unwrap();
        (TimerRunner::new(engine), cache)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second() {
        let (runner, _cache) = runner(25);
        runner.start().await;
        time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(runner.snapshot().await.time_left_secs, 25 * 60 - 10);
        runner.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_countdown() {
        let (runner, cache) = runner(25);
        runner.start().await;
        time::sleep(Duration::from_millis(5_500)).await;
        assert!(matches!(runner.stop().await, Some(Event::TimerStopped { .. })));
        time::sleep(Duration::from_secs(30)).await;

        let snap = runner.snapshot().await;
        assert!(!snap.is_running);
        assert_eq!(snap.time_left_secs, 25 * 60 - 5);
        assert_eq!(cache.get_sessions().unwrap().len(), 1);
        assert!(runner.stop().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_publishes_phase_completed_and_stops() {
        let (runner, cache) = runner(1);
        let mut rx = runner.subscribe();
        runner.start().await;
        assert!(matches!(rx.recv().await, Ok(Event::TimerStarted { .. })));

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            Event::PhaseCompleted {
                completed: Phase::Work,
                next: Phase::Break,
                next_secs: 300,
                completed_work_phases: 1,
                ..
            }
        ));

        let snap = runner.snapshot().await;
        assert!(snap.is_break);
        assert!(!snap.is_running);
        assert_eq!(cache.get_sessions().unwrap().len(), 1);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runner.snapshot().await.time_left_secs, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_ticker_and_discards_interval() {
        let (runner, cache) = runner(25);
        runner.start().await;
        time::sleep(Duration::from_millis(60_500)).await;
        runner.reset().await;
        time::sleep(Duration::from_secs(5)).await;

        let snap = runner.snapshot().await;
        assert_eq!(snap.time_left_secs, 25 * 60);
        assert!(!snap.is_running);
        assert!(cache.get_sessions().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_start_and_stop_leave_a_live_ticker_when_running() {
        for _ in 0..50 {
            let (runner, _cache) = runner(25);
            let runner = Arc::new(runner);
            runner.start().await;

            let stopper = tokio::spawn({
                let runner = Arc::clone(&runner);
                async move { runner.stop().await }
            });
            let starter = tokio::spawn({
                let runner = Arc::clone(&runner);
                async move { runner.start().await }
            });
            stopper.await.unwrap();
            starter.await.unwrap();

            let ticker = runner.ticker.lock().await;
            let running = runner.engine.lock().await.is_running();
            let ticking = ticker.as_ref().is_some_and(|h| !h.is_finished());
            assert_eq!(running, ticking);
            drop(ticker);
            runner.stop().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_runner_cancels_ticker() {
        let (runner, _cache) = runner(1);
        let mut rx = runner.subscribe();
        runner.start().await;
        drop(runner);
        time::sleep(Duration::from_secs(120)).await;

        assert!(matches!(rx.try_recv(), Ok(Event::TimerStarted { .. })));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }
}
