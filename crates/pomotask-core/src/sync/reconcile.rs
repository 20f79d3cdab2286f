//! Moves cached sessions into durable storage.

use serde::Serialize;
use tracing::{info, warn};

use super::sink::SessionSink;
use crate::error::{Result, SyncError};
use crate::session::SessionCache;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub uploaded: usize,
    pub uploaded_seconds: u64,
}

/// Upload every cached session in insertion order, then drop exactly the
/// uploaded records from the cache.
///
/// Sessions cached while the upload is in flight are left for the next run.
/// If an upload fails, the records before it are still removed and the
/// error reports how far the run got.
pub async fn reconcile<S: SessionSink>(
    cache: &SessionCache,
    sink: &S,
) -> Result<ReconcileReport> {
    let pending = cache.get_sessions()?;
    let total = pending.len();
    let mut report = ReconcileReport::default();

    for record in &pending {
        if let Err(e) = sink.upload(record).await {
            warn!(
                task_id = %record.task_id(),
                uploaded = report.uploaded,
                total,
                error = %e,
                "session upload failed"
            );
            cache.take_sessions(report.uploaded)?;
            return Err(SyncError::Partial {
                uploaded: report.uploaded,
                total,
                source: Box::new(e),
            }
            .into());
        }
        report.uploaded += 1;
        report.uploaded_seconds += record.duration();
    }

    cache.take_sessions(total)?;
    info!(uploaded = report.uploaded, seconds = report.uploaded_seconds, "sessions reconciled");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::session::{SessionRecord, TaskId};
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    fn record(task: &str, secs: i64) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        SessionRecord::new(TaskId::new(task).unwrap(), start, start + Duration::seconds(secs))
    }

    /// Keeps uploads in memory; fails once `fail_at` uploads have succeeded.
    #[derive(Default)]
    struct MemorySink {
        received: Mutex<Vec<SessionRecord>>,
        fail_at: Option<usize>,
    }

    impl SessionSink for MemorySink {
        async fn upload(&self, record: &SessionRecord) -> Result<(), SyncError> {
            let mut received = self.received.lock().unwrap();
            if Some(received.len()) == self.fail_at {
                return Err(SyncError::Rejected {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            received.push(record.clone());
            Ok(())
        }
    }

    fn seeded_cache() -> SessionCache {
        let cache = SessionCache::new(MemoryStore::new());
        cache.save_session(record("a", 10)).unwrap();
        cache.save_session(record("b", 20)).unwrap();
        cache.save_session(record("a", 30)).unwrap();
        cache
    }

    #[tokio::test]
    async fn uploads_in_order_then_clears() {
        let cache = seeded_cache();
        let sink = MemorySink::default();

        let report = reconcile(&cache, &sink).await.unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                uploaded: 3,
                uploaded_seconds: 60
            }
        );
        let durations: Vec<u64> = sink
            .received
            .lock()
            .unwrap()
            .iter()
            .map(SessionRecord::duration)
            .collect();
        assert_eq!(durations, vec![10, 20, 30]);
        assert!(cache.get_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_unsent_records() {
        let cache = seeded_cache();
        let sink = MemorySink {
            fail_at: Some(1),
            ..MemorySink::default()
        };

        let err = reconcile(&cache, &sink).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Sync(SyncError::Partial {
                uploaded: 1,
                total: 3,
                ..
            })
        ));
        let left: Vec<u64> = cache
            .get_sessions()
            .unwrap()
            .iter()
            .map(SessionRecord::duration)
            .collect();
        assert_eq!(left, vec![20, 30]);
    }

    #[tokio::test]
    async fn empty_cache_is_a_noop() {
        let cache = SessionCache::new(MemoryStore::new());
        let report = reconcile(&cache, &MemorySink::default()).await.unwrap();
        assert_eq!(report, ReconcileReport::default());
    }
}
