//! Expiry sweeper
//!
//! Periodically removes credentials whose expiry has passed, dropping their
//! publisher first when one is running.
//!
//! A cycle scans under the read lock, releases it, then handles each expired
//! identifier with separate write operations. A record changed in between
//! (e.g. re-activated) is still revoked and removed; the window is bounded by
//! local lock hold times and the worst case is one stale revoke/remove.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::control::client::log_drop_result;
use crate::control::{ControlClient, DropOutcome};
use crate::registry::{CredentialStore, StreamId};

/// Outcome of one sweep cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Identifiers found expired by the scan
    pub expired: Vec<StreamId>,
    /// Identifiers actually removed
    pub removed: Vec<StreamId>,
    /// Publishers dropped on the relay
    pub dropped: usize,
}

/// Background reclamation of time-limited credentials
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<CredentialStore>,
    control: ControlClient,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper running every `interval`
    pub fn new(store: Arc<CredentialStore>, control: ControlClient, interval: Duration) -> Self {
        Self {
            store,
            control,
            // tokio intervals cannot be zero
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Get the sweep interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle against the current time
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now().timestamp()).await
    }

    /// Run one cycle treating `now` (Unix seconds) as the current time
    pub async fn sweep_at(&self, now: i64) -> SweepReport {
        let expired = self.store.expired(now).await;
        let mut report = SweepReport {
            expired: expired.clone(),
            ..Default::default()
        };

        for id in expired {
            if let Ok(key) = self.store.get_app_name(&id).await {
                tracing::info!(id = %id, stream = %key, "Expiring stream");
            }

            let result = self.control.drop_publisher(&self.store, &id).await;
            log_drop_result(&id, &result);
            if let Ok(DropOutcome::Dropped) = result {
                report.dropped += 1;
            }

            match self.store.remove_stream(&id).await {
                Ok(_) => report.removed.push(id),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Failed to remove expired stream");
                }
            }
        }

        report
    }

    /// Run cycles every interval until `shutdown` completes
    ///
    /// Shutdown is only observed between cycles, so a running cycle always
    /// finishes its registry writes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Expiry sweeper started");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let report = self.sweep().await;
                    tracing::debug!(
                        expired = report.expired.len(),
                        removed = report.removed.len(),
                        dropped = report.dropped,
                        "Sweep cycle done"
                    );
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }

    /// Spawn the sweeper as a background task
    ///
    /// Dropping the returned handle also stops the sweeper.
    pub fn spawn(self) -> SweeperHandle {
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            self.run_until(async {
                let _ = stopped.await;
            })
            .await;
        });

        SweeperHandle { stop, task }
    }
}

/// Handle to a spawned [`ExpirySweeper`]
pub struct SweeperHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait up to `grace` for its current cycle
    ///
    /// Returns `false` if the cycle was still running when `grace` ran out;
    /// the task then finishes on its own.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let _ = self.stop.send(());
        match tokio::time::timeout(grace, self.task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "Sweep cycle still running at shutdown");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::registry::{Expiry, NewStream};

    const NOW: i64 = 1_700_000_000;

    async fn setup() -> (tempfile::TempDir, Arc<CredentialStore>, ExpirySweeper) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CredentialStore::open(dir.path().join("store.db")).await.unwrap());
        let control = ControlClient::new(Duration::from_millis(200), RetryPolicy::none()).unwrap();
        let sweeper = ExpirySweeper::new(Arc::clone(&store), control, Duration::from_millis(20));
        (dir, store, sweeper)
    }

    #[tokio::test]
    async fn test_sweep_removes_exactly_expired() {
        let (_dir, store, sweeper) = setup().await;
        let never = store.add_stream(NewStream::new("live", "a", "k")).await.unwrap();
        let past = store
            .add_stream(NewStream::new("live", "b", "k").expiry(Expiry::at(NOW - 2)))
            .await
            .unwrap();
        let edge = store
            .add_stream(NewStream::new("live", "c", "k").expiry(Expiry::at(NOW)))
            .await
            .unwrap();
        let future = store
            .add_stream(NewStream::new("live", "d", "k").expiry(Expiry::at(NOW + 1)))
            .await
            .unwrap();

        let report = sweeper.sweep_at(NOW).await;
        assert_eq!(report.expired, vec![past.clone(), edge.clone()]);
        assert_eq!(report.removed, vec![past, edge]);
        assert_eq!(report.dropped, 0);

        let remaining: Vec<_> = store.streams().await.into_iter().map(|s| s.id).collect();
        assert_eq!(remaining, vec![never, future]);
    }

    #[tokio::test]
    async fn test_sweep_without_control_url_removes_active() {
        let (_dir, store, sweeper) = setup().await;
        let id = store
            .add_stream(NewStream::new("live", "s1", "k").expiry(Expiry::at(NOW - 2)))
            .await
            .unwrap();
        store.set_active(&id).await.unwrap();

        let report = sweeper.sweep_at(NOW).await;
        assert_eq!(report.removed, vec![id]);
        assert_eq!(report.dropped, 0);
        assert_eq!(store.stream_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_empty_store() {
        let (_dir, _store, sweeper) = setup().await;
        assert_eq!(sweeper.sweep_at(NOW).await, SweepReport::default());
    }

    #[tokio::test]
    async fn test_spawned_sweeper_reclaims_and_stops() {
        let (_dir, store, sweeper) = setup().await;
        store
            .add_stream(NewStream::new("live", "s1", "k").expiry(Expiry::at(1)))
            .await
            .unwrap();

        let handle = sweeper.spawn();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while store.stream_count().await > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(store.stream_count().await, 0);
        assert!(handle.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let (_dir, store, _) = setup().await;
        let control = ControlClient::new(Duration::from_secs(1), RetryPolicy::none()).unwrap();
        let sweeper = ExpirySweeper::new(store, control, Duration::ZERO);
        assert_eq!(sweeper.interval(), Duration::from_millis(1));
    }
}
