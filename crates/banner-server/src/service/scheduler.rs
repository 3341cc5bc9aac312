//! Transition scheduler
//!
//! Fires flag enable/disable transitions at their wall-clock times. One
//! tokio task per armed (overlay, kind) pair, tracked in a keyed map:
//! scheduling over an existing pair supersedes (aborts) the old task, a
//! manual toggle cancels both of the overlay's pairs. The executor
//! re-reads the overlay at firing time, so a fire after cancellation is a
//! no-op and a duplicate fire is harmless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use banner_persistence::service::flag::TransitionKind;

/// Maximum firing attempts before the transition is abandoned.
const MAX_ATTEMPTS: u32 = 5;
/// Base of the exponential retry backoff.
const RETRY_BASE_SECS: u64 = 2;

/// Applies a fired transition. The production implementation re-reads the
/// overlay and writes through the config store; tests substitute a
/// recorder.
#[async_trait]
pub trait TransitionExecutor: Send + Sync + 'static {
    async fn fire(&self, overlay_id: Uuid, kind: TransitionKind) -> anyhow::Result<()>;
}

pub struct TransitionScheduler {
    executor: Arc<dyn TransitionExecutor>,
    handles: Arc<DashMap<(Uuid, TransitionKind), JoinHandle<()>>>,
}

impl TransitionScheduler {
    pub fn new(executor: Arc<dyn TransitionExecutor>) -> Self {
        Self {
            executor,
            handles: Arc::new(DashMap::new()),
        }
    }

    /// Arm (or re-arm) a transition. A previous handle for the same
    /// (overlay, kind) is superseded.
    pub fn schedule(&self, overlay_id: Uuid, kind: TransitionKind, at: DateTime<Utc>) {
        if let Some((_, old)) = self.handles.remove(&(overlay_id, kind)) {
            old.abort();
        }

        let delay = (at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        debug!(%overlay_id, kind = kind.as_str(), delay_secs = delay.as_secs(), "arming transition");

        let executor = self.executor.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            for attempt in 1..=MAX_ATTEMPTS {
                match executor.fire(overlay_id, kind).await {
                    Ok(()) => {
                        info!(%overlay_id, kind = kind.as_str(), "transition fired");
                        return;
                    }
                    Err(err) if attempt < MAX_ATTEMPTS => {
                        let backoff = Duration::from_secs(RETRY_BASE_SECS.pow(attempt));
                        warn!(
                            %overlay_id,
                            kind = kind.as_str(),
                            attempt,
                            error = %err,
                            backoff_secs = backoff.as_secs(),
                            "transition attempt failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    Err(err) => {
                        // Terminal: surfaces via logs and audit, never to
                        // the decision path.
                        error!(
                            %overlay_id,
                            kind = kind.as_str(),
                            error = %err,
                            "transition abandoned after {} attempts",
                            MAX_ATTEMPTS
                        );
                        return;
                    }
                }
            }
        });

        self.handles.insert((overlay_id, kind), handle);
    }

    /// Cancel both pending transitions of an overlay (manual toggle path).
    pub fn cancel(&self, overlay_id: Uuid) {
        for kind in [TransitionKind::Enable, TransitionKind::Disable] {
            if let Some((_, handle)) = self.handles.remove(&(overlay_id, kind)) {
                handle.abort();
                debug!(%overlay_id, kind = kind.as_str(), "transition cancelled");
            }
        }
    }

    /// Number of armed, not yet completed transitions.
    pub fn armed_count(&self) -> usize {
        self.handles
            .iter()
            .filter(|entry| !entry.value().is_finished())
            .count()
    }

    pub fn shutdown(&self) {
        for entry in self.handles.iter() {
            entry.value().abort();
        }
        self.handles.clear();
    }
}

impl Drop for TransitionScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        fired: Mutex<Vec<(Uuid, TransitionKind)>>,
        failures_before_success: AtomicU32,
    }

    #[async_trait]
    impl TransitionExecutor for RecordingExecutor {
        async fn fire(&self, overlay_id: Uuid, kind: TransitionKind) -> anyhow::Result<()> {
            if self
                .failures_before_success
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                anyhow::bail!("injected failure");
            }
            self.fired.lock().unwrap().push((overlay_id, kind));
            Ok(())
        }
    }

    impl RecordingExecutor {
        fn fired(&self) -> Vec<(Uuid, TransitionKind)> {
            self.fired.lock().unwrap().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_scheduled_time() {
        let executor = Arc::new(RecordingExecutor::default());
        let scheduler = TransitionScheduler::new(executor.clone());
        let overlay = Uuid::from_u128(1);

        scheduler.schedule(
            overlay,
            TransitionKind::Enable,
            Utc::now() + chrono::Duration::seconds(60),
        );
        assert_eq!(scheduler.armed_count(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(executor.fired().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(executor.fired(), vec![(overlay, TransitionKind::Enable)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_schedule_fires_immediately() {
        let executor = Arc::new(RecordingExecutor::default());
        let scheduler = TransitionScheduler::new(executor.clone());
        let overlay = Uuid::from_u128(2);

        scheduler.schedule(
            overlay,
            TransitionKind::Disable,
            Utc::now() - chrono::Duration::seconds(5),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(executor.fired(), vec![(overlay, TransitionKind::Disable)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_previous_handle() {
        let executor = Arc::new(RecordingExecutor::default());
        let scheduler = TransitionScheduler::new(executor.clone());
        let overlay = Uuid::from_u128(3);

        scheduler.schedule(
            overlay,
            TransitionKind::Enable,
            Utc::now() + chrono::Duration::seconds(10),
        );
        scheduler.schedule(
            overlay,
            TransitionKind::Enable,
            Utc::now() + chrono::Duration::seconds(120),
        );

        // The superseded 10s timer must not fire.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(executor.fired().is_empty());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(executor.fired().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_both_kinds() {
        let executor = Arc::new(RecordingExecutor::default());
        let scheduler = TransitionScheduler::new(executor.clone());
        let overlay = Uuid::from_u128(4);

        scheduler.schedule(
            overlay,
            TransitionKind::Enable,
            Utc::now() + chrono::Duration::seconds(5),
        );
        scheduler.schedule(
            overlay,
            TransitionKind::Disable,
            Utc::now() + chrono::Duration::seconds(5),
        );
        scheduler.cancel(overlay);
        assert_eq!(scheduler.armed_count(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(executor.fired().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let executor = Arc::new(RecordingExecutor::default());
        executor.failures_before_success.store(2, Ordering::SeqCst);
        let scheduler = TransitionScheduler::new(executor.clone());
        let overlay = Uuid::from_u128(5);

        scheduler.schedule(overlay, TransitionKind::Enable, Utc::now());

        // Two failures (backoffs 2s and 4s), success on the third attempt.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(executor.fired(), vec![(overlay, TransitionKind::Enable)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_overlays_do_not_interfere() {
        let executor = Arc::new(RecordingExecutor::default());
        let scheduler = TransitionScheduler::new(executor.clone());

        scheduler.schedule(
            Uuid::from_u128(10),
            TransitionKind::Enable,
            Utc::now() + chrono::Duration::seconds(1),
        );
        scheduler.schedule(
            Uuid::from_u128(11),
            TransitionKind::Enable,
            Utc::now() + chrono::Duration::seconds(2),
        );
        scheduler.cancel(Uuid::from_u128(10));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            executor.fired(),
            vec![(Uuid::from_u128(11), TransitionKind::Enable)]
        );
    }
}
