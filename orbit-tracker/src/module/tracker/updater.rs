///! Element-set updater - periodic refresh task
use super::{RefreshOutcome, Tracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Upper bound for one refresh cycle, retries and fallback included
const UPDATE_TIMEOUT_SECONDS: u64 = 300;

/// Refreshes the tracker's element sets on a fixed interval, independent of playback
pub struct ElementSetUpdater {
    tracker: Arc<Tracker>,
    interval: Duration,
}

impl ElementSetUpdater {
    pub fn new(tracker: Arc<Tracker>, interval: Duration) -> Self {
        Self {
            tracker,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Start updater with immediate initial update
    ///
    /// The first cycle runs before this returns so the views start with data.
    pub async fn start_with_initial_update(self) -> JoinHandle<()> {
        tracing::info!("Starting element-set updater (initial update + every {:?})", self.interval);

        self.run_update_cycle().await;

        tokio::spawn(async move {
            self.run_scheduled_loop().await;
        })
    }

    /// Start updater without initial update
    pub fn start(self) -> JoinHandle<()> {
        tracing::info!("Starting element-set updater (every {:?})", self.interval);

        tokio::spawn(async move {
            self.run_scheduled_loop().await;
        })
    }

    async fn run_scheduled_loop(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.run_update_cycle().await;
        }
    }

    /// One refresh; failures are logged and left to the notice in the store
    pub async fn run_update_cycle(&self) {
        let result = tokio::time::timeout(
            Duration::from_secs(UPDATE_TIMEOUT_SECONDS),
            self.tracker.refresh(),
        )
        .await;

        match result {
            Ok(Ok(RefreshOutcome::Applied { count, source })) => {
                tracing::info!("✓ Element-set update completed: {} objects ({:?})", count, source);
            }
            Ok(Ok(RefreshOutcome::Snapshot { count, saved_at, error })) => {
                tracing::warn!(
                    "Element-set update failed ({}), showing {} cached objects from {}",
                    error,
                    count,
                    saved_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Ok(Ok(RefreshOutcome::Superseded)) => {
                tracing::debug!("Element-set update superseded by a newer request");
            }
            Ok(Err(e)) => {
                tracing::error!("✗ Element-set update failed: {}", e);
            }
            Err(_) => {
                tracing::error!("✗ Element-set update timed out after {} seconds", UPDATE_TIMEOUT_SECONDS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::elements::test_server::{record, spawn, MockProvider};
    use crate::module::orbit::OrbitSampler;
    use crate::module::tracker::tests::tracker_with;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_initial_update_loads_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new(vec![record(25544, "ISS (ZARYA)")]));
        let base = spawn(provider.clone()).await;
        let tracker = Arc::new(tracker_with(base, temp_dir.path(), OrbitSampler::default(), 512));

        let handle = ElementSetUpdater::new(tracker.clone(), Duration::from_secs(3600))
            .start_with_initial_update()
            .await;

        assert_eq!(tracker.catalog().await.len(), 1);
        assert_eq!(provider.active_calls.load(Ordering::SeqCst), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_cycle_does_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        let tracker = Arc::new(tracker_with(
            "http://127.0.0.1:9".to_string(),
            temp_dir.path(),
            OrbitSampler::default(),
            512,
        ));

        ElementSetUpdater::new(tracker.clone(), Duration::from_secs(60))
            .run_update_cycle()
            .await;
        assert!(tracker.state().await.notice.is_some());
    }
}
