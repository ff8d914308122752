//! Periodic trigger for the pipeline.
//!
//! Fires once immediately, then every `interval` until shutdown. Each firing
//! runs as its own task so a slow run never delays the next tick. With
//! [`OverlapPolicy::Skip`] a firing that finds the previous run still holding
//! the lease is dropped instead of racing it on bucket eviction.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::{OverlapPolicy, ScheduleConfig};
use crate::pipeline::Pipeline;
use crate::types::{RunOutcome, RunReport};

/// Stops a running [`Scheduler`]; cloneable so signal handlers can hold one
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    overlap: OverlapPolicy,
    lease: Arc<Mutex<()>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, schedule: &ScheduleConfig) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            pipeline: Arc::new(pipeline),
            interval: schedule.interval(),
            overlap: schedule.overlap,
            lease: Arc::new(Mutex::new(())),
            shutdown: Arc::new(tx),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
        }
    }

    /// Run a single firing to completion
    pub async fn fire_once(&self) -> RunReport {
        Self::fire(self.pipeline.clone(), self.lease.clone(), self.overlap).await
    }

    /// Fire immediately, then on every tick, until shutdown.
    /// In-flight runs are awaited before returning.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return;
        }
        if self.interval.is_zero() {
            error!("Scheduler interval must be non-zero, not starting");
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut runs = JoinSet::new();

        info!(
            interval_secs = self.interval.as_secs(),
            overlap = ?self.overlap,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                // First tick completes immediately
                _ = ticker.tick() => {
                    runs.spawn(Self::fire(self.pipeline.clone(), self.lease.clone(), self.overlap));
                }
                Some(joined) = runs.join_next(), if !runs.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Run task panicked");
                    }
                }
            }
        }

        if !runs.is_empty() {
            info!(in_flight = runs.len(), "Waiting for in-flight runs");
        }
        while let Some(joined) = runs.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Run task panicked");
            }
        }

        info!("Scheduler stopped");
    }

    async fn fire(
        pipeline: Arc<Pipeline>,
        lease: Arc<Mutex<()>>,
        overlap: OverlapPolicy,
    ) -> RunReport {
        let started_at = Utc::now().naive_utc();

        let _guard = match overlap {
            OverlapPolicy::Skip => match lease.try_lock_owned() {
                Ok(guard) => Some(guard),
                Err(_) => {
                    warn!(run = %started_at, "Previous run still in progress, skipping firing");
                    let mut report = RunReport::new(started_at);
                    report.outcome = RunOutcome::Overlapped;
                    return report;
                }
            },
            OverlapPolicy::Allow => None,
        };

        pipeline.run(started_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{china, FakeExtractor};
    use crate::storage::memory::MemoryStore;
    use crate::storage::{ArtifactWriter, RetentionStore};
    use std::path::Path;

    fn scheduler(
        extractor: Arc<FakeExtractor>,
        scratch: &Path,
        interval_secs: u64,
        overlap: OverlapPolicy,
    ) -> Scheduler {
        let store = Arc::new(MemoryStore::default());
        let pipeline = Pipeline::new(
            extractor,
            ArtifactWriter::new(scratch),
            RetentionStore::new(store, 3),
        );
        Scheduler::new(
            pipeline,
            &ScheduleConfig {
                interval_secs,
                overlap,
            },
        )
    }

    #[tokio::test]
    async fn test_fire_once() {
        let extractor = Arc::new(FakeExtractor::new(china));
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler(extractor.clone(), dir.path(), 120, OverlapPolicy::Skip);

        let report = scheduler.fire_once().await;

        assert_eq!(report.outcome, RunOutcome::Published);
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_firing_skipped() {
        let mut fake = FakeExtractor::new(china);
        fake.delay = Duration::from_millis(200);
        let extractor = Arc::new(fake);
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler(extractor.clone(), dir.path(), 120, OverlapPolicy::Skip);

        let (first, second) = tokio::join!(scheduler.fire_once(), scheduler.fire_once());

        assert_eq!(first.outcome, RunOutcome::Published);
        assert_eq!(second.outcome, RunOutcome::Overlapped);
        assert_eq!(extractor.calls(), 1);

        // Lease released afterwards
        let third = scheduler.fire_once().await;
        assert_eq!(third.outcome, RunOutcome::Published);
    }

    #[tokio::test]
    async fn test_overlap_allowed() {
        let mut fake = FakeExtractor::new(china);
        fake.delay = Duration::from_millis(100);
        let extractor = Arc::new(fake);
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler(extractor.clone(), dir.path(), 120, OverlapPolicy::Allow);

        let (first, second) = tokio::join!(scheduler.fire_once(), scheduler.fire_once());

        assert_ne!(first.outcome, RunOutcome::Overlapped);
        assert_ne!(second.outcome, RunOutcome::Overlapped);
        assert_eq!(extractor.calls(), 2);
    }

    #[tokio::test]
    async fn test_run_fires_immediately_and_stops() {
        let extractor = Arc::new(FakeExtractor::new(china));
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Arc::new(scheduler(
            extractor.clone(),
            dir.path(),
            3600,
            OverlapPolicy::Skip,
        ));
        let handle = scheduler.shutdown_handle();

        let task = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        // Immediate firing only; the next tick is an hour away
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_repeats_on_interval() {
        let extractor = Arc::new(FakeExtractor::new(china));
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(extractor.clone(), dir.path(), 120, OverlapPolicy::Skip);
        scheduler.interval = Duration::from_millis(50);
        let scheduler = Arc::new(scheduler);
        let handle = scheduler.shutdown_handle();

        let task = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.shutdown();
        task.await.unwrap();

        assert!(extractor.calls() >= 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let extractor = Arc::new(FakeExtractor::new(china));
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler(extractor.clone(), dir.path(), 120, OverlapPolicy::Skip);

        scheduler.shutdown_handle().shutdown();
        scheduler.run().await;

        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_start() {
        let extractor = Arc::new(FakeExtractor::new(china));
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler(extractor.clone(), dir.path(), 0, OverlapPolicy::Skip);

        tokio::time::timeout(Duration::from_secs(5), scheduler.run())
            .await
            .expect("scheduler with zero interval should return");

        assert_eq!(extractor.calls(), 0);
    }
}
