//! Timer-driven refresh of tracked matches
//!
//! Every cycle the polling producer snapshots the registry, skips trackers that
//! were refreshed within one interval, refreshes the rest through a pluggable
//! [`MatchRefresher`] and enqueues one match update per watcher.

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::queue::UpdateQueues;
use crate::registry::{MatchRegistry, RefreshData, TrackerSnapshot};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Strategy that produces fresh participant data for a tracked match
///
/// Called without any tracker lock held. A push-based spectator feed can
/// replace the timer poll by implementing this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchRefresher: Send + Sync {
    async fn refresh(&self, tracker: &TrackerSnapshot) -> Result<RefreshData>;
}

/// Refresher used when no live spectator feed is available
///
/// Keeps the current participants; the tracker still advances its update
/// count and game clock so watchers receive a heartbeat.
#[derive(Debug, Default, Clone)]
pub struct SimulatedRefresher;

#[async_trait]
impl MatchRefresher for SimulatedRefresher {
    async fn refresh(&self, _tracker: &TrackerSnapshot) -> Result<RefreshData> {
        Ok(RefreshData::default())
    }
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCycleReport {
    /// Trackers refreshed this cycle
    pub refreshed: usize,
    /// Trackers updated within the last interval
    pub skipped: usize,
    /// Trackers whose refresh failed (retried next cycle)
    pub failed: usize,
    /// Match updates accepted by the queue
    pub enqueued: usize,
    /// Match updates dropped by the queue
    pub dropped: usize,
}

/// Periodic producer of match updates
pub struct PollingProducer {
    registry: Arc<MatchRegistry>,
    queues: Arc<UpdateQueues>,
    refresher: Arc<dyn MatchRefresher>,
    interval: Duration,
    metrics: Arc<MetricsCollector>,
}

impl PollingProducer {
    pub fn new(
        registry: Arc<MatchRegistry>,
        queues: Arc<UpdateQueues>,
        refresher: Arc<dyn MatchRefresher>,
        interval: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            queues,
            refresher,
            interval,
            metrics,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle against the wall clock
    pub async fn run_cycle(&self) -> PollCycleReport {
        self.run_cycle_at(current_timestamp()).await
    }

    /// Run one cycle treating `now` as the current time
    ///
    /// Stale trackers are refreshed concurrently, each bounded by one poll
    /// interval, and applied as their refresh completes. An unresponsive
    /// refresh only holds back its own match.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> PollCycleReport {
        let started = Instant::now();
        let mut report = PollCycleReport::default();
        let mut refreshes = FuturesUnordered::new();

        for (match_id, tracker) in self.registry.snapshot_tracked_matches() {
            if tracker.is_fresh(now, self.interval) {
                report.skipped += 1;
                continue;
            }

            let refresher = self.refresher.clone();
            let limit = self.interval;
            refreshes.push(async move {
                let snapshot = tracker.snapshot();
                let result = tokio::time::timeout(limit, refresher.refresh(&snapshot)).await;
                (match_id, tracker, result)
            });
        }

        while let Some((match_id, tracker, result)) = refreshes.next().await {
            let refresh = match result {
                Ok(Ok(refresh)) => refresh,
                Ok(Err(e)) => {
                    warn!("Failed to refresh match {}: {}", match_id, e);
                    report.failed += 1;
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Refresh of match {} timed out after {}s",
                        match_id,
                        self.interval.as_secs()
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let applied_at = now
                + chrono::Duration::from_std(started.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero());
            let updates = tracker.apply_refresh(refresh, applied_at);
            report.refreshed += 1;

            for update in updates {
                if self.queues.matches.try_enqueue(update).is_accepted() {
                    report.enqueued += 1;
                } else {
                    report.dropped += 1;
                }
            }
        }

        self.metrics.record_poll_cycle(
            report.refreshed,
            report.skipped,
            report.failed,
            started.elapsed(),
        );

        if report.refreshed > 0 || report.failed > 0 {
            debug!(
                "Poll cycle: {} refreshed, {} skipped, {} failed, {} updates enqueued, {} dropped",
                report.refreshed, report.skipped, report.failed, report.enqueued, report.dropped
            );
        }

        report
    }

    /// Worker loop: one cycle per tick until cancelled
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Polling worker started ({}s interval)", self.interval.as_secs());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        info!("Polling worker stopped");
    }
}
