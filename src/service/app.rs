//! Live match service and worker lifecycle
//!
//! [`LiveMatchService`] is the explicitly constructed owner of the registry,
//! the update queues and the producers. Callers share it through an `Arc`.
//! `start` spawns the fixed pool of five workers (three dispatch workers, the
//! polling worker and the summary worker); `stop` fires the cancellation token
//! and joins them. The queues are never closed, so producers racing with
//! shutdown only ever observe a dropped update.

use crate::config::{validate_config, AppConfig};
use crate::dispatch::{self, Dispatcher};
use crate::error::{LiveTrackingError, Result};
use crate::metrics::MetricsCollector;
use crate::producer::{MatchRefresher, PerformanceProducer, PollingProducer, SimulatedRefresher};
use crate::queue::{EnqueueOutcome, QueueStats, UpdateQueues};
use crate::registry::{MatchRegistry, TrackingOutcome};
use crate::source::{AnalyticsSource, GameStateSource};
use crate::transport::Transport;
use crate::types::{RankUpdate, RankedSeries};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of long-lived workers spawned by `start`
pub const WORKER_COUNT: usize = 5;

/// Lifecycle of the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Idle,
    Running,
    Stopped,
}

/// Result of a performance update request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceOutcome {
    /// An update was accepted by the performance queue
    Enqueued,
    /// An update was computed but the queue dropped it
    Dropped,
    /// No recent game carried data for the subscriber
    NoData,
}

impl PerformanceOutcome {
    fn as_str(self) -> &'static str {
        match self {
            PerformanceOutcome::Enqueued => "enqueued",
            PerformanceOutcome::Dropped => "dropped",
            PerformanceOutcome::NoData => "no_data",
        }
    }
}

/// The live match tracking service
pub struct LiveMatchService {
    config: AppConfig,
    registry: Arc<MatchRegistry>,
    queues: Arc<UpdateQueues>,
    transport: Arc<dyn Transport>,
    performance: PerformanceProducer,
    polling: Arc<PollingProducer>,
    metrics: Arc<MetricsCollector>,
    cancel: CancellationToken,
    state: Mutex<LifecycleState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started_at: Mutex<Option<Instant>>,
}

impl LiveMatchService {
    /// Create a service with its own metrics collector
    pub fn new(
        config: AppConfig,
        source: Arc<dyn GameStateSource>,
        analytics: Arc<dyn AnalyticsSource>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            LiveTrackingError::Internal {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        Self::with_metrics(config, source, analytics, transport, metrics)
    }

    /// Create a service reporting into an existing metrics collector
    pub fn with_metrics(
        config: AppConfig,
        source: Arc<dyn GameStateSource>,
        analytics: Arc<dyn AnalyticsSource>,
        transport: Arc<dyn Transport>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        validate_config(&config).map_err(|e| LiveTrackingError::Configuration {
            message: e.to_string(),
        })?;

        let tracking = &config.tracking;
        let registry = Arc::new(MatchRegistry::new(source.clone(), metrics.clone()));
        let queues = Arc::new(UpdateQueues::new(tracking, metrics.clone()));
        let performance = PerformanceProducer::new(
            source,
            analytics,
            tracking.history_match_count,
            tracking.stats_window_days,
        );
        let polling = Arc::new(PollingProducer::new(
            registry.clone(),
            queues.clone(),
            Arc::new(SimulatedRefresher),
            tracking.poll_interval(),
            metrics.clone(),
        ));

        info!(
            "Live match service created (poll every {}s, queues {}/{}/{})",
            tracking.poll_interval_seconds,
            tracking.match_queue_capacity,
            tracking.performance_queue_capacity,
            tracking.rank_queue_capacity
        );

        Ok(Self {
            config,
            registry,
            queues,
            transport,
            performance,
            polling,
            metrics,
            cancel: CancellationToken::new(),
            state: Mutex::new(LifecycleState::Idle),
            workers: Mutex::new(Vec::new()),
            started_at: Mutex::new(None),
        })
    }

    /// Replace the refresh strategy used by the polling worker
    pub fn with_refresher(mut self, refresher: Arc<dyn MatchRefresher>) -> Self {
        self.polling = Arc::new(PollingProducer::new(
            self.registry.clone(),
            self.queues.clone(),
            refresher,
            self.config.tracking.poll_interval(),
            self.metrics.clone(),
        ));
        self
    }

    /// Spawn the worker pool. Only valid once, from the idle state.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Idle => {}
            LifecycleState::Running => {
                return Err(LiveTrackingError::Lifecycle {
                    message: "service is already running".to_string(),
                }
                .into())
            }
            LifecycleState::Stopped => {
                return Err(LiveTrackingError::Lifecycle {
                    message: "service was stopped and cannot be restarted".to_string(),
                }
                .into())
            }
        }

        let (Some(matches), Some(performance), Some(ranks)) = (
            self.queues.matches.take_receiver(),
            self.queues.performance.take_receiver(),
            self.queues.ranks.take_receiver(),
        ) else {
            return Err(LiveTrackingError::Internal {
                message: "queue receivers already taken".to_string(),
            }
            .into());
        };

        info!("Starting live match service workers...");
        let dispatcher = Dispatcher::new(self.transport.clone(), self.metrics.clone());
        let started = Instant::now();

        let handles = vec![
            tokio::spawn(dispatch::run_match_worker(
                dispatcher.clone(),
                matches,
                self.cancel.clone(),
            )),
            tokio::spawn(dispatch::run_performance_worker(
                dispatcher.clone(),
                performance,
                self.cancel.clone(),
            )),
            tokio::spawn(dispatch::run_rank_worker(
                dispatcher,
                ranks,
                self.cancel.clone(),
            )),
            tokio::spawn(self.polling.clone().run(self.cancel.clone())),
            tokio::spawn(run_summary_worker(
                SummaryContext {
                    registry: self.registry.clone(),
                    queues: self.queues.clone(),
                    transport: self.transport.clone(),
                    metrics: self.metrics.clone(),
                    started,
                },
                self.config.tracking.summary_interval(),
                self.cancel.clone(),
            )),
        ];

        *self.workers.lock() = handles;
        *self.started_at.lock() = Some(started);
        *state = LifecycleState::Running;

        self.metrics.set_workers_running(WORKER_COUNT);
        self.metrics.update_health_status(2);
        info!("✅ Live match service started with {} workers", WORKER_COUNT);
        Ok(())
    }

    /// Cancel the workers and wait for them, bounded by the shutdown timeout
    ///
    /// Stopping an idle service is rejected; stopping twice is a no-op.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                LifecycleState::Running => *state = LifecycleState::Stopped,
                LifecycleState::Idle => {
                    return Err(LiveTrackingError::Lifecycle {
                        message: "service has not been started".to_string(),
                    }
                    .into())
                }
                LifecycleState::Stopped => {
                    debug!("Live match service already stopped");
                    return Ok(());
                }
            }
        }

        info!("Stopping live match service...");
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let task_count = handles.len();
        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout();
        let mut aborted = 0;

        for mut handle in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Worker ended abnormally: {}", e),
                Err(_) => {
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            warn!(
                "{} of {} workers did not stop within {}s and were aborted",
                aborted,
                task_count,
                self.config.service.shutdown_timeout_seconds
            );
        }

        self.metrics.set_workers_running(0);
        self.metrics.update_health_status(0);
        info!(
            "✅ Live match service stopped ({} tracked matches at shutdown)",
            self.registry.tracked_count()
        );
        Ok(())
    }

    /// Start watching a match for a subscriber
    pub async fn start_tracking(
        &self,
        match_id: &str,
        subscriber_id: &str,
    ) -> Result<TrackingOutcome> {
        self.registry.start_tracking(match_id, subscriber_id).await
    }

    /// Stop watching a match. Never fails.
    pub fn stop_tracking(&self, match_id: &str, subscriber_id: &str) {
        self.registry.stop_tracking(match_id, subscriber_id);
    }

    /// Compute and enqueue a performance update for a subscriber
    pub async fn request_performance_update(&self, subscriber_id: &str) -> Result<PerformanceOutcome> {
        let update = match self.performance.build_update(subscriber_id).await {
            Ok(update) => update,
            Err(e) => {
                self.metrics.record_performance_request("failed");
                return Err(e);
            }
        };

        let outcome = match update {
            None => PerformanceOutcome::NoData,
            Some(update) => {
                if self.queues.performance.try_enqueue(update).is_accepted() {
                    PerformanceOutcome::Enqueued
                } else {
                    PerformanceOutcome::Dropped
                }
            }
        };

        self.metrics.record_performance_request(outcome.as_str());
        debug!("Performance request for {}: {:?}", subscriber_id, outcome);
        Ok(outcome)
    }

    /// Enqueue a rank change notification for a subscriber
    pub fn notify_rank_change(
        &self,
        subscriber_id: &str,
        old_rank: &str,
        new_rank: &str,
        league_points: i32,
        series: Option<RankedSeries>,
    ) -> EnqueueOutcome {
        info!(
            "Rank change for {}: {} -> {} ({} LP)",
            subscriber_id, old_rank, new_rank, league_points
        );
        self.queues.ranks.try_enqueue(RankUpdate {
            subscriber_id: subscriber_id.to_string(),
            old_rank: old_rank.to_string(),
            new_rank: new_rank.to_string(),
            league_points,
            series,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<MatchRegistry> {
        self.registry.clone()
    }

    pub fn queues(&self) -> Arc<UpdateQueues> {
        self.queues.clone()
    }

    pub fn polling(&self) -> Arc<PollingProducer> {
        self.polling.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn queue_stats(&self) -> Vec<QueueStats> {
        self.queues.stats()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle_state() == LifecycleState::Running
    }

    /// Workers spawned and not yet joined
    pub fn worker_count(&self) -> usize {
        self.workers
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Time since `start`, zero before it
    pub fn uptime(&self) -> Duration {
        self.started_at
            .lock()
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }
}

struct SummaryContext {
    registry: Arc<MatchRegistry>,
    queues: Arc<UpdateQueues>,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsCollector>,
    started: Instant,
}

/// Periodically sample connection and registry statistics for observability
async fn run_summary_worker(context: SummaryContext, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("Summary worker started ({}s interval)", period.as_secs());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let connections = context.transport.connection_stats().await;
                let tracked = context.registry.tracked_count();
                let queues = context.queues.stats();

                context.metrics.update_from_connection_stats(&connections);
                context.metrics.set_tracked_matches(tracked);
                context
                    .metrics
                    .service()
                    .uptime_seconds
                    .set(context.started.elapsed().as_secs() as i64);

                info!(
                    "Live tracking summary: {} tracked matches, {} active connections, queue depths {}",
                    tracked,
                    connections.active_connections,
                    queues
                        .iter()
                        .map(|q| format!("{}={}/{}", q.name, q.depth, q.capacity))
                        .collect::<Vec<_>>()
                        .join(" ")
                );
            }
        }
    }

    info!("Summary worker stopped");
}
