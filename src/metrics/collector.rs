//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the matchwatch live tracking
//! service using Prometheus metrics.

use crate::types::ConnectionStats;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the live tracking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Registry and polling metrics
    tracking_metrics: TrackingMetrics,

    /// Update queue metrics
    queue_metrics: QueueMetrics,

    /// Dispatch worker metrics
    dispatch_metrics: DispatchMetrics,

    /// Transport-level metrics
    transport_metrics: TransportMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Number of running background workers
    pub workers_running: IntGauge,
}

/// Registry and polling metrics
#[derive(Clone)]
pub struct TrackingMetrics {
    /// Matches currently tracked
    pub tracked_matches: IntGauge,

    /// Tracking requests by outcome (created, joined, failed)
    pub tracking_requests_total: IntCounterVec,

    /// Trackers removed after their last watcher left
    pub trackers_removed_total: IntCounter,

    /// Completed poll cycles
    pub poll_cycles_total: IntCounter,

    /// Per-match poll results (refreshed, skipped, failed)
    pub poll_results_total: IntCounterVec,

    /// Poll cycle duration
    pub poll_cycle_duration: Histogram,

    /// Performance requests by outcome (enqueued, dropped, no_data, failed)
    pub performance_requests_total: IntCounterVec,
}

/// Update queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Items accepted per queue
    pub enqueued_total: IntCounterVec,

    /// Items dropped per queue (queue full or shut down)
    pub dropped_total: IntCounterVec,

    /// Current queue depth
    pub depth: IntGaugeVec,
}

/// Dispatch worker metrics
#[derive(Clone)]
pub struct DispatchMetrics {
    /// Messages handed to the transport, by queue and target (user, match)
    pub published_total: IntCounterVec,

    /// Transport publish failures by queue
    pub publish_errors_total: IntCounterVec,
}

/// Transport-level metrics
#[derive(Clone)]
pub struct TransportMetrics {
    /// Active client connections as last sampled
    pub active_connections: IntGauge,

    /// Messages dropped by the transport for slow clients, as last sampled
    pub messages_dropped: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let tracking_metrics = TrackingMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let dispatch_metrics = DispatchMetrics::new(&registry)?;
        let transport_metrics = TransportMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            tracking_metrics,
            queue_metrics,
            dispatch_metrics,
            transport_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get tracking metrics
    pub fn tracking(&self) -> &TrackingMetrics {
        &self.tracking_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get dispatch metrics
    pub fn dispatch(&self) -> &DispatchMetrics {
        &self.dispatch_metrics
    }

    /// Get transport metrics
    pub fn transport(&self) -> &TransportMetrics {
        &self.transport_metrics
    }

    /// Record the outcome of a start-tracking request
    pub fn record_tracking_request(&self, outcome: &str) {
        self.tracking_metrics
            .tracking_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a tracker being removed
    pub fn record_tracker_removed(&self) {
        self.tracking_metrics.trackers_removed_total.inc();
    }

    /// Set the number of tracked matches
    pub fn set_tracked_matches(&self, count: usize) {
        self.tracking_metrics.tracked_matches.set(count as i64);
    }

    /// Record a finished poll cycle
    pub fn record_poll_cycle(&self, refreshed: usize, skipped: usize, failed: usize, duration: Duration) {
        let results = &self.tracking_metrics.poll_results_total;
        results.with_label_values(&["refreshed"]).inc_by(refreshed as u64);
        results.with_label_values(&["skipped"]).inc_by(skipped as u64);
        results.with_label_values(&["failed"]).inc_by(failed as u64);

        self.tracking_metrics.poll_cycles_total.inc();
        self.tracking_metrics
            .poll_cycle_duration
            .observe(duration.as_secs_f64());
    }

    /// Record the outcome of a performance request
    pub fn record_performance_request(&self, outcome: &str) {
        self.tracking_metrics
            .performance_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record an item accepted by a queue
    pub fn record_enqueued(&self, queue: &str, depth: usize) {
        self.queue_metrics.enqueued_total.with_label_values(&[queue]).inc();
        self.queue_metrics
            .depth
            .with_label_values(&[queue])
            .set(depth as i64);
    }

    /// Record an item dropped by a queue
    pub fn record_dropped(&self, queue: &str) {
        self.queue_metrics.dropped_total.with_label_values(&[queue]).inc();
    }

    /// Record a dispatched message
    pub fn record_published(&self, queue: &str, target: &str, success: bool, depth: usize) {
        if success {
            self.dispatch_metrics
                .published_total
                .with_label_values(&[queue, target])
                .inc();
        } else {
            self.dispatch_metrics
                .publish_errors_total
                .with_label_values(&[queue])
                .inc();
        }
        self.queue_metrics
            .depth
            .with_label_values(&[queue])
            .set(depth as i64);
    }

    /// Update transport gauges from sampled connection statistics
    pub fn update_from_connection_stats(&self, stats: &ConnectionStats) {
        self.transport_metrics
            .active_connections
            .set(stats.active_connections as i64);
        self.transport_metrics
            .messages_dropped
            .set(stats.messages_dropped as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Set the number of running workers
    pub fn set_workers_running(&self, count: usize) {
        self.service_metrics.workers_running.set(count as i64);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("matchwatch_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "matchwatch_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let workers_running =
            IntGauge::new("matchwatch_workers_running", "Running background workers")?;
        registry.register(Box::new(workers_running.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            workers_running,
        })
    }
}

impl TrackingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tracked_matches =
            IntGauge::new("matchwatch_tracked_matches", "Matches currently tracked")?;
        registry.register(Box::new(tracked_matches.clone()))?;

        let tracking_requests_total = IntCounterVec::new(
            Opts::new(
                "matchwatch_tracking_requests_total",
                "Start-tracking requests by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(tracking_requests_total.clone()))?;

        let trackers_removed_total = IntCounter::new(
            "matchwatch_trackers_removed_total",
            "Trackers removed after the last watcher left",
        )?;
        registry.register(Box::new(trackers_removed_total.clone()))?;

        let poll_cycles_total =
            IntCounter::new("matchwatch_poll_cycles_total", "Completed poll cycles")?;
        registry.register(Box::new(poll_cycles_total.clone()))?;

        let poll_results_total = IntCounterVec::new(
            Opts::new("matchwatch_poll_results_total", "Per-match poll results"),
            &["result"],
        )?;
        registry.register(Box::new(poll_results_total.clone()))?;

        let poll_cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "matchwatch_poll_cycle_duration_seconds",
                "Poll cycle duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0]),
        )?;
        registry.register(Box::new(poll_cycle_duration.clone()))?;

        let performance_requests_total = IntCounterVec::new(
            Opts::new(
                "matchwatch_performance_requests_total",
                "Performance update requests by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(performance_requests_total.clone()))?;

        Ok(Self {
            tracked_matches,
            tracking_requests_total,
            trackers_removed_total,
            poll_cycles_total,
            poll_results_total,
            poll_cycle_duration,
            performance_requests_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let enqueued_total = IntCounterVec::new(
            Opts::new("matchwatch_queue_enqueued_total", "Items accepted per queue"),
            &["queue"],
        )?;
        registry.register(Box::new(enqueued_total.clone()))?;

        let dropped_total = IntCounterVec::new(
            Opts::new("matchwatch_queue_dropped_total", "Items dropped per queue"),
            &["queue"],
        )?;
        registry.register(Box::new(dropped_total.clone()))?;

        let depth = IntGaugeVec::new(
            Opts::new("matchwatch_queue_depth", "Current queue depth"),
            &["queue"],
        )?;
        registry.register(Box::new(depth.clone()))?;

        Ok(Self {
            enqueued_total,
            dropped_total,
            depth,
        })
    }
}

impl DispatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let published_total = IntCounterVec::new(
            Opts::new(
                "matchwatch_dispatch_published_total",
                "Messages handed to the transport",
            ),
            &["queue", "target"],
        )?;
        registry.register(Box::new(published_total.clone()))?;

        let publish_errors_total = IntCounterVec::new(
            Opts::new(
                "matchwatch_dispatch_publish_errors_total",
                "Transport publish failures",
            ),
            &["queue"],
        )?;
        registry.register(Box::new(publish_errors_total.clone()))?;

        Ok(Self {
            published_total,
            publish_errors_total,
        })
    }
}

impl TransportMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_connections = IntGauge::new(
            "matchwatch_active_connections",
            "Active client connections",
        )?;
        registry.register(Box::new(active_connections.clone()))?;

        let messages_dropped = IntGauge::new(
            "matchwatch_transport_messages_dropped",
            "Messages dropped by the transport for slow clients",
        )?;
        registry.register(Box::new(messages_dropped.clone()))?;

        Ok(Self {
            active_connections,
            messages_dropped,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
