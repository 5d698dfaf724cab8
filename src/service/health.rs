//! Health checks for the live match service
//!
//! Readiness and liveness follow the worker lifecycle; a running service whose
//! queues are close to capacity reports itself as degraded.

use crate::queue::QueueStats;
use crate::service::app::{LifecycleState, LiveMatchService};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Queue fill ratio above which the service is degraded
pub const DEGRADED_QUEUE_UTILIZATION: f64 = 0.9;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form exported as a gauge (0=unhealthy, 1=degraded, 2=healthy)
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn combine(self, other: &HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional detail when not healthy
    pub message: Option<String>,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub lifecycle: LifecycleState,
    pub workers: usize,
    pub tracked_matches: usize,
    pub watchers: usize,
    pub active_connections: usize,
    pub queues: Vec<QueueStats>,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(service: Arc<LiveMatchService>) -> Result<Self> {
        let lifecycle = Self::check_lifecycle(&service);
        let queues = Self::check_queues(&service.queue_stats());

        let status = lifecycle.status.clone().combine(&queues.status);
        let stats = Self::gather_service_stats(&service).await;

        Ok(HealthCheck {
            status,
            service: service.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![lifecycle, queues],
            stats,
        })
    }

    /// Liveness: the worker pool is running
    pub async fn liveness_check(service: Arc<LiveMatchService>) -> Result<HealthStatus> {
        Ok(Self::check_lifecycle(&service).status)
    }

    /// Readiness: running, degraded when queues are saturated
    pub async fn readiness_check(service: Arc<LiveMatchService>) -> Result<HealthStatus> {
        let lifecycle = Self::check_lifecycle(&service);
        if lifecycle.status != HealthStatus::Healthy {
            return Ok(HealthStatus::Unhealthy);
        }
        Ok(Self::check_queues(&service.queue_stats()).status)
    }

    fn check_lifecycle(service: &LiveMatchService) -> ComponentCheck {
        let (status, message) = match service.lifecycle_state() {
            LifecycleState::Running => (HealthStatus::Healthy, None),
            LifecycleState::Idle => (
                HealthStatus::Unhealthy,
                Some("Service has not been started".to_string()),
            ),
            LifecycleState::Stopped => (
                HealthStatus::Unhealthy,
                Some("Service is stopped".to_string()),
            ),
        };

        ComponentCheck {
            name: "workers".to_string(),
            status,
            message,
        }
    }

    /// Degraded when any queue is above the utilization threshold
    pub fn check_queues(queues: &[QueueStats]) -> ComponentCheck {
        let saturated: Vec<_> = queues
            .iter()
            .filter(|q| q.utilization() > DEGRADED_QUEUE_UTILIZATION)
            .map(|q| format!("{} queue at {}/{}", q.name, q.depth, q.capacity))
            .collect();

        let (status, message) = if saturated.is_empty() {
            (HealthStatus::Healthy, None)
        } else {
            debug!("Saturated queues: {:?}", saturated);
            (HealthStatus::Degraded, Some(saturated.join(", ")))
        };

        ComponentCheck {
            name: "queues".to_string(),
            status,
            message,
        }
    }

    async fn gather_service_stats(service: &LiveMatchService) -> ServiceStats {
        let snapshots = service.registry().snapshots();
        let connections = service.transport().connection_stats().await;

        ServiceStats {
            lifecycle: service.lifecycle_state(),
            workers: service.worker_count(),
            tracked_matches: snapshots.len(),
            watchers: snapshots.iter().map(|s| s.watchers.len()).sum(),
            active_connections: connections.active_connections,
            queues: service.queue_stats(),
            uptime_seconds: service.uptime().as_secs(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
