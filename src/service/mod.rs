//! Service layer for the matchwatch live tracking service
//!
//! This module contains the explicitly owned service facade, the worker
//! lifecycle and the health checks built on top of it.

pub mod app;
pub mod health;

pub use app::{LifecycleState, LiveMatchService, PerformanceOutcome, WORKER_COUNT};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
