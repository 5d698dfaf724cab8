//! Main application configuration
//!
//! This module defines the configuration structures for the matchwatch
//! service, including environment variable loading, TOML files and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub tracking: TrackingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Live tracking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Interval between live-match refresh cycles
    pub poll_interval_seconds: u64,
    /// Interval between connection summary samples
    pub summary_interval_seconds: u64,
    /// Capacity of the match-state update queue
    pub match_queue_capacity: usize,
    /// Capacity of the performance update queue
    pub performance_queue_capacity: usize,
    /// Capacity of the rank-change update queue
    pub rank_queue_capacity: usize,
    /// Recent matches considered for a performance update
    pub history_match_count: usize,
    /// Window of historical stats compared against, in days
    pub stats_window_days: u32,
    /// Per-connection buffer of the in-process hub
    pub connection_buffer: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "matchwatch".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 15,
            summary_interval_seconds: 30,
            match_queue_capacity: 1000,
            performance_queue_capacity: 500,
            rank_queue_capacity: 100,
            history_match_count: 5,
            stats_window_days: 30,
            connection_buffer: 256,
        }
    }
}

impl TrackingSettings {
    /// Poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Summary interval as Duration
    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_seconds)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", key, value))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = parse_var("HEALTH_PORT", port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = parse_var("SHUTDOWN_TIMEOUT_SECONDS", timeout)?;
        }

        // Tracking settings
        if let Ok(interval) = env::var("POLL_INTERVAL_SECONDS") {
            self.tracking.poll_interval_seconds = parse_var("POLL_INTERVAL_SECONDS", interval)?;
        }
        if let Ok(interval) = env::var("SUMMARY_INTERVAL_SECONDS") {
            self.tracking.summary_interval_seconds =
                parse_var("SUMMARY_INTERVAL_SECONDS", interval)?;
        }
        if let Ok(capacity) = env::var("MATCH_QUEUE_CAPACITY") {
            self.tracking.match_queue_capacity = parse_var("MATCH_QUEUE_CAPACITY", capacity)?;
        }
        if let Ok(capacity) = env::var("PERFORMANCE_QUEUE_CAPACITY") {
            self.tracking.performance_queue_capacity =
                parse_var("PERFORMANCE_QUEUE_CAPACITY", capacity)?;
        }
        if let Ok(capacity) = env::var("RANK_QUEUE_CAPACITY") {
            self.tracking.rank_queue_capacity = parse_var("RANK_QUEUE_CAPACITY", capacity)?;
        }
        if let Ok(count) = env::var("HISTORY_MATCH_COUNT") {
            self.tracking.history_match_count = parse_var("HISTORY_MATCH_COUNT", count)?;
        }
        if let Ok(days) = env::var("STATS_WINDOW_DAYS") {
            self.tracking.stats_window_days = parse_var("STATS_WINDOW_DAYS", days)?;
        }
        if let Ok(buffer) = env::var("CONNECTION_BUFFER") {
            self.tracking.connection_buffer = parse_var("CONNECTION_BUFFER", buffer)?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    validate_tracking(&config.tracking)
}

/// Validate tracking settings on their own (used when the service is built without an AppConfig)
pub fn validate_tracking(tracking: &TrackingSettings) -> Result<()> {
    if tracking.poll_interval_seconds == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }
    if tracking.summary_interval_seconds == 0 {
        return Err(anyhow!("Summary interval must be greater than 0"));
    }
    if tracking.match_queue_capacity == 0
        || tracking.performance_queue_capacity == 0
        || tracking.rank_queue_capacity == 0
    {
        return Err(anyhow!("Queue capacities must be greater than 0"));
    }
    if tracking.history_match_count == 0 {
        return Err(anyhow!("History match count must be greater than 0"));
    }
    if tracking.connection_buffer == 0 {
        return Err(anyhow!("Connection buffer must be greater than 0"));
    }

    Ok(())
}
