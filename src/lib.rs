//! Matchwatch - live match tracking and update distribution
//!
//! This crate keeps per-match live state shared by many watchers, refreshes it
//! on a timer from a game-state source, and fans match, performance and rank
//! updates out to subscribed clients through bounded, lossy queues.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod queue;
pub mod registry;
pub mod service;
pub mod source;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LiveTrackingError, Result};
pub use types::*;

// Re-export key components
pub use producer::{MatchRefresher, SimulatedRefresher};
pub use queue::EnqueueOutcome;
pub use registry::{MatchRegistry, TrackingOutcome};
pub use service::{LiveMatchService, PerformanceOutcome};
pub use source::{AnalyticsSource, GameStateSource, InMemoryGameSource};
pub use transport::{LocalHub, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
