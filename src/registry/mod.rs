//! Live match registry
//!
//! Owns the map of tracked matches and their watcher sets.

pub mod manager;
pub mod tracker;

pub use manager::{MatchRegistry, TrackingOutcome};
pub use tracker::{RefreshData, TrackedMatch, TrackerSnapshot, TrackerState, STATUS_IN_PROGRESS};
