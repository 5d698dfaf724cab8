//! Update producers
//!
//! The polling producer refreshes tracked matches on a timer; the performance
//! producer builds summaries when a caller asks for one.

pub mod performance;
pub mod polling;

pub use performance::{ImprovementSuggestion, PerformanceProducer, SessionAverages};
pub use polling::{MatchRefresher, PollCycleReport, PollingProducer, SimulatedRefresher};
