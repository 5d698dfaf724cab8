//! Game-state and analytics collaborators
//!
//! The live tracking core consumes match data through these traits. The
//! in-memory implementation backs the stand-alone binary and the tests.

pub mod memory;

use crate::error::Result;
use crate::types::{LiveGameInfo, MatchDetail, MatchSummary, PlayerStats};
use async_trait::async_trait;

pub use memory::{InMemoryGameSource, SourceFixtures};

/// Source of live games and match history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameStateSource: Send + Sync {
    /// Live game the subscriber is currently playing or spectating
    async fn fetch_live_game(&self, subscriber_id: &str) -> Result<LiveGameInfo>;

    /// Most recent `count` matches of the subscriber, newest first
    async fn fetch_match_history(&self, subscriber_id: &str, count: usize)
        -> Result<Vec<MatchSummary>>;

    /// Full detail of one match
    async fn fetch_match_detail(&self, match_id: &str) -> Result<MatchDetail>;
}

/// Historical analytics collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Averages over the last `window_days` days
    async fn player_stats(&self, subscriber_id: &str, window_days: u32) -> Result<PlayerStats>;
}
